//! Tabula CLI - Apply and inspect grid operations
//!
//! # Main Commands
//!
//! ```bash
//! tabula apply grid.json ops.json -o out.json   # Replay operations onto a grid
//! tabula canonicalize ops.json                  # Rewrite legacy operation JSON
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! tabula deps ops.json                          # Column dependencies per operation
//! tabula rename ops.json --map old=new          # Rewrite column references
//! tabula operations                             # List registered operation types
//! ```

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tabula::{ColumnRenames, EngineConfig, Grid, Operation, Project, OPERATION_REGISTRY};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Apply reversible operations to tabular data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a list of operations to a grid
    Apply {
        /// Grid JSON file ({"columns": [...], "rows": [[...], ...]})
        grid: PathBuf,

        /// Operations JSON file (array of operation documents)
        operations: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rewrite an operations file in canonical form
    Canonicalize {
        /// Operations JSON file
        operations: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show column dependencies and column effects of each operation
    Deps {
        /// Operations JSON file
        operations: PathBuf,
    },

    /// Rewrite column references in an operations file
    Rename {
        /// Operations JSON file
        operations: PathBuf,

        /// Column rename, as OLD=NEW (repeatable)
        #[arg(short, long = "map", value_parser = parse_rename, required = true)]
        renames: Vec<(String, String)>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show registered operation types
    Operations,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Apply {
            grid,
            operations,
            output,
        } => cmd_apply(&grid, &operations, output.as_deref()),

        Commands::Canonicalize { operations, output } => {
            cmd_canonicalize(&operations, output.as_deref())
        }

        Commands::Deps { operations } => cmd_deps(&operations),

        Commands::Rename {
            operations,
            renames,
            output,
        } => cmd_rename(&operations, renames, output.as_deref()),

        Commands::Operations => cmd_operations(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_rename(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((old, new)) if !old.is_empty() && !new.is_empty() => {
            Ok((old.to_string(), new.to_string()))
        }
        _ => Err(format!("expected OLD=NEW, got '{}'", raw)),
    }
}

fn read_operations(path: &Path) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let docs: Vec<Value> = serde_json::from_str(&content)?;
    Ok(docs)
}

fn load_operations(path: &Path) -> Result<Vec<Box<dyn Operation>>, Box<dyn std::error::Error>> {
    let mut ops = Vec::new();
    for (i, doc) in read_operations(path)?.iter().enumerate() {
        let op = OPERATION_REGISTRY
            .deserialize(doc)
            .map_err(|e| format!("operation {}: {}", i, e))?;
        ops.push(op);
    }
    Ok(ops)
}

fn to_json_array(ops: &[Box<dyn Operation>]) -> Result<String, Box<dyn std::error::Error>> {
    let docs = ops
        .iter()
        .map(|op| op.to_json())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_string_pretty(&docs)?)
}

fn cmd_apply(
    grid_path: &Path,
    operations: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Loading grid: {}", grid_path.display());

    let grid = Grid::from_json_file(grid_path)?;
    eprintln!("   Columns: {}", grid.column_names().join(", "));
    eprintln!("   Rows: {}", grid.row_count());

    let docs = read_operations(operations)?;
    let project = Project::new(grid, EngineConfig::from_env()?);
    let applied = project.replay(&docs, &OPERATION_REGISTRY)?;

    let result = project.snapshot();
    eprintln!("Applied {} operations, {} rows", applied, result.row_count());

    let json = serde_json::to_string_pretty(result.as_ref())?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_canonicalize(operations: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let ops = load_operations(operations)?;
    write_output(&to_json_array(&ops)?, output)
}

fn cmd_deps(operations: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let ops = load_operations(operations)?;

    let report: Vec<Value> = ops
        .iter()
        .map(|op| {
            json!({
                "op": op.op_id(),
                "description": op.description(),
                "columnDependencies": op.column_dependencies(),
                "columnsDiff": op.columns_diff(),
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_rename(
    operations: &Path,
    renames: Vec<(String, String)>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let renames: ColumnRenames = renames.into_iter().collect();
    let ops: Vec<Box<dyn Operation>> = load_operations(operations)?
        .iter()
        .map(|op| op.rename_columns(&renames))
        .collect();

    eprintln!("Renamed columns in {} operations", ops.len());
    write_output(&to_json_array(&ops)?, output)
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    for id in OPERATION_REGISTRY.registered_ids() {
        println!("{}", id);
    }
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
