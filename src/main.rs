//! mm-ready CLI
//!
//! Parses a schema-only dump and prints the resulting schema model.
//!
//! Exit codes:
//! - 0: Dump parsed (even if it yielded no tables)
//! - 2: Tool error (config error, unreadable dump, etc.)

use anyhow::{Context, Result};
use clap::Parser;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use mm_ready::config::OutputFormat;
use mm_ready::{Config, DumpParser, SchemaModel};

/// Default config file name used when --config is not explicitly provided.
const DEFAULT_CONFIG_FILE: &str = "mm-ready.toml";

#[derive(Parser, Debug)]
#[command(name = "mm-ready")]
#[command(about = "Parse a PostgreSQL schema-only dump into a schema model", long_about = None)]
struct Args {
    /// Path to the schema-only dump (pg_dump --schema-only output)
    dump: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override output format (summary, json)
    #[arg(long)]
    format: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(err) = run(args) {
        eprintln!("Error: {:#}", err);
        std::process::exit(2);
    }
}

fn run(args: Args) -> Result<()> {
    // If --config is explicitly provided and the file doesn't exist, that's a tool error.
    // If using the default path and it doesn't exist, warn and use defaults.
    let config = load_config(&args.config)?;

    let format = match &args.format {
        Some(f) => OutputFormat::parse(f).with_context(|| {
            format!("Unknown format '{}'. Valid values: summary, json", f)
        })?,
        None => config.output_format(),
    };

    let model = DumpParser::new(config.parser)
        .parse_file(&args.dump)
        .context("Failed to parse dump")?;

    if model.tables().is_empty() {
        warn!(
            dump = %args.dump.display(),
            "no tables found; is this a schema-only dump?"
        );
    }

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&model).context("Failed to serialize model")?;
            println!("{}", json);
        }
        OutputFormat::Summary => print!("{}", render_summary(&model)),
    }

    Ok(())
}

/// Human-readable overview: source version, entity counts, and one line
/// per table.
fn render_summary(model: &SchemaModel) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Source version: {}",
        model.pg_version().unwrap_or("unknown")
    );
    let _ = writeln!(out, "{}", model.summary());

    for table in model.tables() {
        let mut flags = Vec::new();
        if table.unlogged {
            flags.push("unlogged".to_string());
        }
        if let Some(strategy) = &table.partition_by {
            flags.push(format!("partitioned by {}", strategy));
        }
        if !table.inherits.is_empty() {
            flags.push(format!("inherits {}", table.inherits.join(", ")));
        }
        let constraints = model.constraints_for(&table.schema, &table.name, None).len();
        let indexes = model.indexes_for(&table.schema, &table.name).len();
        let _ = write!(
            out,
            "  {} ({} column(s), {} constraint(s), {} index(es))",
            table.qualified_name(),
            table.columns.len(),
            constraints,
            indexes
        );
        if !flags.is_empty() {
            let _ = write!(out, " [{}]", flags.join("; "));
        }
        out.push('\n');
    }
    out
}

fn load_config(config_path: &Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => {
            // User explicitly provided --config; file must exist.
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::from_file(path).context("Failed to load configuration")
        }
        None => {
            // Using default config path; missing file is OK.
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                Config::from_file(&default_path).context("Failed to load configuration")
            } else {
                warn!(
                    "Config file {} not found, using defaults",
                    default_path.display()
                );
                Ok(Config::default())
            }
        }
    }
}
