//! oxide-db CLI
//!
//! Runs statements and catalog queries against a configured connection and
//! prints rows as JSON.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_db::{AdapterRegistry, Connection, ConnectionConfig, QueryResult, Value};

/// Query a database through oxide-db.
#[derive(Parser)]
#[command(name = "oxide-db")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON connection config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database name or path; overrides the config file.
    #[arg(short, long, env = "OXIDE_DB_DATABASE")]
    database: Option<String>,

    /// Driver used when no config file is given.
    #[arg(long, default_value = "sqlite")]
    driver: String,

    /// Table prefix.
    #[arg(long)]
    prefix: Option<String>,

    /// Fail on the first statement error.
    #[arg(long)]
    debug: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one SQL statement.
    Query {
        sql: String,

        /// Values for the bind markers, in order.
        #[arg(short, long = "bind")]
        binds: Vec<String>,
    },

    /// List tables.
    Tables {
        /// Only tables carrying the table prefix.
        #[arg(long)]
        prefixed: bool,
    },

    /// List the columns of a table.
    Fields { table: String },

    /// Count the rows of a table.
    Count { table: String },

    /// Show the server version.
    Version,
}

impl Cli {
    fn connection_config(&self) -> anyhow::Result<ConnectionConfig> {
        let mut config = match &self.config {
            Some(path) => ConnectionConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ConnectionConfig::new(&self.driver, ":memory:"),
        };
        if let Some(database) = &self.database {
            config.database.clone_from(database);
        }
        if let Some(prefix) = &self.prefix {
            config.dbprefix.clone_from(prefix);
        }
        config.db_debug |= self.debug;
        Ok(config)
    }
}

/// Reads a bind value typed by its look: `null`, integers, floats, else text.
fn parse_bind(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Text(String::from(raw))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut registry = AdapterRegistry::new();
    oxide_db_sqlite::register(&mut registry);

    let config = cli.connection_config()?;
    let mut db = Connection::open(config, &registry)?;

    match cli.command {
        Commands::Query { sql, binds } => {
            let binds: Vec<Value> = binds.iter().map(|b| parse_bind(b)).collect();
            match db.query_binds(&sql, &binds)? {
                QueryResult::Rows(cursor) => print_json(&cursor.to_json_objects()?)?,
                QueryResult::Done => {
                    info!(affected = db.affected_rows(), "Statement executed");
                }
                QueryResult::Failed(err) => bail!("Query failed: {err}"),
            }
        }

        Commands::Tables { prefixed } => {
            for table in db.list_tables(prefixed)? {
                println!("{table}");
            }
        }

        Commands::Fields { table } => {
            for field in db.list_fields(&table)? {
                println!("{field}");
            }
        }

        Commands::Count { table } => {
            println!("{}", db.count_all(&table)?);
        }

        Commands::Version => {
            println!("{}", db.version()?);
        }
    }

    db.close();
    Ok(())
}
