use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use thindb::config::{default_config_path, load_config};
use thindb::{Config, Database, DatabaseConfig, DbError, Fields, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Thin data-access layer over SQLite.
#[derive(Parser, Debug)]
#[command(name = "thindb", about = "Query and edit a SQLite database through the thindb facade")]
struct Cli {
    /// Configuration file (defaults to the platform config directory).
    #[arg(long, conflicts_with = "db")]
    config: Option<PathBuf>,

    /// SQLite file to open directly, without a configuration file.
    #[arg(long)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Every row of a table
    All { table: String },
    /// Rows matching `field op value`
    Get {
        table: String,
        #[arg(allow_hyphen_values = true)]
        clause: Vec<String>,
    },
    /// First row matching `field op value`
    First {
        table: String,
        #[arg(allow_hyphen_values = true)]
        clause: Vec<String>,
    },
    /// The row with the given id
    Id {
        table: String,
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
    /// Insert a row from col=value pairs and print its id
    Insert { table: String, pairs: Vec<String> },
    /// Update the rows matching a quoted clause, print how many changed
    Update {
        table: String,
        clause: String,
        pairs: Vec<String>,
    },
    /// Delete the row with the given id, print how many went
    Delete {
        table: String,
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
    /// Run SQL and print its rows
    Query {
        sql: String,
        #[arg(allow_hyphen_values = true)]
        params: Vec<String>,
    },
    /// Run SQL without fetching rows
    Exec {
        sql: String,
        #[arg(allow_hyphen_values = true)]
        params: Vec<String>,
    },
}

fn load(cli: &Cli) -> thindb::Result<Config> {
    if let Some(db) = &cli.db {
        return Ok(Config {
            database: DatabaseConfig::for_path(db.clone()),
            schema: None,
            log: None,
        });
    }
    let path = cli
        .config
        .clone()
        .or_else(default_config_path)
        .ok_or_else(|| DbError::Config("no configuration directory".to_string()))?;
    debug!("Loading configuration from {:?}", path);
    load_config(path)
}

fn parse_fields(pairs: &[String]) -> thindb::Result<Fields> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(column, value)| (column.to_string(), value.to_string()))
                .ok_or_else(|| DbError::Config(format!("expected column=value, got '{}'", pair)))
        })
        .collect()
}

fn params(values: &[String]) -> Vec<Value> {
    values.iter().map(|v| Value::Text(v.clone())).collect()
}

fn run(db: &mut Database, command: &Command) -> thindb::Result<String> {
    let output = match command {
        Command::All { table } => serde_json::to_string_pretty(&db.try_get(table, "", false)?.into_records())?,
        Command::Get { table, clause } => {
            serde_json::to_string_pretty(&db.try_get(table, &clause.join(" "), false)?.into_records())?
        }
        Command::First { table, clause } => {
            serde_json::to_string_pretty(&db.try_get(table, &clause.join(" "), true)?.into_record())?
        }
        Command::Id { table, id } => serde_json::to_string_pretty(&db.try_get_by_id(table, *id)?)?,
        Command::Insert { table, pairs } => db.try_insert(table, &parse_fields(pairs)?)?.to_string(),
        Command::Update { table, clause, pairs } => db.try_update(table, clause, &parse_fields(pairs)?)?.to_string(),
        Command::Delete { table, id } => db.try_delete(table, *id)?.to_string(),
        Command::Query { sql, params: values } => {
            serde_json::to_string_pretty(&db.try_query(sql, &params(values), true)?.into_records())?
        }
        Command::Exec { sql, params: values } => {
            db.try_query(sql, &params(values), false)?;
            String::new()
        }
    };
    Ok(output)
}

fn main() -> ExitCode {
    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    info!("Starting thindb...");
    let mut db = Database::from_config(&config);
    match run(&mut db, &cli.command) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
