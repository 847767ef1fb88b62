//! callrec CLI - thin wrapper over callrec-core
//!
//! Two commands: `generate` seeds the stores with synthetic records
//! (always the JSON snapshot, optionally the document and relational
//! stores), `filter` runs a date-window query against one backend and
//! prints the JSON response.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;

use callrec_core::{
    Config, FilterError, FilterRequest, FilterSpec, FilterResult, JsonStore, MongoStore, SqlStore,
    generator, logging,
};

#[derive(Parser)]
#[command(name = "callrec", version, about = "Generate and filter call records")]
struct Cli {
    /// Path to a callrec.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Re-root the file-backed stores under this directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (overridable via RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate synthetic records and (re)write the stores
    Generate {
        /// Number of records to generate
        #[arg(long)]
        count: usize,

        /// Also write the batch to the document store
        #[arg(long)]
        mongo: bool,

        /// Also write the batch to the relational store
        #[arg(long)]
        sql: bool,
    },

    /// Filter records from one backend
    Filter {
        /// Backend to query
        #[arg(long, value_enum, default_value_t = Backend::Json)]
        backend: Backend,

        /// Date range, "YYYY-MM-DD to YYYY-MM-DD"
        #[arg(long)]
        date_range: String,

        /// Cluster name (optional)
        #[arg(long, default_value = "")]
        cluster: String,

        /// User id (optional)
        #[arg(long, default_value = "")]
        user_id: String,

        /// Device phone number (optional)
        #[arg(long, default_value = "")]
        phone_number: String,

        /// Device voicemail (optional)
        #[arg(long, default_value = "")]
        voice_mail: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Json,
    Mongo,
    Sql,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        // validation failures are usage errors; everything else is a
        // backend failure
        Err(err) => match err.downcast_ref::<FilterError>() {
            Some(FilterError::InvalidDateRange(_)) => {
                eprintln!("error: {err}");
                ExitCode::from(2)
            }
            _ => {
                error!(error = %err, "command failed");
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }

    match cli.command {
        Command::Generate { count, mongo, sql } => generate(&config, count, mongo, sql),
        Command::Filter {
            backend,
            date_range,
            cluster,
            user_id,
            phone_number,
            voice_mail,
        } => {
            let request = FilterRequest {
                date_range,
                phone_number,
                voice_mail,
                user_id,
                cluster,
            };
            let result = filter(&config, backend, request)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

fn generate(config: &Config, count: usize, mongo: bool, sql: bool) -> anyhow::Result<()> {
    let records = generator::generate_records(count);

    let path = JsonStore::new(config.json.clone())
        .store_records(&records)
        .context("writing the JSON snapshot")?;
    println!("wrote {} records to {}", records.len(), path.display());

    if mongo {
        MongoStore::connect(&config.mongo)?
            .store_records(&records)
            .context("writing the document store")?;
        println!("wrote {} records to the document store", records.len());
    }

    if sql {
        let mut store = SqlStore::open(&config.sql)?;
        store
            .store_records(&records)
            .context("writing the relational store")?;
        println!("wrote {} records to the relational store", records.len());
    }

    Ok(())
}

fn filter(config: &Config, backend: Backend, request: FilterRequest) -> anyhow::Result<FilterResult> {
    let spec = FilterSpec::new(request)?;
    let result = match backend {
        Backend::Json => JsonStore::new(config.json.clone()).run(&spec)?,
        Backend::Mongo => MongoStore::connect(&config.mongo)?.run(&spec)?,
        Backend::Sql => SqlStore::open(&config.sql)?.run(&spec)?,
    };
    Ok(result)
}
