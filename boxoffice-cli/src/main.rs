//! `boxoffice` operator CLI: key management and database setup.

#![warn(clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use boxoffice::config::Settings;
use boxoffice::context::LookupContext;
use boxoffice::kdf::generate_key;
use boxoffice::key_source::{EnvKeySource, KeySource};
use boxoffice::store::SqliteBackend;
use boxoffice::tariff;
use boxoffice_key_file::FileKeySource;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "boxoffice")]
#[command(about = "boxoffice key and database management CLI", long_about = None)]
struct Cli {
    /// Read the encryption key from this file instead of the KEY variable
    #[arg(long, global = true)]
    key_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new encryption key
    Keygen {
        /// Write the key to this file (0600) instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that the configured key is usable
    CheckKey,
    /// Print the lookup digest of an email address
    Digest {
        /// Email address
        email: String,
    },
    /// Create the database schema
    InitDb {
        /// Database file (defaults to DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List the tariff catalogue as JSON
    Tariffs,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("boxoffice=info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Keygen { output } => keygen(output),
        Commands::CheckKey => {
            let settings = settings(cli.key_file)?;
            settings.field_cipher().validate_key().context("encryption key is not usable")?;
            println!("Key OK ({:?}, {:?} digests)", settings.cipher_mode, settings.digest_mode);
            Ok(())
        }
        Commands::Digest { email } => {
            let settings = settings(cli.key_file)?;
            let digest = settings.field_cipher().digest_for_lookup(&email, &LookupContext::email())?;
            println!("{digest}");
            Ok(())
        }
        Commands::InitDb { db } => {
            let path = match db {
                Some(path) => path,
                None => settings(cli.key_file)?.db_path,
            };
            SqliteBackend::open(&path).with_context(|| format!("cannot open {}", path.display()))?;
            tracing::info!(path = %path.display(), "database ready");
            Ok(())
        }
        Commands::Tariffs => {
            println!("{}", serde_json::to_string_pretty(tariff::all())?);
            Ok(())
        }
    }
}

fn keygen(output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            FileKeySource::init(&path).with_context(|| format!("cannot write {}", path.display()))?;
            tracing::info!(path = %path.display(), "key written");
        }
        None => println!("{}", generate_key().expose_secret()),
    }
    Ok(())
}

fn settings(key_file: Option<PathBuf>) -> Result<Settings> {
    let source: Box<dyn KeySource> = match key_file {
        Some(path) => Box::new(FileKeySource::new(path)?),
        None => Box::new(EnvKeySource::default()),
    };
    Ok(Settings::from_env_with(source.as_ref())?)
}
