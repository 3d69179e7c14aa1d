//! Genovault: Encrypted genomic-record lifecycle
//!
//! Main entry point for the command-line application.

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use genovault::adapters::memory::MemoryStore;
use genovault::adapters::oracle::SigningOracle;
use genovault::adapters::sanitize::SanitizingMakeWriter;
use genovault::adapters::sqlite::SqliteStore;
use genovault::adapters::tfhe::TfheCapability;
use genovault::cli::{self, Command};
use genovault::config::VaultConfig;

fn main() -> Result<()> {
    let options = match Command::parse(std::env::args().skip(1)) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            println!("{}", cli::USAGE);
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let config = VaultConfig::from_env_or_default();

    // Initialize logging.
    //
    // Default behavior:
    // - interactive TTY: log to a file so the report stays readable
    // - non-interactive: log to stdout (so `docker logs` works)
    let use_file = config
        .log_mode
        .use_file(std::io::stdout().is_terminal());

    let (writer, _guard) = if use_file {
        if let Some(parent) = config.log_file.parent() {
            // Best-effort: don't fail startup just because the directory is missing.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting Genovault...");

    let submissions = cli::load_submissions(&options.submissions)
        .with_context(|| format!("Failed to load {}", options.submissions.display()))?;

    let oracle = match &config.oracle_seed_file {
        Some(path) => SigningOracle::from_seed_file(path)?,
        None => {
            tracing::warn!("No oracle seed configured; using an ephemeral authority key");
            SigningOracle::generate()
        }
    };
    if let Some(pinned) = &config.oracle_pubkey {
        cli::check_pinned_authority(&oracle, pinned)?;
    }
    tracing::info!("Oracle authority {}", oracle.authority_fingerprint());

    let capability = Arc::new(TfheCapability::generate());
    let oracle = Arc::new(oracle);

    let db_path = options.db_path.clone().unwrap_or(config.db_path);
    let report = if db_path.as_os_str() == ":memory:" {
        cli::run(&options, &submissions, capability, oracle, Arc::new(MemoryStore::new()))?
    } else {
        let store = SqliteStore::new(&db_path)
            .with_context(|| format!("Failed to open {}", db_path.display()))?;
        if options.reset {
            store.clear_all()?;
        }
        let store = Arc::new(store);
        let report = cli::run(&options, &submissions, capability, oracle, Arc::clone(&store))?;
        tracing::info!("Ledger holds {} entries", store.count_entries()?);
        report
    };

    print!("{report}");

    tracing::info!("Genovault shutdown complete.");
    Ok(())
}
