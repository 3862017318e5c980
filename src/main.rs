use atm_ledger::application::engine::TransactionEngine;
use atm_ledger::config::{AtmConfig, LoggingConfig};
use atm_ledger::domain::account::Account;
use atm_ledger::domain::clock::{ClockRef, SystemClock};
use atm_ledger::domain::ports::{AccountStoreBox, TransactionStoreBox, UnitOfWorkBox};
use atm_ledger::domain::transaction::TransactionType;
use atm_ledger::infrastructure::in_memory::InMemoryStore;
use atm_ledger::interfaces::csv::account_reader::AccountReader;
use atm_ledger::interfaces::csv::account_writer::AccountWriter;
use atm_ledger::interfaces::csv::transaction_reader::TransactionReader;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input CSV of withdrawal and deposit requests
    input: PathBuf,

    /// CSV of accounts to load before processing
    #[arg(long)]
    accounts: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (overrides the config file and RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn init_tracing(logging: &LoggingConfig, override_level: Option<&str>) {
    let filter = match override_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level)),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn read_accounts(path: Option<PathBuf>) -> Result<Vec<Account>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let file = File::open(path).into_diagnostic()?;
    AccountReader::new(file)
        .accounts()
        .collect::<std::result::Result<Vec<_>, _>>()
        .into_diagnostic()
}

struct Ports {
    accounts: AccountStoreBox,
    transactions: TransactionStoreBox,
    units: UnitOfWorkBox,
}

async fn in_memory_ports(clock: ClockRef, fixtures: Vec<Account>) -> Ports {
    let store = InMemoryStore::with_clock(clock);
    for account in fixtures {
        store.insert_account(account).await;
    }
    Ports {
        accounts: Box::new(store.clone()),
        transactions: Box::new(store.clone()),
        units: Box::new(store),
    }
}

#[cfg(feature = "storage-rocksdb")]
async fn open_ports(
    db_path: Option<PathBuf>,
    clock: ClockRef,
    fixtures: Vec<Account>,
) -> Result<Ports> {
    use atm_ledger::infrastructure::rocksdb::RocksDbStore;

    let Some(db_path) = db_path else {
        return Ok(in_memory_ports(clock, fixtures).await);
    };
    let store = RocksDbStore::open(db_path, clock).into_diagnostic()?;
    for account in &fixtures {
        store.insert_account(account).into_diagnostic()?;
    }
    Ok(Ports {
        accounts: Box::new(store.clone()),
        transactions: Box::new(store.clone()),
        units: Box::new(store),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
async fn open_ports(
    db_path: Option<PathBuf>,
    clock: ClockRef,
    fixtures: Vec<Account>,
) -> Result<Ports> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_ports(clock, fixtures).await)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AtmConfig::load(path).into_diagnostic()?,
        None => AtmConfig::default(),
    };
    init_tracing(&config.logging, cli.log_level.as_deref());
    let utc_offset = config.calendar.utc_offset().into_diagnostic()?;

    let clock: ClockRef = Arc::new(SystemClock);
    let fixtures = read_accounts(cli.accounts)?;
    tracing::info!(accounts = fixtures.len(), "Loaded account fixtures");

    let ports = open_ports(cli.db_path, clock.clone(), fixtures).await?;
    let engine = TransactionEngine::new(ports.accounts, ports.transactions, ports.units, clock)
        .with_limits(config.limits)
        .with_utc_offset(utc_offset);

    let file = File::open(cli.input).into_diagnostic()?;
    for request in TransactionReader::new(file).requests() {
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Error reading request");
                continue;
            }
        };

        let outcome = match request.r#type {
            TransactionType::Withdrawal => engine.withdrawal(request.account, request.amount).await,
            TransactionType::Deposit => engine.deposit(request.account, request.amount).await,
        };
        match outcome {
            Ok(_) => {}
            Err(e) if e.is_rejection() => tracing::warn!(
                account = request.account,
                amount = %request.amount,
                kind = %request.r#type,
                reason = %e,
                "Request rejected"
            ),
            Err(e) => tracing::error!(
                account = request.account,
                amount = %request.amount,
                kind = %request.r#type,
                error = %e,
                "Request failed"
            ),
        }
    }

    let accounts = engine.accounts().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts).into_diagnostic()?;

    Ok(())
}
