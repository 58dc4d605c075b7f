use alterations::application::engine::ShopEngine;
use alterations::domain::money::Cents;
use alterations::domain::ports::{OrderStoreBox, PaymentGatewayBox, PaymentStoreBox};
use alterations::infrastructure::gateway::SimulatedGateway;
use alterations::infrastructure::in_memory::{InMemoryOrderStore, InMemoryPaymentStore};
#[cfg(feature = "storage-rocksdb")]
use alterations::infrastructure::rocksdb::RocksDBStore;
use alterations::interfaces::csv::command_reader::CommandReader;
use alterations::interfaces::csv::report_writer::ReportWriter;
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Report {
    Payments,
    Orders,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Which report to write to stdout
    #[arg(long, value_enum, default_value_t = Report::Payments)]
    report: Report,

    /// Decline card charges above this amount
    #[arg(long)]
    decline_above: Option<Decimal>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn open_stores(db_path: Option<PathBuf>) -> Result<(OrderStoreBox, PaymentStoreBox)> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok((Box::new(store.clone()), Box::new(store)))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
            );
            Ok(in_memory_stores())
        }
        None => Ok(in_memory_stores()),
    }
}

fn in_memory_stores() -> (OrderStoreBox, PaymentStoreBox) {
    (
        Box::new(InMemoryOrderStore::new()),
        Box::new(InMemoryPaymentStore::new()),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let (orders, payments) = open_stores(cli.db_path)?;
    let mut gateway = SimulatedGateway::new();
    if let Some(limit) = cli.decline_above {
        gateway = gateway.with_decline_above(Cents::from_decimal(limit).into_diagnostic()?);
    }
    let gateway: PaymentGatewayBox = Box::new(gateway);
    let engine = ShopEngine::new(orders, payments, gateway);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for row in reader.commands() {
        let line = row.line;
        match row.command {
            Ok(command) => {
                if let Err(e) = engine.process_command(command).await {
                    tracing::warn!(line, "Error processing command: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!(line, "Error reading command: {}", e);
            }
        }
    }

    let state = engine.into_results().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    let written = match cli.report {
        Report::Payments => writer.write_payments(&state.payments),
        Report::Orders => writer.write_orders(&state.orders, &state.payments),
    };
    written.into_diagnostic()?;

    Ok(())
}
