use accrual_engine::application::engine::AccrualEngine;
use accrual_engine::config::AccrualArgs;
use accrual_engine::domain::ports::{AccrualClientRef, OrderStore, OrderStoreRef};
use accrual_engine::error::AccrualError;
use accrual_engine::infrastructure::http::HttpAccrualClient;
use accrual_engine::infrastructure::in_memory::InMemoryOrderStore;
use accrual_engine::interfaces::csv::order_reader::OrderReader;
use accrual_engine::interfaces::csv::order_writer::OrderWriter;
use accrual_engine::logging;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input orders CSV file (number, user_id)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Give up waiting for pending orders after this many milliseconds
    #[arg(long, default_value_t = 30_000)]
    max_wait_ms: u64,

    #[command(flatten)]
    accrual: AccrualArgs,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<OrderStoreRef> {
    use accrual_engine::infrastructure::rocksdb::RocksDBOrderStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDBOrderStore::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemoryOrderStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<OrderStoreRef> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryOrderStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logger();
    let cli = Cli::parse();

    let config = cli.accrual.engine_config().into_diagnostic()?;
    let client: AccrualClientRef = Arc::new(
        HttpAccrualClient::new(&cli.accrual.accrual_address, cli.accrual.accrual_timeout())
            .into_diagnostic()?,
    );
    let store = open_store(cli.db_path)?;
    let engine = AccrualEngine::new(config, Arc::clone(&store), client).into_diagnostic()?;

    // Persist and submit orders
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OrderReader::new(file);
    for order_result in reader.orders() {
        match order_result {
            Ok(order) => match store.insert(order.clone()).await {
                Ok(()) => engine.submit(order),
                Err(AccrualError::DuplicateOrder(number)) => {
                    warn!(order = %number, "Order already registered, skipping");
                }
                Err(e) => eprintln!("Error storing order: {}", e),
            },
            Err(e) => {
                eprintln!("Error reading order: {}", e);
            }
        }
    }

    // Let the sweeper settle whatever the first pass could not
    let sweeper = engine.spawn_sweeper();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(cli.max_wait_ms);
    loop {
        let pending = engine.pending_orders().await.into_diagnostic()?;
        if pending == 0 {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(pending, "Giving up with orders still pending");
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    engine.shutdown();
    sweeper.await.into_diagnostic()?;
    info!(
        overload_events = engine.overload().events(),
        overload_warnings = engine.overload().warnings(),
        "Accrual run finished"
    );

    // Output final state
    let orders = store.all_orders().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(orders).into_diagnostic()?;

    Ok(())
}
