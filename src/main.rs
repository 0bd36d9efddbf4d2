use std::process::ExitCode;
use std::sync::Arc;

use log::{error, warn};

use asset_probe::config::Config;
use asset_probe::error::AppError;
use asset_probe::inventory::{LocalSource, SnapshotAssembler};
use asset_probe::logger::init_logger;
use asset_probe::persistence::{InventoryStore, MachineId};

async fn run() -> Result<MachineId, AppError> {
    let config = Config::from_env()?;
    let store = InventoryStore::connect(&config.store).await?;

    let source = Arc::new(LocalSource::new(&config.collector));
    let assembler = SnapshotAssembler::new(source, &config.collector);
    let snapshot = assembler.assemble().await;

    println!("{}", snapshot.to_pretty_json()?);
    if snapshot.has_failures() {
        warn!(
            "snapshot is partial, {} categor(ies) could not be collected",
            snapshot.failures.len()
        );
    }

    let result = store.persist(&snapshot).await;
    store.close().await;

    Ok(result?)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger(false);

    match run().await {
        Ok(machine_id) => {
            println!("saved machine_id = {}", machine_id);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("inventory run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
