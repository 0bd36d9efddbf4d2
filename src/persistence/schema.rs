use log::{debug, info};
use sqlx::{Connection, SqliteConnection};

use crate::error::PersistError;

use super::card_readers::create_card_readers_table;
use super::cpus::create_cpus_table;
use super::disks::create_disks_table;
use super::machines::create_machines_table;
use super::memory::create_memory_table;
use super::monitors::create_monitors_table;
use super::network_adapters::create_network_adapters_table;
use super::printers::create_printers_table;
use super::scanners::create_scanners_table;

/// Bumped whenever the table layout changes.
pub const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, sqlx::FromRow)]
struct UserVersion {
    user_version: i64,
}

pub(super) async fn schema_version(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let row = sqlx::query_as::<_, UserVersion>("PRAGMA user_version")
        .fetch_one(conn)
        .await?;

    Ok(row.user_version)
}

/// Brings the database up to `SCHEMA_VERSION`. Does nothing when it is
/// already there; refuses a database written by a newer build.
pub(super) async fn migrate(conn: &mut SqliteConnection) -> Result<(), PersistError> {
    let current = schema_version(conn).await?;

    if current > SCHEMA_VERSION {
        return Err(PersistError::Schema(format!(
            "database is at schema version {}, this build knows up to {}",
            current, SCHEMA_VERSION
        )));
    }
    if current == SCHEMA_VERSION {
        debug!("schema is current (version {})", current);
        return Ok(());
    }

    let mut tx = conn.begin().await?;

    // parent first, children reference it
    create_machines_table(&mut tx).await?;
    create_monitors_table(&mut tx).await?;
    create_printers_table(&mut tx).await?;
    create_scanners_table(&mut tx).await?;
    create_card_readers_table(&mut tx).await?;
    create_cpus_table(&mut tx).await?;
    create_memory_table(&mut tx).await?;
    create_disks_table(&mut tx).await?;
    create_network_adapters_table(&mut tx).await?;

    // pragmas take no bind parameters
    let statement = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
    sqlx::query(&statement).execute(&mut *tx).await?;

    tx.commit().await?;

    info!("migrated schema from version {} to {}", current, SCHEMA_VERSION);

    Ok(())
}
