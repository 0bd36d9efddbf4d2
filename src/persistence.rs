use std::path::PathBuf;
use std::str::FromStr;

use log::{debug, error, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::OnceCell;

use crate::config::StoreConfig;
use crate::error::PersistError;
use crate::inventory::{MachineIdentity, MachineSnapshot};

mod card_readers;
mod cpus;
mod disks;
mod machines;
mod memory;
mod monitors;
mod network_adapters;
mod printers;
mod scanners;
mod schema;

pub use self::schema::SCHEMA_VERSION;

/// Row id of a `machines` row. Stable for the life of the row.
pub type MachineId = i64;

#[derive(Debug, sqlx::FromRow)]
struct FetchId {
    pub id: i64,
}

/// The relational store for machine snapshots.
///
/// Each `persist` is one transaction: the machine row is resolved and every
/// child collection replaced, or nothing changes at all.
pub struct InventoryStore {
    pool: SqlitePool,
    schema_ready: OnceCell<()>,
}

impl InventoryStore {
    /// Opens the pool and brings the schema up to date.
    pub async fn connect(config: &StoreConfig) -> Result<Self, PersistError> {
        let in_memory = is_in_memory(&config.database_url);

        if !in_memory {
            ensure_parent_dir(&config.database_url)?;
        }

        let mut options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout);
        if in_memory {
            // every connection would get its own empty database
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        debug!("opened store at {}", config.database_url);

        let store = Self {
            pool,
            schema_ready: OnceCell::new(),
        };
        store.ensure_schema().await?;

        Ok(store)
    }

    /// Runs the schema migration unconditionally. Safe to repeat.
    pub async fn migrate(&self) -> Result<(), PersistError> {
        let mut conn = self.pool.acquire().await?;
        schema::migrate(&mut conn).await
    }

    async fn ensure_schema(&self) -> Result<(), PersistError> {
        self.schema_ready
            .get_or_try_init(|| async {
                let mut conn = self.pool.acquire().await?;
                schema::migrate(&mut conn).await
            })
            .await?;

        Ok(())
    }

    /// Finds or creates the machine row for `identity` without touching any
    /// child collection.
    pub async fn resolve(&self, identity: &MachineIdentity) -> Result<MachineId, PersistError> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await?;
        let machine_id = machines::resolve_machine(&mut tx, identity, now()).await?;
        tx.commit().await?;

        Ok(machine_id)
    }

    /// Stores `snapshot` as the current state of its machine and returns the
    /// machine id. On any error the store is left as it was.
    pub async fn persist(&self, snapshot: &MachineSnapshot) -> Result<MachineId, PersistError> {
        self.ensure_schema().await?;

        let machine_name = &snapshot.machine.machine_name;
        let mut tx = self.pool.begin().await?;

        match replace_snapshot(&mut tx, snapshot).await {
            Ok(machine_id) => {
                if let Err(e) = tx.commit().await {
                    error!("failed to commit snapshot for {}: {}", machine_name, e);
                    return Err(e.into());
                }

                info!(
                    "persisted snapshot for {} as machine {}",
                    machine_name, machine_id
                );
                Ok(machine_id)
            }
            Err(e) => {
                error!(
                    "failed to persist snapshot for {}, rolling back: {}",
                    machine_name, e
                );
                if let Err(rollback_err) = tx.rollback().await {
                    error!("rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// The stored state of one machine. `collected_at` is the time of the
    /// last successful persist; failures are never stored.
    pub async fn fetch_snapshot(
        &self,
        machine_id: MachineId,
    ) -> Result<Option<MachineSnapshot>, PersistError> {
        self.ensure_schema().await?;

        // one read transaction so the children match the machine row
        let mut tx = self.pool.begin().await?;

        let Some((machine, updated_at)) = machines::fetch_machine(&mut tx, machine_id).await?
        else {
            return Ok(None);
        };

        let snapshot = MachineSnapshot {
            machine,
            monitors: monitors::fetch_monitors(&mut tx, machine_id).await?,
            printers: printers::fetch_printers(&mut tx, machine_id).await?,
            scanners: scanners::fetch_scanners(&mut tx, machine_id).await?,
            card_readers: card_readers::fetch_card_readers(&mut tx, machine_id).await?,
            cpus: cpus::fetch_cpus(&mut tx, machine_id).await?,
            memory: memory::fetch_memory(&mut tx, machine_id).await?,
            disks: disks::fetch_disks(&mut tx, machine_id).await?,
            network_adapters: network_adapters::fetch_network_adapters(&mut tx, machine_id)
                .await?,
            collected_at: updated_at,
            failures: vec![],
        };

        tx.commit().await?;

        Ok(Some(snapshot))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn replace_snapshot(
    conn: &mut SqliteConnection,
    snapshot: &MachineSnapshot,
) -> Result<MachineId, PersistError> {
    let machine_id = machines::resolve_machine(conn, &snapshot.machine, now()).await?;

    monitors::replace_monitors(conn, machine_id, &snapshot.monitors).await?;
    printers::replace_printers(conn, machine_id, &snapshot.printers).await?;
    scanners::replace_scanners(conn, machine_id, &snapshot.scanners).await?;
    card_readers::replace_card_readers(conn, machine_id, &snapshot.card_readers).await?;
    cpus::replace_cpus(conn, machine_id, &snapshot.cpus).await?;
    memory::replace_memory(conn, machine_id, snapshot.memory.as_ref()).await?;
    disks::replace_disks(conn, machine_id, &snapshot.disks).await?;
    network_adapters::replace_network_adapters(conn, machine_id, &snapshot.network_adapters)
        .await?;

    Ok(machine_id)
}

async fn delete_for_machine(
    conn: &mut SqliteConnection,
    table: &str,
    machine_id: MachineId,
) -> Result<u64, sqlx::Error> {
    let statement = format!("DELETE FROM {} WHERE machine_id = ?", table);

    let result = sqlx::query(&statement)
        .bind(machine_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

async fn create_child_index(conn: &mut SqliteConnection, table: &str) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE INDEX IF NOT EXISTS idx_{0}_machine_id ON {0} (machine_id)",
        table
    );

    sqlx::query(&statement).execute(conn).await?;

    Ok(())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

// "sqlite:./db/x.sqlite3?mode=rwc" -> "./db/x.sqlite3"
fn database_path(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);

    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

fn ensure_parent_dir(database_url: &str) -> Result<(), PersistError> {
    let Some(path) = database_path(database_url) else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("creating database folder {}", parent.display());
            std::fs::create_dir_all(parent)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::CollectorConfig;
    use crate::inventory::assembler::tests::office_source;
    use crate::inventory::{
        CpuRecord, DeviceCategory, MemoryRecord, MonitorRecord, NetworkAdapterRecord,
        PrinterRecord, ScannerRecord, SnapshotAssembler,
    };

    async fn memory_store() -> InventoryStore {
        InventoryStore::connect(&StoreConfig::in_memory())
            .await
            .unwrap()
    }

    fn monitor(serial: &str) -> MonitorRecord {
        MonitorRecord {
            manufacturer: Some("Dell".to_string()),
            model: Some("P2419H".to_string()),
            serial: Some(serial.to_string()),
        }
    }

    fn snapshot(machine_name: &str, bios_serial: Option<&str>) -> MachineSnapshot {
        let mut machine = MachineIdentity::named(machine_name);
        machine.bios_serial = bios_serial.map(str::to_string);
        machine.user_name = Some("somchai".to_string());
        machine.os_caption = Some("Microsoft Windows 11 Pro".to_string());

        let mut snapshot = MachineSnapshot::new(machine);
        snapshot.monitors = vec![monitor("CN0ABC"), monitor("CN0DEF")];
        snapshot.printers = vec![PrinterRecord {
            name: Some("Office".to_string()),
            driver_name: Some("HP Universal Printing PCL 6".to_string()),
            is_network: Some(true),
            is_default: Some(false),
            is_shared: None,
            manufacturer: Some("HP".to_string()),
            ..PrinterRecord::default()
        }];
        snapshot.scanners = vec![ScannerRecord {
            name: Some("Canon MF240 Series USB Scanner Device".to_string()),
            manufacturer: Some("Canon".to_string()),
            model: Some("Canon MF240 Series".to_string()),
            pnp_device_id: Some("USB\\VID_04A9&PID_27A8\\1-1".to_string()),
        }];
        snapshot.cpus = vec![CpuRecord {
            name: Some("Intel(R) Core(TM) i5-10500".to_string()),
            cores: Some(6),
            logical_processors: Some(12),
            ..CpuRecord::default()
        }];
        snapshot.memory = Some(MemoryRecord {
            total_mb: Some(16384),
            free_mb: None,
        });
        snapshot.network_adapters = vec![NetworkAdapterRecord {
            name: Some("eth0".to_string()),
            mac: Some("00:11:22:33:44:55".to_string()),
            ipv4: vec!["10.0.0.5".to_string(), "192.168.1.20".to_string()],
        }];
        snapshot
    }

    async fn count(store: &InventoryStore, table: &str) -> i64 {
        let statement = format!("SELECT COUNT(*) AS id FROM {}", table);
        sqlx::query_as::<_, FetchId>(&statement)
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn persisted_snapshot_reads_back() {
        let store = memory_store().await;
        let written = snapshot("WS-042", Some("5CG1234XYZ"));

        let id = store.persist(&written).await.unwrap();
        let read = store.fetch_snapshot(id).await.unwrap().unwrap();

        assert_eq!(read.machine, written.machine);
        assert_eq!(read.monitors, written.monitors);
        assert_eq!(read.printers, written.printers);
        assert_eq!(read.scanners, written.scanners);
        assert!(read.card_readers.is_empty());
        assert_eq!(read.cpus, written.cpus);
        assert_eq!(read.memory, written.memory);
        assert_eq!(read.network_adapters, written.network_adapters);
    }

    #[tokio::test]
    async fn unknown_machine_reads_back_as_none() {
        let store = memory_store().await;

        assert!(store.fetch_snapshot(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persisting_twice_is_idempotent() {
        let store = memory_store().await;
        let written = snapshot("WS-042", Some("5CG1234XYZ"));

        let first = store.persist(&written).await.unwrap();
        let second = store.persist(&written).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(count(&store, "machines").await, 1);
        assert_eq!(count(&store, "monitors").await, 2);
        assert_eq!(count(&store, "printers").await, 1);
        assert_eq!(count(&store, "network_adapters").await, 1);
        assert_eq!(count(&store, "memory").await, 1);
    }

    #[tokio::test]
    async fn later_snapshot_replaces_children() {
        let store = memory_store().await;

        let mut first = snapshot("WS-042", Some("5CG1234XYZ"));
        first.monitors = vec![monitor("A"), monitor("B"), monitor("C")];
        let id = store.persist(&first).await.unwrap();

        let mut second = snapshot("WS-042", Some("5CG1234XYZ"));
        second.monitors = vec![monitor("D")];
        second.printers.clear();
        second.memory = None;
        assert_eq!(store.persist(&second).await.unwrap(), id);

        let read = store.fetch_snapshot(id).await.unwrap().unwrap();
        assert_eq!(read.monitors, vec![monitor("D")]);
        assert!(read.printers.is_empty());
        assert_eq!(read.memory, None);
    }

    #[tokio::test]
    async fn identity_survives_changed_attributes() {
        let store = memory_store().await;
        let id = store
            .persist(&snapshot("WS-042", Some("5CG1234XYZ")))
            .await
            .unwrap();

        // reimaged and renamed, same board
        let mut changed = snapshot("WS-042-NEW", Some("5CG1234XYZ"));
        changed.machine.user_name = Some("malee".to_string());
        changed.machine.os_caption = Some("Ubuntu 22.04.4 LTS".to_string());

        assert_eq!(store.persist(&changed).await.unwrap(), id);

        let read = store.fetch_snapshot(id).await.unwrap().unwrap();
        assert_eq!(read.machine.machine_name, "WS-042");
        assert_eq!(read.machine.user_name.as_deref(), Some("malee"));
        assert_eq!(read.machine.os_caption.as_deref(), Some("Ubuntu 22.04.4 LTS"));
        assert_eq!(count(&store, "machines").await, 1);
    }

    #[tokio::test]
    async fn machine_without_serial_is_matched_by_name() {
        let store = memory_store().await;

        let first = store.persist(&snapshot("WS-042", None)).await.unwrap();
        let second = store.persist(&snapshot("WS-042", None)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(count(&store, "machines").await, 1);
    }

    #[tokio::test]
    async fn serial_is_adopted_by_a_row_matched_by_name() {
        let store = memory_store().await;

        let id = store.persist(&snapshot("WS-042", None)).await.unwrap();
        assert_eq!(
            store
                .persist(&snapshot("WS-042", Some("5CG1234XYZ")))
                .await
                .unwrap(),
            id
        );

        let read = store.fetch_snapshot(id).await.unwrap().unwrap();
        assert_eq!(read.machine.bios_serial.as_deref(), Some("5CG1234XYZ"));

        // from now on the serial alone finds it
        assert_eq!(
            store
                .resolve(&MachineIdentity {
                    bios_serial: Some("5CG1234XYZ".to_string()),
                    ..MachineIdentity::named("renamed")
                })
                .await
                .unwrap(),
            id
        );
    }

    #[tokio::test]
    async fn stored_serial_is_not_overwritten_by_name_match() {
        let store = memory_store().await;

        let id = store
            .persist(&snapshot("WS-042", Some("OLD-SERIAL")))
            .await
            .unwrap();
        assert_eq!(
            store
                .persist(&snapshot("WS-042", Some("NEW-SERIAL")))
                .await
                .unwrap(),
            id
        );

        let read = store.fetch_snapshot(id).await.unwrap().unwrap();
        assert_eq!(read.machine.bios_serial.as_deref(), Some("OLD-SERIAL"));
    }

    #[tokio::test]
    async fn serial_match_wins_over_name_match() {
        let store = memory_store().await;

        let by_serial = store
            .persist(&snapshot("WS-001", Some("5CG1234XYZ")))
            .await
            .unwrap();
        let by_name = store.persist(&snapshot("WS-002", None)).await.unwrap();
        assert_ne!(by_serial, by_name);

        // name points at one row, serial at the other
        let id = store
            .persist(&snapshot("WS-002", Some("5CG1234XYZ")))
            .await
            .unwrap();

        assert_eq!(id, by_serial);
        assert_eq!(count(&store, "machines").await, 2);
    }

    #[tokio::test]
    async fn failed_child_insert_rolls_everything_back() {
        let store = memory_store().await;

        let mut before = snapshot("WS-042", Some("5CG1234XYZ"));
        before.monitors = vec![monitor("A"), monitor("B"), monitor("C")];
        let id = store.persist(&before).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER reject_scanners BEFORE INSERT ON scanners
            BEGIN SELECT RAISE(ABORT, 'scanner table is read only'); END",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let mut after = snapshot("WS-042", Some("5CG1234XYZ"));
        after.monitors = vec![monitor("D")];
        after.machine.user_name = Some("malee".to_string());

        let err = store.persist(&after).await.unwrap_err();
        assert!(matches!(err, PersistError::Database(_)));

        let read = store.fetch_snapshot(id).await.unwrap().unwrap();
        assert_eq!(read.monitors, before.monitors);
        assert_eq!(read.scanners, before.scanners);
        assert_eq!(read.machine.user_name.as_deref(), Some("somchai"));
    }

    #[tokio::test]
    async fn failing_monitor_backend_still_persists_the_rest() {
        let store = memory_store().await;

        let mut source = office_source();
        source.failing.push(DeviceCategory::Monitor);
        let config = CollectorConfig {
            timeout: Duration::from_secs(2),
            ..CollectorConfig::default()
        };
        let assembled = SnapshotAssembler::new(Arc::new(source), &config)
            .assemble()
            .await;

        let id = store.persist(&assembled).await.unwrap();
        let read = store.fetch_snapshot(id).await.unwrap().unwrap();

        assert_eq!(read.machine.machine_name, "WS-042");
        assert_eq!(read.machine.bios_serial.as_deref(), Some("5CG1234XYZ"));
        assert!(read.monitors.is_empty());
        assert_eq!(read.printers.len(), 1);
        assert_eq!(read.scanners.len(), 1);
        assert_eq!(read.card_readers.len(), 1);
        assert!(read.failures.is_empty());
    }

    #[tokio::test]
    async fn machines_do_not_touch_each_other() {
        let store = memory_store().await;

        let first = store
            .persist(&snapshot("WS-001", Some("SERIAL-1")))
            .await
            .unwrap();
        let mut other = snapshot("WS-002", Some("SERIAL-2"));
        other.monitors = vec![monitor("X")];
        let second = store.persist(&other).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.fetch_snapshot(first).await.unwrap().unwrap().monitors.len(), 2);
        assert_eq!(store.fetch_snapshot(second).await.unwrap().unwrap().monitors.len(), 1);
    }

    #[tokio::test]
    async fn unknown_printer_flags_stay_unknown() {
        let store = memory_store().await;

        let mut written = snapshot("WS-042", None);
        written.printers = vec![PrinterRecord {
            name: Some("Mystery".to_string()),
            ..PrinterRecord::default()
        }];
        let id = store.persist(&written).await.unwrap();

        let printer = &store.fetch_snapshot(id).await.unwrap().unwrap().printers[0];
        assert_eq!(printer.is_network, None);
        assert_eq!(printer.is_default, None);
        assert_eq!(printer.is_shared, None);
    }

    #[tokio::test]
    async fn deleting_a_machine_cascades() {
        let store = memory_store().await;
        let id = store
            .persist(&snapshot("WS-042", Some("5CG1234XYZ")))
            .await
            .unwrap();

        sqlx::query("DELETE FROM machines WHERE id = ?")
            .bind(id)
            .execute(&store.pool)
            .await
            .unwrap();

        assert_eq!(count(&store, "monitors").await, 0);
        assert_eq!(count(&store, "network_adapters").await, 0);
        assert_eq!(count(&store, "memory").await, 0);
    }

    #[tokio::test]
    async fn migration_is_idempotent() {
        let store = memory_store().await;

        store.migrate().await.unwrap();
        store.migrate().await.unwrap();

        let mut conn = store.pool.acquire().await.unwrap();
        assert_eq!(
            schema::schema_version(&mut conn).await.unwrap(),
            SCHEMA_VERSION
        );
    }

    #[tokio::test]
    async fn newer_schema_is_refused() {
        let store = memory_store().await;

        let statement = format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1);
        sqlx::query(&statement).execute(&store.pool).await.unwrap();

        assert!(matches!(
            store.migrate().await,
            Err(PersistError::Schema(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_persists_of_one_machine_serialize() {
        let dir = std::env::temp_dir().join(format!(
            "asset-probe-store-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let config = StoreConfig {
            database_url: format!("sqlite:{}", dir.join("nested/inventory.sqlite3").display()),
            max_connections: 4,
            ..StoreConfig::default()
        };
        let store = Arc::new(InventoryStore::connect(&config).await.unwrap());

        let mut tasks = vec![];
        for i in 0..4 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let mut written = snapshot("WS-042", Some("5CG1234XYZ"));
                written.monitors = (0..=i).map(|n| monitor(&n.to_string())).collect();
                store.persist(&written).await
            }));
        }

        let mut ids = vec![];
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        // whichever commit came last, its set is stored whole
        let monitors = count(&store, "monitors").await;
        assert!((1..=4).contains(&monitors));
        assert_eq!(count(&store, "machines").await, 1);

        store.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn database_path_is_taken_from_url() {
        assert_eq!(
            database_path("sqlite:./db/inventory.sqlite3"),
            Some(PathBuf::from("./db/inventory.sqlite3"))
        );
        assert_eq!(
            database_path("sqlite:///var/lib/probe/x.db?mode=rwc"),
            Some(PathBuf::from("/var/lib/probe/x.db"))
        );
        assert_eq!(database_path("postgres://localhost/x"), None);
        assert!(is_in_memory("sqlite::memory:"));
    }
}
