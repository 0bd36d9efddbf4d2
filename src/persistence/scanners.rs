use sqlx::SqliteConnection;

use crate::inventory::ScannerRecord;

use super::{create_child_index, delete_for_machine, MachineId};

const SCANNERS_TABLE_NAME: &str = "scanners";

pub(super) async fn replace_scanners(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
    scanners: &[ScannerRecord],
) -> Result<(), sqlx::Error> {
    delete_for_machine(conn, SCANNERS_TABLE_NAME, machine_id).await?;

    let statement = format!(
        "INSERT INTO {} (machine_id, name, manufacturer, model, pnp_device_id) VALUES (?, ?, ?, ?, ?)",
        SCANNERS_TABLE_NAME
    );
    for scanner in scanners {
        sqlx::query(&statement)
            .bind(machine_id)
            .bind(&scanner.name)
            .bind(&scanner.manufacturer)
            .bind(&scanner.model)
            .bind(&scanner.pnp_device_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(super) async fn fetch_scanners(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
) -> Result<Vec<ScannerRecord>, sqlx::Error> {
    let statement = format!(
        "SELECT name, manufacturer, model, pnp_device_id FROM {} WHERE machine_id = ? ORDER BY id",
        SCANNERS_TABLE_NAME
    );

    sqlx::query_as::<_, ScannerRecord>(&statement)
        .bind(machine_id)
        .fetch_all(conn)
        .await
}

pub(super) async fn create_scanners_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_id INTEGER NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
        name TEXT,
        manufacturer TEXT,
        model TEXT,
        pnp_device_id TEXT
    )",
        SCANNERS_TABLE_NAME
    );

    sqlx::query(&statement).execute(&mut *conn).await?;
    create_child_index(conn, SCANNERS_TABLE_NAME).await
}
