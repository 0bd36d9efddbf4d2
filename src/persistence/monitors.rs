use sqlx::SqliteConnection;

use crate::inventory::MonitorRecord;

use super::{create_child_index, delete_for_machine, MachineId};

const MONITORS_TABLE_NAME: &str = "monitors";

pub(super) async fn replace_monitors(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
    monitors: &[MonitorRecord],
) -> Result<(), sqlx::Error> {
    delete_for_machine(conn, MONITORS_TABLE_NAME, machine_id).await?;

    let statement = format!(
        "INSERT INTO {} (machine_id, manufacturer, model, serial) VALUES (?, ?, ?, ?)",
        MONITORS_TABLE_NAME
    );
    for monitor in monitors {
        sqlx::query(&statement)
            .bind(machine_id)
            .bind(&monitor.manufacturer)
            .bind(&monitor.model)
            .bind(&monitor.serial)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(super) async fn fetch_monitors(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
) -> Result<Vec<MonitorRecord>, sqlx::Error> {
    let statement = format!(
        "SELECT manufacturer, model, serial FROM {} WHERE machine_id = ? ORDER BY id",
        MONITORS_TABLE_NAME
    );

    sqlx::query_as::<_, MonitorRecord>(&statement)
        .bind(machine_id)
        .fetch_all(conn)
        .await
}

pub(super) async fn create_monitors_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_id INTEGER NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
        manufacturer TEXT,
        model TEXT,
        serial TEXT
    )",
        MONITORS_TABLE_NAME
    );

    sqlx::query(&statement).execute(&mut *conn).await?;
    create_child_index(conn, MONITORS_TABLE_NAME).await
}
