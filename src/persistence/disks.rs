use sqlx::SqliteConnection;

use crate::inventory::DiskRecord;

use super::{create_child_index, delete_for_machine, MachineId};

const DISKS_TABLE_NAME: &str = "disks";

pub(super) async fn replace_disks(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
    disks: &[DiskRecord],
) -> Result<(), sqlx::Error> {
    delete_for_machine(conn, DISKS_TABLE_NAME, machine_id).await?;

    let statement = format!(
        "INSERT INTO {} (machine_id, model, serial, size_bytes, interface_type, mount_point)
        VALUES (?, ?, ?, ?, ?, ?)",
        DISKS_TABLE_NAME
    );
    for disk in disks {
        sqlx::query(&statement)
            .bind(machine_id)
            .bind(&disk.model)
            .bind(&disk.serial)
            .bind(disk.size_bytes)
            .bind(&disk.interface_type)
            .bind(&disk.mount_point)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(super) async fn fetch_disks(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
) -> Result<Vec<DiskRecord>, sqlx::Error> {
    let statement = format!(
        "SELECT model, serial, size_bytes, interface_type, mount_point
        FROM {}
        WHERE machine_id = ?
        ORDER BY id",
        DISKS_TABLE_NAME
    );

    sqlx::query_as::<_, DiskRecord>(&statement)
        .bind(machine_id)
        .fetch_all(conn)
        .await
}

pub(super) async fn create_disks_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_id INTEGER NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
        model TEXT,
        serial TEXT,
        size_bytes INTEGER,
        interface_type TEXT,
        mount_point TEXT
    )",
        DISKS_TABLE_NAME
    );

    sqlx::query(&statement).execute(&mut *conn).await?;
    create_child_index(conn, DISKS_TABLE_NAME).await
}
