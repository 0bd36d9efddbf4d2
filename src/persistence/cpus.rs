use sqlx::SqliteConnection;

use crate::inventory::CpuRecord;

use super::{create_child_index, delete_for_machine, MachineId};

const CPUS_TABLE_NAME: &str = "cpus";

pub(super) async fn replace_cpus(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
    cpus: &[CpuRecord],
) -> Result<(), sqlx::Error> {
    delete_for_machine(conn, CPUS_TABLE_NAME, machine_id).await?;

    let statement = format!(
        "INSERT INTO {} (machine_id, name, vendor, cores, logical_processors, processor_id)
        VALUES (?, ?, ?, ?, ?, ?)",
        CPUS_TABLE_NAME
    );
    for cpu in cpus {
        sqlx::query(&statement)
            .bind(machine_id)
            .bind(&cpu.name)
            .bind(&cpu.vendor)
            .bind(cpu.cores)
            .bind(cpu.logical_processors)
            .bind(&cpu.processor_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(super) async fn fetch_cpus(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
) -> Result<Vec<CpuRecord>, sqlx::Error> {
    let statement = format!(
        "SELECT name, vendor, cores, logical_processors, processor_id
        FROM {}
        WHERE machine_id = ?
        ORDER BY id",
        CPUS_TABLE_NAME
    );

    sqlx::query_as::<_, CpuRecord>(&statement)
        .bind(machine_id)
        .fetch_all(conn)
        .await
}

pub(super) async fn create_cpus_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_id INTEGER NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
        name TEXT,
        vendor TEXT,
        cores INTEGER,
        logical_processors INTEGER,
        processor_id TEXT
    )",
        CPUS_TABLE_NAME
    );

    sqlx::query(&statement).execute(&mut *conn).await?;
    create_child_index(conn, CPUS_TABLE_NAME).await
}
