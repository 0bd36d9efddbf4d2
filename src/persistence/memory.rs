use sqlx::SqliteConnection;

use crate::inventory::MemoryRecord;

use super::{create_child_index, delete_for_machine, MachineId};

const MEMORY_TABLE_NAME: &str = "memory";

// at most one row per machine
pub(super) async fn replace_memory(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
    memory: Option<&MemoryRecord>,
) -> Result<(), sqlx::Error> {
    delete_for_machine(conn, MEMORY_TABLE_NAME, machine_id).await?;

    let Some(memory) = memory else {
        return Ok(());
    };

    let statement = format!(
        "INSERT INTO {} (machine_id, total_mb, free_mb) VALUES (?, ?, ?)",
        MEMORY_TABLE_NAME
    );
    sqlx::query(&statement)
        .bind(machine_id)
        .bind(memory.total_mb)
        .bind(memory.free_mb)
        .execute(conn)
        .await?;

    Ok(())
}

pub(super) async fn fetch_memory(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
) -> Result<Option<MemoryRecord>, sqlx::Error> {
    let statement = format!(
        "SELECT total_mb, free_mb FROM {} WHERE machine_id = ? ORDER BY id LIMIT 1",
        MEMORY_TABLE_NAME
    );

    sqlx::query_as::<_, MemoryRecord>(&statement)
        .bind(machine_id)
        .fetch_optional(conn)
        .await
}

pub(super) async fn create_memory_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_id INTEGER NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
        total_mb INTEGER,
        free_mb INTEGER
    )",
        MEMORY_TABLE_NAME
    );

    sqlx::query(&statement).execute(&mut *conn).await?;
    create_child_index(conn, MEMORY_TABLE_NAME).await
}
