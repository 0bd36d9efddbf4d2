use sqlx::SqliteConnection;

use crate::inventory::CardReaderRecord;

use super::{create_child_index, delete_for_machine, MachineId};

const CARD_READERS_TABLE_NAME: &str = "card_readers";

pub(super) async fn replace_card_readers(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
    card_readers: &[CardReaderRecord],
) -> Result<(), sqlx::Error> {
    delete_for_machine(conn, CARD_READERS_TABLE_NAME, machine_id).await?;

    let statement = format!(
        "INSERT INTO {} (machine_id, name, manufacturer, model, pnp_device_id) VALUES (?, ?, ?, ?, ?)",
        CARD_READERS_TABLE_NAME
    );
    for reader in card_readers {
        sqlx::query(&statement)
            .bind(machine_id)
            .bind(&reader.name)
            .bind(&reader.manufacturer)
            .bind(&reader.model)
            .bind(&reader.pnp_device_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(super) async fn fetch_card_readers(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
) -> Result<Vec<CardReaderRecord>, sqlx::Error> {
    let statement = format!(
        "SELECT name, manufacturer, model, pnp_device_id FROM {} WHERE machine_id = ? ORDER BY id",
        CARD_READERS_TABLE_NAME
    );

    sqlx::query_as::<_, CardReaderRecord>(&statement)
        .bind(machine_id)
        .fetch_all(conn)
        .await
}

pub(super) async fn create_card_readers_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_id INTEGER NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
        name TEXT,
        manufacturer TEXT,
        model TEXT,
        pnp_device_id TEXT
    )",
        CARD_READERS_TABLE_NAME
    );

    sqlx::query(&statement).execute(&mut *conn).await?;
    create_child_index(conn, CARD_READERS_TABLE_NAME).await
}
