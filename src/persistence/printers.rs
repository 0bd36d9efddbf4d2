use sqlx::SqliteConnection;

use crate::inventory::PrinterRecord;

use super::{create_child_index, delete_for_machine, MachineId};

const PRINTERS_TABLE_NAME: &str = "printers";

pub(super) async fn replace_printers(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
    printers: &[PrinterRecord],
) -> Result<(), sqlx::Error> {
    delete_for_machine(conn, PRINTERS_TABLE_NAME, machine_id).await?;

    let statement = format!(
        "INSERT INTO {}
        (machine_id, name, driver_name, port_name, is_network, is_default, is_shared, manufacturer)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        PRINTERS_TABLE_NAME
    );
    for printer in printers {
        // unknown flags stay NULL
        sqlx::query(&statement)
            .bind(machine_id)
            .bind(&printer.name)
            .bind(&printer.driver_name)
            .bind(&printer.port_name)
            .bind(printer.is_network)
            .bind(printer.is_default)
            .bind(printer.is_shared)
            .bind(&printer.manufacturer)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(super) async fn fetch_printers(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
) -> Result<Vec<PrinterRecord>, sqlx::Error> {
    let statement = format!(
        "SELECT name, driver_name, port_name, is_network, is_default, is_shared, manufacturer
        FROM {}
        WHERE machine_id = ?
        ORDER BY id",
        PRINTERS_TABLE_NAME
    );

    sqlx::query_as::<_, PrinterRecord>(&statement)
        .bind(machine_id)
        .fetch_all(conn)
        .await
}

pub(super) async fn create_printers_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_id INTEGER NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
        name TEXT,
        driver_name TEXT,
        port_name TEXT,
        is_network INTEGER,
        is_default INTEGER,
        is_shared INTEGER,
        manufacturer TEXT
    )",
        PRINTERS_TABLE_NAME
    );

    sqlx::query(&statement).execute(&mut *conn).await?;
    create_child_index(conn, PRINTERS_TABLE_NAME).await
}
