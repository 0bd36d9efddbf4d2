use sqlx::SqliteConnection;

use crate::inventory::NetworkAdapterRecord;

use super::{create_child_index, delete_for_machine, MachineId};

const NETWORK_ADAPTERS_TABLE_NAME: &str = "network_adapters";
const IPV4_SEPARATOR: char = ',';

#[derive(Debug, sqlx::FromRow)]
struct StoredAdapter {
    name: Option<String>,
    mac: Option<String>,
    ipv4: Option<String>,
}

impl From<StoredAdapter> for NetworkAdapterRecord {
    fn from(row: StoredAdapter) -> Self {
        let ipv4 = row
            .ipv4
            .map(|joined| {
                joined
                    .split(IPV4_SEPARATOR)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        NetworkAdapterRecord {
            name: row.name,
            mac: row.mac,
            ipv4,
        }
    }
}

pub(super) async fn replace_network_adapters(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
    adapters: &[NetworkAdapterRecord],
) -> Result<(), sqlx::Error> {
    delete_for_machine(conn, NETWORK_ADAPTERS_TABLE_NAME, machine_id).await?;

    let statement = format!(
        "INSERT INTO {} (machine_id, name, mac, ipv4) VALUES (?, ?, ?, ?)",
        NETWORK_ADAPTERS_TABLE_NAME
    );
    for adapter in adapters {
        let ipv4 = if adapter.ipv4.is_empty() {
            None
        } else {
            Some(adapter.ipv4.join(&IPV4_SEPARATOR.to_string()))
        };

        sqlx::query(&statement)
            .bind(machine_id)
            .bind(&adapter.name)
            .bind(&adapter.mac)
            .bind(ipv4)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub(super) async fn fetch_network_adapters(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
) -> Result<Vec<NetworkAdapterRecord>, sqlx::Error> {
    let statement = format!(
        "SELECT name, mac, ipv4 FROM {} WHERE machine_id = ? ORDER BY id",
        NETWORK_ADAPTERS_TABLE_NAME
    );

    let rows = sqlx::query_as::<_, StoredAdapter>(&statement)
        .bind(machine_id)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(NetworkAdapterRecord::from).collect())
}

pub(super) async fn create_network_adapters_table(
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_id INTEGER NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
        name TEXT,
        mac TEXT,
        ipv4 TEXT
    )",
        NETWORK_ADAPTERS_TABLE_NAME
    );

    sqlx::query(&statement).execute(&mut *conn).await?;
    create_child_index(conn, NETWORK_ADAPTERS_TABLE_NAME).await
}
