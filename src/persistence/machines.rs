use log::{info, warn};
use sqlx::SqliteConnection;

use crate::error::PersistError;
use crate::inventory::models::NaturalKey;
use crate::inventory::MachineIdentity;

use super::{FetchId, MachineId};

pub(super) const MACHINES_TABLE_NAME: &str = "machines";

// attributes a later snapshot may change; the natural keys are not among them
const MUTABLE_SET: &str = "user_name = ?, manufacturer = ?, model = ?, os_caption = ?, os_version = ?, os_arch = ?, updated_at = ?";
const MUTABLE_SET_FROM_EXCLUDED: &str = "user_name = excluded.user_name,
        manufacturer = excluded.manufacturer,
        model = excluded.model,
        os_caption = excluded.os_caption,
        os_version = excluded.os_version,
        os_arch = excluded.os_arch,
        updated_at = excluded.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct MatchedByName {
    id: i64,
    bios_serial: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct StoredMachine {
    machine_name: String,
    user_name: Option<String>,
    manufacturer: Option<String>,
    model: Option<String>,
    bios_serial: Option<String>,
    os_caption: Option<String>,
    os_version: Option<String>,
    os_arch: Option<String>,
    updated_at: i64,
}

/// Finds the stored row for `identity` and refreshes its mutable
/// attributes, or creates it. Returns the row id, which never changes once
/// created.
///
/// A row holding the same BIOS serial wins; otherwise a row with the same
/// machine name is taken over (recording the serial if it had none).
/// Every statement here writes, so the caller's transaction holds the
/// database write lock from the first one on.
pub(super) async fn resolve_machine(
    conn: &mut SqliteConnection,
    identity: &MachineIdentity,
    now: i64,
) -> Result<MachineId, PersistError> {
    let machine_name = identity.machine_name.trim();
    let bios_serial = reported_serial(identity);

    if let Some(serial) = bios_serial {
        let statement = format!(
            "UPDATE {} SET {} WHERE bios_serial = ? RETURNING id",
            MACHINES_TABLE_NAME, MUTABLE_SET
        );
        let matched = bind_mutable(sqlx::query_as::<_, FetchId>(&statement), identity, now)
            .bind(serial)
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(row) = matched {
            info!("machine {} matched by bios serial as id {}", machine_name, row.id);
            return Ok(row.id);
        }
    }

    let statement = format!(
        "UPDATE {} SET {}, bios_serial = COALESCE(bios_serial, ?)
        WHERE machine_name = ?
        RETURNING id, bios_serial",
        MACHINES_TABLE_NAME, MUTABLE_SET
    );
    let matched = bind_mutable(sqlx::query_as::<_, MatchedByName>(&statement), identity, now)
        .bind(bios_serial)
        .bind(machine_name)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(row) = matched {
        match (bios_serial, row.bios_serial.as_deref()) {
            (Some(reported), Some(stored)) if reported != stored => warn!(
                "machine {} (id {}) reports bios serial {} but is stored with {}; keeping the stored one",
                machine_name, row.id, reported, stored
            ),
            _ => {}
        }
        info!("machine {} matched by name as id {}", machine_name, row.id);
        return Ok(row.id);
    }

    let machine_id = insert_machine(conn, identity, now).await?;
    info!("machine {} registered as id {}", machine_name, machine_id);

    Ok(machine_id)
}

/// Creates the row for `identity`.
///
/// A row that appeared since the lookups is updated instead when it is the
/// same machine: same serial and same name, or same name with no serial
/// stored yet. A clash with a different machine's key is an
/// `IdentityConflict` and changes nothing.
pub(super) async fn insert_machine(
    conn: &mut SqliteConnection,
    identity: &MachineIdentity,
    now: i64,
) -> Result<MachineId, PersistError> {
    let machine_name = identity.machine_name.trim();
    let bios_serial = reported_serial(identity);

    // a DO UPDATE whose WHERE fails leaves the row alone and returns nothing
    let statement = format!(
        "INSERT INTO {}
        (machine_name, bios_serial, user_name, manufacturer, model, os_caption, os_version, os_arch, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(bios_serial) DO UPDATE SET {}
            WHERE machine_name = excluded.machine_name
        ON CONFLICT(machine_name) DO UPDATE SET {},
            bios_serial = COALESCE(bios_serial, excluded.bios_serial)
        RETURNING id",
        MACHINES_TABLE_NAME, MUTABLE_SET_FROM_EXCLUDED, MUTABLE_SET_FROM_EXCLUDED
    );
    let inserted = sqlx::query_as::<_, FetchId>(&statement)
        .bind(machine_name)
        .bind(bios_serial)
        .bind(&identity.user_name)
        .bind(&identity.manufacturer)
        .bind(&identity.model)
        .bind(&identity.os_caption)
        .bind(&identity.os_version)
        .bind(&identity.os_architecture)
        .bind(now)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await;

    let conflict = || PersistError::IdentityConflict {
        machine_name: machine_name.to_owned(),
        bios_serial: bios_serial.map(str::to_owned),
    };

    match inserted {
        Ok(Some(row)) => Ok(row.id),
        // serial taken by a machine with another name
        Ok(None) => Err(conflict()),
        // name taken by a machine whose serial slot cannot take ours
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(conflict()),
        Err(e) => Err(e.into()),
    }
}

fn reported_serial(identity: &MachineIdentity) -> Option<&str> {
    match identity.natural_key() {
        NaturalKey::BiosSerial(serial) => Some(serial),
        NaturalKey::MachineName(_) => None,
    }
}

fn bind_mutable<'q, O>(
    query: sqlx::query::QueryAs<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>>,
    identity: &'q MachineIdentity,
    now: i64,
) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&identity.user_name)
        .bind(&identity.manufacturer)
        .bind(&identity.model)
        .bind(&identity.os_caption)
        .bind(&identity.os_version)
        .bind(&identity.os_architecture)
        .bind(now)
}

/// The stored identity and its last update time (unix seconds).
pub(super) async fn fetch_machine(
    conn: &mut SqliteConnection,
    machine_id: MachineId,
) -> Result<Option<(MachineIdentity, i64)>, sqlx::Error> {
    let statement = format!(
        "SELECT machine_name, user_name, manufacturer, model, bios_serial, os_caption, os_version, os_arch, updated_at
        FROM {}
        WHERE id = ?",
        MACHINES_TABLE_NAME
    );

    let row = sqlx::query_as::<_, StoredMachine>(&statement)
        .bind(machine_id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(|row| {
        (
            MachineIdentity {
                machine_name: row.machine_name,
                user_name: row.user_name,
                manufacturer: row.manufacturer,
                model: row.model,
                bios_serial: row.bios_serial,
                os_caption: row.os_caption,
                os_version: row.os_version,
                os_architecture: row.os_arch,
            },
            row.updated_at,
        )
    }))
}

pub(super) async fn create_machines_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine_name TEXT NOT NULL UNIQUE,
        bios_serial TEXT UNIQUE,
        user_name TEXT,
        manufacturer TEXT,
        model TEXT,
        os_caption TEXT,
        os_version TEXT,
        os_arch TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
        MACHINES_TABLE_NAME
    );

    sqlx::query(&statement).execute(conn).await?;

    Ok(())
}
