//! sqlite-adapter - SQLite implementation of the MeasurementContext port.
//!
//! Purpose
//! - Provide a lightweight, file-based store for the temperature log so it
//!   runs locally without a database server.
//! - Implements the `MeasurementContext` trait from the `domain` crate; wrap
//!   it in `domain::TemperatureRepository` for the CRUD surface.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Dates are stored through rusqlite's chrono mapping (ISO-8601 TEXT).
//! - Each unit of work is one `rusqlite::Transaction` held under the
//!   connection lock from the first statement until COMMIT or ROLLBACK.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use domain::{CoreError, MeasurementContext, MeasurementId, MeasurementTx, TemperatureMeasurement};
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

const SELECT_COLUMNS: &str =
    "SELECT Id, Date, InDoorTemperature, OutDoorTemperature FROM TemperatureMeasurement";

/// SQLite-backed persistence context.
pub struct SqliteContext {
    conn: Mutex<Connection>,
}

impl SqliteContext {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path.as_ref()).map_err(map_sqerr)?;
        init_schema(&conn)?;
        info!(path = %path.as_ref().display(), "sqlite context ready");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open a private in-memory database. Data is gone when the context drops.
    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Like [`SqliteContext::new`] but creates the parent directory first.
    pub fn open_creating_dirs<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    CoreError::Repository(format!("create {}: {e}", dir.display()))
                })?;
            }
        }
        Self::new(path)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS TemperatureMeasurement (
            Id INTEGER PRIMARY KEY AUTOINCREMENT,
            Date TEXT NOT NULL,
            InDoorTemperature REAL NOT NULL,
            OutDoorTemperature REAL NOT NULL
        );
        "#,
    )
    .map_err(map_sqerr)?;
    debug!("schema ensured");
    Ok(())
}

// A transaction left open by a failed ROLLBACK must not absorb the next unit of work.
fn discard_stale_transaction(conn: &Connection) -> Result<(), CoreError> {
    if !conn.is_autocommit() {
        warn!("stale transaction found on connection, rolling it back");
        conn.execute_batch("ROLLBACK").map_err(map_sqerr)?;
    }
    Ok(())
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn row_to_measurement(row: &rusqlite::Row) -> Result<TemperatureMeasurement, CoreError> {
    let id: i64 = row.get(0).map_err(map_sqerr)?;
    if id <= 0 {
        return Err(CoreError::Corrupt(format!("non-positive id {id}")));
    }
    let date = row
        .get(1)
        .map_err(|e| CoreError::Corrupt(format!("bad date in row {id}: {e}")))?;
    let in_door_temperature: f64 = row.get(2).map_err(map_sqerr)?;
    let out_door_temperature: f64 = row.get(3).map_err(map_sqerr)?;
    Ok(TemperatureMeasurement {
        id,
        date,
        in_door_temperature,
        out_door_temperature,
    })
}

fn select_all(conn: &Connection) -> Result<Vec<TemperatureMeasurement>, CoreError> {
    let mut stmt = conn
        .prepare(&format!("{SELECT_COLUMNS} ORDER BY Id"))
        .map_err(map_sqerr)?;
    let mut rows = stmt.query([]).map_err(map_sqerr)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(map_sqerr)? {
        out.push(row_to_measurement(row)?);
    }
    Ok(out)
}

fn select_one(conn: &Connection, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError> {
    let mut stmt = conn
        .prepare(&format!("{SELECT_COLUMNS} WHERE Id = ?1"))
        .map_err(map_sqerr)?;
    let mut rows = stmt.query(params![id]).map_err(map_sqerr)?;
    if let Some(row) = rows.next().map_err(map_sqerr)? {
        Ok(Some(row_to_measurement(row)?))
    } else {
        Ok(None)
    }
}

/// Statements issued inside one open transaction.
struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl MeasurementTx for SqliteTx<'_> {
    fn find(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError> {
        select_one(self.conn, id)
    }

    fn insert(&mut self, measurement: &TemperatureMeasurement) -> Result<MeasurementId, CoreError> {
        self.conn
            .execute(
                "INSERT INTO TemperatureMeasurement(Date, InDoorTemperature, OutDoorTemperature) VALUES (?1, ?2, ?3)",
                params![
                    measurement.date,
                    measurement.in_door_temperature,
                    measurement.out_door_temperature,
                ],
            )
            .map_err(map_sqerr)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&mut self, measurement: &TemperatureMeasurement) -> Result<bool, CoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE TemperatureMeasurement SET Date = ?1, InDoorTemperature = ?2, OutDoorTemperature = ?3 WHERE Id = ?4",
                params![
                    measurement.date,
                    measurement.in_door_temperature,
                    measurement.out_door_temperature,
                    measurement.id,
                ],
            )
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    fn remove(&mut self, id: MeasurementId) -> Result<bool, CoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM TemperatureMeasurement WHERE Id = ?1", params![id])
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    fn truncate(&mut self) -> Result<usize, CoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM TemperatureMeasurement", [])
            .map_err(map_sqerr)?;
        self.conn
            .execute(
                "DELETE FROM sqlite_sequence WHERE name = 'TemperatureMeasurement'",
                [],
            )
            .map_err(map_sqerr)?;
        Ok(removed)
    }
}

impl MeasurementContext for SqliteContext {
    fn measurements(&self) -> Result<Vec<TemperatureMeasurement>, CoreError> {
        let conn = self.lock()?;
        select_all(&conn)
    }

    fn find(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError> {
        let conn = self.lock()?;
        select_one(&conn, id)
    }

    fn transaction<T, F>(&self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut dyn MeasurementTx) -> Result<T, CoreError>,
    {
        let mut conn = self.lock()?;
        discard_stale_transaction(&conn)?;
        let tx = conn.transaction().map_err(map_sqerr)?;
        match work(&mut SqliteTx { conn: &tx }) {
            Ok(value) => {
                // A failed COMMIT drops `tx`, which rolls back.
                tx.commit().map_err(map_sqerr)?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    warn!(err = %rb, "rollback failed");
                    return Err(CoreError::Repository(format!("{e}; rollback failed: {rb}")));
                }
                debug!("transaction rolled back");
                Err(e)
            }
        }
    }
}
