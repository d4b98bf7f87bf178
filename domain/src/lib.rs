//! Domain library for the HeatWave temperature log.
//!
//! This crate holds the measurement entity, the persistence context port
//! (trait), the repository built on top of it and the error definitions.
//! Keep database drivers and other IO concerns out of this crate.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the store on insert. `0` marks an unsaved value.
pub type MeasurementId = i64;

/// One recorded pair of indoor/outdoor temperatures with a timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureMeasurement {
    #[serde(default)]
    pub id: MeasurementId,
    pub date: NaiveDateTime,
    pub in_door_temperature: f64,
    pub out_door_temperature: f64,
}

impl TemperatureMeasurement {
    /// Create a measurement that has not been persisted yet (id 0).
    pub fn new(date: NaiveDateTime, in_door_temperature: f64, out_door_temperature: f64) -> Self {
        Self {
            id: 0,
            date,
            in_door_temperature,
            out_door_temperature,
        }
    }

    /// Whether the store has assigned an id to this measurement.
    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// Copy every field except the id from `other`.
    pub fn overwrite_from(&mut self, other: &TemperatureMeasurement) {
        self.date = other.date;
        self.in_door_temperature = other.in_door_temperature;
        self.out_door_temperature = other.out_door_temperature;
    }
}

/// Staged view of the measurement table inside one unit of work.
///
/// Reads observe the changes staged earlier in the same unit of work.
pub trait MeasurementTx {
    fn find(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError>;
    /// Stage an insert of every field except the id; returns the assigned id.
    fn insert(&mut self, measurement: &TemperatureMeasurement) -> Result<MeasurementId, CoreError>;
    /// Stage an overwrite of the row with `measurement.id`. Returns false if no row matched.
    fn update(&mut self, measurement: &TemperatureMeasurement) -> Result<bool, CoreError>;
    /// Stage removal of the row. Returns false if no row matched.
    fn remove(&mut self, id: MeasurementId) -> Result<bool, CoreError>;
    /// Stage removal of every row and reset the id seed. Returns the number of rows removed.
    fn truncate(&mut self) -> Result<usize, CoreError>;
}

/// Persistence context port: connection lifecycle, row mapping and commit.
pub trait MeasurementContext: Send + Sync {
    fn measurements(&self) -> Result<Vec<TemperatureMeasurement>, CoreError>;
    fn find(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError>;
    /// Run `work` as one unit of work.
    ///
    /// The context is held exclusively from the first staged change until the
    /// commit (when `work` returns `Ok`) or the rollback (when it returns `Err`
    /// or the commit fails). No other caller observes or commits a partial
    /// unit of work.
    fn transaction<T, F>(&self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut dyn MeasurementTx) -> Result<T, CoreError>;
}

impl<C: MeasurementContext> MeasurementContext for Arc<C> {
    fn measurements(&self) -> Result<Vec<TemperatureMeasurement>, CoreError> {
        (**self).measurements()
    }

    fn find(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError> {
        (**self).find(id)
    }

    fn transaction<T, F>(&self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut dyn MeasurementTx) -> Result<T, CoreError>,
    {
        (**self).transaction(work)
    }
}

/// Core domain errors (no external error crates to keep deps small).
#[derive(Debug)]
pub enum CoreError {
    /// Store or connectivity failure reported by the context.
    Repository(String),
    /// A stored row that cannot be mapped back to a measurement.
    Corrupt(String),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::Repository(msg) => write!(f, "repository error: {}", msg),
            CoreError::Corrupt(msg) => write!(f, "corrupt row: {}", msg),
        }
    }
}

impl Error for CoreError {}

/// Return a short about/version line for binaries to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - temperature log domain", pkg, ver)
}

pub mod adapters;
pub mod repository;

pub use repository::TemperatureRepository;
