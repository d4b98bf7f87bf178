use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::{CoreError, MeasurementContext, MeasurementId, MeasurementTx, TemperatureMeasurement};

/// Simple in-memory persistence context for tests and demos.
///
/// A unit of work runs against a copy of the table taken under the lock; the
/// copy replaces the committed table on success and is dropped on error.
pub struct InMemoryContext {
    inner: Mutex<Table>,
}

#[derive(Clone, Default)]
struct Table {
    rows: BTreeMap<MeasurementId, TemperatureMeasurement>,
    last_id: MeasurementId,
}

impl MeasurementTx for Table {
    fn find(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError> {
        Ok(self.rows.get(&id).cloned())
    }

    fn insert(&mut self, measurement: &TemperatureMeasurement) -> Result<MeasurementId, CoreError> {
        self.last_id += 1;
        let id = self.last_id;
        self.rows.insert(
            id,
            TemperatureMeasurement {
                id,
                ..measurement.clone()
            },
        );
        Ok(id)
    }

    fn update(&mut self, measurement: &TemperatureMeasurement) -> Result<bool, CoreError> {
        match self.rows.get_mut(&measurement.id) {
            Some(row) => {
                *row = measurement.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&mut self, id: MeasurementId) -> Result<bool, CoreError> {
        Ok(self.rows.remove(&id).is_some())
    }

    fn truncate(&mut self) -> Result<usize, CoreError> {
        let removed = self.rows.len();
        *self = Table::default();
        Ok(removed)
    }
}

impl InMemoryContext {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Table::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Table>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

impl Default for InMemoryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementContext for InMemoryContext {
    fn measurements(&self) -> Result<Vec<TemperatureMeasurement>, CoreError> {
        let table = self.lock()?;
        Ok(table.rows.values().cloned().collect())
    }

    fn find(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError> {
        let table = self.lock()?;
        table.find(id)
    }

    fn transaction<T, F>(&self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut dyn MeasurementTx) -> Result<T, CoreError>,
    {
        let mut table = self.lock()?;
        let mut staged = table.clone();
        let value = work(&mut staged)?;
        *table = staged;
        Ok(value)
    }
}
