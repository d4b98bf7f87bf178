use tracing::debug;

use crate::{CoreError, MeasurementContext, MeasurementId, TemperatureMeasurement};

/// CRUD access to stored temperature measurements.
///
/// Generic over the persistence context so the same repository runs against
/// the in-memory fake in tests and a relational store in production. Every
/// mutating call is one unit of work run through
/// [`MeasurementContext::transaction`]: it is committed before the call
/// returns, or rolled back and its error returned.
pub struct TemperatureRepository<C: MeasurementContext> {
    ctx: C,
}

impl<C: MeasurementContext> TemperatureRepository<C> {
    pub fn new(ctx: C) -> Self {
        Self { ctx }
    }

    /// All stored measurements, empty when the table is empty.
    pub fn get_temp_list(&self) -> Result<Vec<TemperatureMeasurement>, CoreError> {
        self.ctx.measurements()
    }

    /// The measurement with the given id, or `None` if there is no such row.
    pub fn get_id(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError> {
        self.ctx.find(id)
    }

    /// Insert a new measurement and return it with the store-assigned id.
    ///
    /// Any id already set on `measurement` is ignored.
    pub fn add(&self, measurement: TemperatureMeasurement) -> Result<TemperatureMeasurement, CoreError> {
        let id = self.ctx.transaction(|tx| tx.insert(&measurement))?;
        debug!(id, "measurement added");
        Ok(TemperatureMeasurement { id, ..measurement })
    }

    /// Overwrite date and temperatures of the row `id` with `new_values`.
    ///
    /// Returns `None` and changes nothing when `id` does not exist.
    pub fn update(
        &self,
        id: MeasurementId,
        new_values: &TemperatureMeasurement,
    ) -> Result<Option<TemperatureMeasurement>, CoreError> {
        let updated = self.ctx.transaction(|tx| {
            let Some(mut current) = tx.find(id)? else {
                return Ok(None);
            };
            current.overwrite_from(new_values);
            Ok(tx.update(&current)?.then_some(current))
        })?;
        match updated {
            Some(_) => debug!(id, "measurement updated"),
            None => debug!(id, "update skipped, no such measurement"),
        }
        Ok(updated)
    }

    /// Remove the row `id` and return what was stored.
    ///
    /// Returns `None` and changes nothing when `id` does not exist.
    pub fn delete(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError> {
        let removed = self.ctx.transaction(|tx| {
            let Some(current) = tx.find(id)? else {
                return Ok(None);
            };
            Ok(tx.remove(id)?.then_some(current))
        })?;
        match removed {
            Some(_) => debug!(id, "measurement deleted"),
            None => debug!(id, "delete skipped, no such measurement"),
        }
        Ok(removed)
    }

    /// Remove every measurement and reset the id seed. Returns how many rows were removed.
    ///
    /// Setup/teardown hook for callers that share one store between runs.
    pub fn clear(&self) -> Result<usize, CoreError> {
        let removed = self.ctx.transaction(|tx| tx.truncate())?;
        debug!(removed, "measurements cleared");
        Ok(removed)
    }
}
