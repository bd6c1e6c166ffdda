// Step - one position in a sequence
// A locked, rectangular table of rows plus an active flag and trigger callback

use crate::command::parameter::{CMD_COL, ROW_WIDTH};
use crate::command::registry::CommandRegistry;
use crate::sequencer::error::{SequencerError, SequencerResult};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Invoked with a snapshot of the step's rows when the step triggers
pub type StepCallback = Arc<dyn Fn(&[Vec<f64>]) + Send + Sync>;

struct StepState {
    data: Vec<Vec<f64>>,
    active: bool,
    callback: Option<StepCallback>,
}

/// A step's data table guarded by its own reader/writer lock
///
/// Callers only ever receive copies of the rows. Never `Clone`: steps are
/// owned by their sequence and move with it.
pub struct Step {
    inner: RwLock<StepState>,
}

impl Step {
    /// Step with a single row
    pub fn new(default_row: Vec<f64>) -> Self {
        Self {
            inner: RwLock::new(StepState {
                data: vec![default_row],
                active: true,
                callback: None,
            }),
        }
    }

    /// Copy of every row
    pub fn data(&self) -> Vec<Vec<f64>> {
        self.inner.read().data.clone()
    }

    /// Replace the whole table
    ///
    /// The table must be non-empty and every row exactly `ROW_WIDTH` wide.
    /// Every cell is clamped through the registry before it is stored.
    pub fn set_data(&self, mut data: Vec<Vec<f64>>, registry: &CommandRegistry) -> SequencerResult<()> {
        validate_table(&data)?;
        for row in data.iter_mut() {
            registry.clamp_row(row)?;
        }
        self.inner.write().data = data;
        Ok(())
    }

    pub fn data_at(&self, row: usize, col: usize) -> SequencerResult<f64> {
        let state = self.inner.read();
        let values = row_ref(&state.data, row)?;
        values
            .get(col)
            .copied()
            .ok_or(SequencerError::ColumnOutOfRange {
                index: col,
                width: values.len(),
            })
    }

    /// Copy of one row
    pub fn row(&self, row: usize) -> SequencerResult<Vec<f64>> {
        let state = self.inner.read();
        row_ref(&state.data, row).map(|r| r.to_vec())
    }

    /// Store `value` in `(row, col)` after clamping it through the registry
    ///
    /// Changing the command column re-clamps the rest of the row to the new
    /// command's ranges. Returns the value actually stored.
    pub fn set_data_at(
        &self,
        row: usize,
        col: usize,
        value: f64,
        registry: &CommandRegistry,
    ) -> SequencerResult<f64> {
        let mut state = self.inner.write();
        let count = state.data.len();
        let values = state
            .data
            .get_mut(row)
            .ok_or(SequencerError::RowOutOfRange { index: row, count })?;
        let clamped = registry.clamp_value(values, col, value)?;
        values[col] = clamped;
        if col == CMD_COL {
            registry.clamp_row(values)?;
        }
        Ok(clamped)
    }

    /// Append a row, clamped through the registry
    pub fn add_row(&self, mut row: Vec<f64>, registry: &CommandRegistry) -> SequencerResult<()> {
        registry.clamp_row(&mut row)?;
        self.inner.write().data.push(row);
        Ok(())
    }

    /// Remove a row; the last remaining row is never removed
    ///
    /// Returns true if a row was removed.
    pub fn remove_row(&self, row: usize) -> SequencerResult<bool> {
        let mut state = self.inner.write();
        let count = state.data.len();
        if row >= count {
            return Err(SequencerError::RowOutOfRange { index: row, count });
        }
        if count == 1 {
            return Ok(false);
        }
        state.data.remove(row);
        Ok(true)
    }

    pub fn row_count(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn col_count(&self) -> usize {
        ROW_WIDTH
    }

    /// Zero one row
    pub fn reset_row(&self, row: usize) -> SequencerResult<()> {
        let mut state = self.inner.write();
        let count = state.data.len();
        let values = state
            .data
            .get_mut(row)
            .ok_or(SequencerError::RowOutOfRange { index: row, count })?;
        values.iter_mut().for_each(|v| *v = 0.0);
        Ok(())
    }

    /// Zero every row and reactivate; the callback is kept
    pub fn reset(&self) {
        let mut state = self.inner.write();
        for row in state.data.iter_mut() {
            row.iter_mut().for_each(|v| *v = 0.0);
        }
        state.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.inner.read().active
    }

    pub fn set_active(&self, active: bool) {
        self.inner.write().active = active;
    }

    pub fn toggle_active(&self) {
        let mut state = self.inner.write();
        state.active = !state.active;
    }

    pub fn callback(&self) -> Option<StepCallback> {
        self.inner.read().callback.clone()
    }

    pub fn set_callback(&self, callback: Option<StepCallback>) {
        self.inner.write().callback = callback;
    }

    /// Invoke the callback with a snapshot of the rows; no-op when inactive
    pub fn trigger(&self) {
        let (data, callback) = {
            let state = self.inner.read();
            if !state.active {
                return;
            }
            (state.data.clone(), state.callback.clone())
        };
        if let Some(callback) = callback {
            callback(&data);
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("Step")
            .field("data", &state.data)
            .field("active", &state.active)
            .field("has_callback", &state.callback.is_some())
            .finish()
    }
}

fn row_ref(data: &[Vec<f64>], row: usize) -> SequencerResult<&Vec<f64>> {
    data.get(row).ok_or(SequencerError::RowOutOfRange {
        index: row,
        count: data.len(),
    })
}

pub(crate) fn validate_table(data: &[Vec<f64>]) -> SequencerResult<()> {
    if data.is_empty() {
        return Err(SequencerError::InvalidData("step needs at least one row".to_string()));
    }
    if let Some(bad) = data.iter().find(|row| row.len() != ROW_WIDTH) {
        return Err(SequencerError::InvalidData(format!(
            "row has {} columns, expected {}",
            bad.len(),
            ROW_WIDTH
        )));
    }
    Ok(())
}
