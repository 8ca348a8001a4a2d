//! Non-finite value scrubbing
//!
//! NaN and infinities have no JSON form. Every tabular response runs through
//! [`sanitize_batch`], which turns them into nulls.

use tracing::debug;

use crate::data::{Cell, RecordBatch};

/// Replace non-finite floats in place; returns the number of cells changed
pub fn sanitize_batch(batch: &mut RecordBatch) -> usize {
    let mut replaced = 0;
    for row in batch.rows_mut() {
        for cell in row.iter_mut().filter(|c| c.is_non_finite()) {
            *cell = Cell::Null;
            replaced += 1;
        }
    }
    if replaced > 0 {
        debug!("Sanitized {} non-finite cells", replaced);
    }
    replaced
}

/// Finite value or `None`
pub fn sanitize_value(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
