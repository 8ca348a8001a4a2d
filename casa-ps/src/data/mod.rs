//! Dataset access: typed cells, record batches, raw records

mod batch;
mod cell;
mod record;

pub use batch::RecordBatch;
pub use cell::Cell;
pub use record::{PropertyRecord, RawValue};
