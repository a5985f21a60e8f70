//! Table model: authoritative state, width allocation, and summaries.

mod state;
mod summary;
mod width;

pub use state::{Cell, TableState};
pub use summary::{summarize, AggregateState};
pub use width::{allocate, ColumnDemand};
