//! Deferred value resolution: value forms, the worker pool, and the
//! update protocol back to the coordinator.

mod messages;
mod pool;
mod resolver;

pub use messages::{
    BoxError, Coordinate, Datum, OnceFn, PendingWork, ProduceResult, Producer, RowInput,
    StreamIter, Value, WorkUpdate,
};
pub use pool::WorkerPool;
pub use resolver::{resolve_row, ResolvedRow};
