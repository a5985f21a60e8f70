//! # Livetable
//!
//! A live-updating terminal table for streaming records.
//!
//! Livetable paints tabular rows as they arrive and rewrites them in
//! place as asynchronous cell values resolve, without flickering or
//! repainting untouched lines.
//!
//! ## Core Concepts
//!
//! - **Single coordinator**: one thread owns the table model and the
//!   sink; workers only compute values
//! - **Ordered updates**: every produced value crosses one channel and
//!   is applied, then painted, one at a time
//! - **Line tracking**: the renderer knows what is on each terminal
//!   line and rewrites the minimum
//! - **Modes**: in-place update for terminals, append-once incremental,
//!   or a single final table for pipes
//!
//! ## Example
//!
//! ```rust,no_run
//! use livetable::{Config, Session, TableStyle, Value};
//!
//! let columns = vec!["name".to_owned(), "status".to_owned()];
//! let mut table = Session::stdout(columns, TableStyle::default(), Config::default())?;
//!
//! table.submit(vec![Value::literal("job-1"), Value::literal("queued")].into())?;
//! table.submit(vec![
//!     Value::literal("job-2"),
//!     Value::call_with("waiting", || Ok("done".into())),
//! ].into())?;
//!
//! table.close()?;
//! # Ok::<(), livetable::TableError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod render;
mod session;
pub mod style;
pub mod table;
pub mod worker;

// Re-exports for convenience
pub use config::{Config, Mode};
pub use error::{ResolutionFailure, TableError};
pub use session::Session;
pub use style::{
    Align, Attrs, Color, Extent, HidePolicy, Select, StyleSpec, TableStyle, TruncateSide,
    WidthSpec,
};
pub use worker::{Datum, Producer, RowInput, Value};
