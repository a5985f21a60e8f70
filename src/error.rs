//! Error taxonomy for table sessions.

use std::fmt;

/// A deferred producer failed while resolving a cell.
#[derive(Debug)]
pub struct ResolutionFailure {
    /// ID-column values of the affected row.
    pub row: Vec<String>,
    /// Column whose producer failed.
    pub column: String,
    /// Message from the underlying cause.
    pub message: String,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "producing value for row {:?}, column {:?} failed: {}",
            self.row, self.column, self.message
        )
    }
}

/// Errors surfaced by a table session.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The style or session configuration is invalid.  Raised at open,
    /// before any output.
    #[error("invalid style for {key}: {reason}")]
    Schema {
        /// Style key or configuration field at fault.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// One or more deferred producers failed.  Under
    /// `continue_on_failure` this carries every failure collected over
    /// the session; otherwise it carries the first.
    #[error("{} asynchronous producer(s) failed", .failures.len())]
    Resolution {
        /// The collected failures, in arrival order.
        failures: Vec<ResolutionFailure>,
    },

    /// The output sink became unwritable mid-session.  Fatal; terminal
    /// restoration is still attempted on close.
    #[error("output stream failed")]
    Render(#[from] std::io::Error),
}

impl TableError {
    pub(crate) fn schema(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
