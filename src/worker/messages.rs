//! Value forms and the worker update protocol.
//!
//! These types define the closed set of field-value encodings a caller
//! can submit, and the messages workers send back to the coordinator.

use std::fmt;

/// Boxed error type carried by failed producers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by deferred producers.
pub type ProduceResult = Result<Datum, BoxError>;

/// A raw field value, before any transform or formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// A string value.
    Str(String),
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
    /// A mapping from column names to values.  The only value form that
    /// can introduce new columns.
    Map(Vec<(String, Datum)>),
    /// No value.  Renders as the column's `missing` placeholder.
    Missing,
}

impl Datum {
    /// Whether this is the missing marker.
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Plain string form, ignoring any column transform.  Missing values
    /// become the empty string; the column placeholder is applied later.
    pub fn to_display(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{k}={}", v.to_display()))
                    .collect();
                parts.join(",")
            }
            Self::Missing => String::new(),
        }
    }

    /// Numeric view, used by interval lookups and numeric aggregates.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(x) => Some(*x),
            Self::Str(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Datum {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Datum {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

/// A one-shot callable producing a single value.
pub type OnceFn = Box<dyn FnOnce() -> ProduceResult + Send + 'static>;

/// A pull-based stream of values.  Each item replaces the previous one;
/// exhaustion is a terminal state, not an error.
pub type StreamIter = Box<dyn Iterator<Item = ProduceResult> + Send + 'static>;

/// A deferred source of cell values.
pub enum Producer {
    /// Runs once and yields one value.
    Once(OnceFn),
    /// Yields a sequence of values, one dispatch at a time.
    Stream(StreamIter),
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once(_) => f.write_str("Producer::Once"),
            Self::Stream(_) => f.write_str("Producer::Stream"),
        }
    }
}

/// A field value as submitted by the caller: either a literal, or a
/// deferred producer with an optional initial value shown while pending.
pub enum Value {
    /// A plain value written directly to the cell.
    Literal(Datum),
    /// A value resolved asynchronously through the worker pool.
    Deferred {
        /// Shown until the first produced value arrives.  `None` shows
        /// the column's missing placeholder.
        initial: Option<Datum>,
        /// The producer to run.
        producer: Producer,
    },
}

impl Value {
    /// A literal value.
    pub fn literal(value: impl Into<Datum>) -> Self {
        Self::Literal(value.into())
    }

    /// A one-shot callable with no initial value.
    pub fn call<F>(f: F) -> Self
    where
        F: FnOnce() -> ProduceResult + Send + 'static,
    {
        Self::Deferred {
            initial: None,
            producer: Producer::Once(Box::new(f)),
        }
    }

    /// A one-shot callable with an initial value shown while pending.
    pub fn call_with<F>(initial: impl Into<Datum>, f: F) -> Self
    where
        F: FnOnce() -> ProduceResult + Send + 'static,
    {
        Self::Deferred {
            initial: Some(initial.into()),
            producer: Producer::Once(Box::new(f)),
        }
    }

    /// A stream of values; each replaces the previous one.
    pub fn stream<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = ProduceResult>,
        I::IntoIter: Send + 'static,
    {
        Self::Deferred {
            initial: None,
            producer: Producer::Stream(Box::new(iter.into_iter())),
        }
    }

    /// A stream with an initial value shown until the first item.
    pub fn stream_with<I>(initial: impl Into<Datum>, iter: I) -> Self
    where
        I: IntoIterator<Item = ProduceResult>,
        I::IntoIter: Send + 'static,
    {
        Self::Deferred {
            initial: Some(initial.into()),
            producer: Producer::Stream(Box::new(iter.into_iter())),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(d) => f.debug_tuple("Literal").field(d).finish(),
            Self::Deferred { initial, producer } => f
                .debug_struct("Deferred")
                .field("initial", initial)
                .field("producer", producer)
                .finish(),
        }
    }
}

/// A row as submitted by the caller.
pub enum RowInput {
    /// Values aligned positionally to the declared columns.
    Sequence(Vec<Value>),
    /// Explicit column-to-value pairs.  Unknown names grow the column
    /// set.
    Named(Vec<(String, Value)>),
}

impl RowInput {
    /// Build a named row from `(column, value)` pairs.
    pub fn named<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Named(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Vec<Value>> for RowInput {
    fn from(values: Vec<Value>) -> Self {
        Self::Sequence(values)
    }
}

/// Identifies one cell: a row by arrival index and a column by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    /// Row arrival index.
    pub row: usize,
    /// Column name.
    pub column: String,
}

/// One unit of deferred resolution work.
///
/// At most one unit is outstanding per cell: a stream yields one value
/// per dispatch and its remainder is re-enqueued only after the yielded
/// value has been applied.
#[derive(Debug)]
pub struct PendingWork {
    /// The cell this work resolves.
    pub coord: Coordinate,
    /// The producer to run.
    pub producer: Producer,
}

/// Messages sent from workers to the coordinator over the ordered
/// update channel.
pub enum WorkUpdate {
    /// A one-shot producer finished; the cell is no longer pending.
    Value {
        /// Target cell.
        coord: Coordinate,
        /// Produced value.
        value: Datum,
    },
    /// A stream yielded a value; the cell stays pending and `rest` must
    /// be re-enqueued once the value has been applied.
    StreamYield {
        /// Target cell.
        coord: Coordinate,
        /// Yielded value.
        value: Datum,
        /// The unexhausted remainder of the stream.
        rest: StreamIter,
    },
    /// A stream is exhausted; the cell is no longer pending.
    StreamDone {
        /// Target cell.
        coord: Coordinate,
    },
    /// The producer failed.  The cell is no longer pending and keeps its
    /// last-known value.
    Failed {
        /// Target cell.
        coord: Coordinate,
        /// The underlying cause.
        error: BoxError,
    },
}
