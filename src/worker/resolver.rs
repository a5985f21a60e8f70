//! Splits submitted rows into immediate cell writes and pending work.
//!
//! Classification is by the [`Value`] tag, never by probing: a literal
//! is written directly, a deferred producer contributes its initial
//! value (or nothing) and a unit of pending work.  A literal mapping
//! spreads into per-column writes, which is one of the two ways new
//! columns enter the table; the other is a producer yielding a mapping.

use crate::error::TableError;
use crate::style::TableStyle;
use crate::worker::messages::{Datum, Producer, RowInput, Value};
use tracing::trace;

/// The outcome of resolving one submitted row.
pub struct ResolvedRow {
    /// Immediate writes, in submission order.  Deferred fields appear
    /// here with their initial value when one was given.
    pub writes: Vec<(String, Datum)>,
    /// Columns awaiting deferred resolution, with their producers.
    pub pending: Vec<(String, Producer)>,
}

/// Resolve `input` against the declared column order.
///
/// `columns` is only consulted for positional rows; named rows carry
/// their own column names and may introduce unseen ones.
pub fn resolve_row(
    input: RowInput,
    columns: &[String],
    style: &TableStyle,
) -> Result<ResolvedRow, TableError> {
    let pairs: Vec<(String, Value)> = match input {
        RowInput::Named(pairs) => pairs,
        RowInput::Sequence(values) => {
            if values.len() > columns.len() {
                return Err(TableError::schema(
                    "columns",
                    format!(
                        "row has {} values but only {} columns are declared",
                        values.len(),
                        columns.len()
                    ),
                ));
            }
            columns
                .iter()
                .cloned()
                .zip(values)
                .collect()
        }
    };

    let mut resolved = ResolvedRow {
        writes: Vec::new(),
        pending: Vec::new(),
    };
    for (column, value) in pairs {
        resolve_field(column, value, style, &mut resolved);
    }
    Ok(resolved)
}

fn resolve_field(column: String, value: Value, style: &TableStyle, out: &mut ResolvedRow) {
    match value {
        Value::Literal(Datum::Map(entries)) => {
            // A mapping field spreads into its named columns.
            trace!(column = %column, n = entries.len(), "spreading mapping field");
            for (key, datum) in entries {
                out.writes.push((key, datum));
            }
        }
        Value::Literal(datum) => {
            if style.spec(&column).delayed {
                // Delayed columns resolve even literals off-thread.
                trace!(column = %column, "delaying literal value");
                out.pending.push((
                    column,
                    Producer::Once(Box::new(move || Ok(datum))),
                ));
            } else {
                out.writes.push((column, datum));
            }
        }
        Value::Deferred { initial, producer } => {
            trace!(column = %column, "registering deferred producer");
            if let Some(datum) = initial {
                out.writes.push((column.clone(), datum));
            }
            out.pending.push((column, producer));
        }
    }
}
