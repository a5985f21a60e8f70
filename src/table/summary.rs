//! Aggregate accumulation and summary rows.

use crate::style::StyleSpec;
use crate::worker::Datum;
use std::collections::HashMap;

/// Running per-column accumulation of finalized raw values, read by the
/// summary renderer.
#[derive(Debug, Default)]
pub struct AggregateState {
    values: HashMap<String, Vec<Datum>>,
}

impl AggregateState {
    /// Rebuild from the current set of finalized cell values.
    ///
    /// Cells are re-fed on every rebuild rather than appended once, so
    /// a rewritten row (same ID key submitted again) replaces its
    /// contribution instead of double counting.
    pub fn rebuild<'a>(&mut self, cells: impl Iterator<Item = (&'a str, &'a Datum)>) {
        self.values.clear();
        for (column, raw) in cells {
            if !raw.is_missing() {
                self.values
                    .entry(column.to_owned())
                    .or_default()
                    .push(raw.clone());
            }
        }
    }

    /// Finalized values for one column.
    pub fn column(&self, name: &str) -> &[Datum] {
        self.values.get(name).map_or(&[], Vec::as_slice)
    }
}

/// Compute summary rows for the columns that declare an aggregate.
///
/// An aggregate may return several lines; the summary block is as tall
/// as the tallest column's result, with other columns blank on the
/// extra lines.  Returns an empty vector when no visible column
/// aggregates.
pub fn summarize<'a>(
    columns: impl Iterator<Item = (&'a str, &'a StyleSpec)>,
    aggregates: &AggregateState,
) -> Vec<HashMap<String, String>> {
    let mut per_column: Vec<(&str, Vec<String>)> = Vec::new();
    for (name, spec) in columns {
        if let Some(agg) = &spec.aggregate {
            per_column.push((name, agg(aggregates.column(name))));
        }
    }
    if per_column.is_empty() {
        return Vec::new();
    }

    let height = per_column.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    (0..height)
        .map(|i| {
            per_column
                .iter()
                .filter_map(|(name, lines)| {
                    lines.get(i).map(|v| ((*name).to_owned(), v.clone()))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sum_spec() -> StyleSpec {
        StyleSpec {
            aggregate: Some(Arc::new(|values: &[Datum]| {
                let total: f64 = values.iter().filter_map(Datum::as_f64).sum();
                vec![total.to_string()]
            })),
            ..StyleSpec::default()
        }
    }

    #[test]
    fn aggregates_skip_missing_values() {
        let mut state = AggregateState::default();
        let one = Datum::from(1i64);
        let two = Datum::from(2i64);
        let missing = Datum::Missing;
        state.rebuild(
            [("n", &one), ("n", &missing), ("n", &two)]
                .iter()
                .map(|(c, d)| (*c, *d)),
        );
        assert_eq!(state.column("n").len(), 2);
    }

    #[test]
    fn summary_rows_align_to_tallest_aggregate() {
        let sum = sum_spec();
        let multi = StyleSpec {
            aggregate: Some(Arc::new(|_: &[Datum]| {
                vec!["first".to_owned(), "second".to_owned()]
            })),
            ..StyleSpec::default()
        };
        let plain = StyleSpec::default();
        let state = AggregateState::default();
        let rows = summarize(
            [("a", &sum), ("b", &multi), ("c", &plain)]
                .iter()
                .map(|(n, s)| (*n, *s)),
            &state,
        );
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains_key("a"));
        assert_eq!(rows[1].get("b").map(String::as_str), Some("second"));
        assert!(!rows[1].contains_key("a"));
        assert!(!rows[0].contains_key("c"));
    }

    #[test]
    fn no_aggregates_means_no_summary() {
        let plain = StyleSpec::default();
        let rows = summarize([("a", &plain)].iter().map(|(n, s)| (*n, *s)), &AggregateState::default());
        assert!(rows.is_empty());
    }
}
