//! The authoritative in-memory table model.
//!
//! `TableState` is mutated only by the coordinator thread, by applying
//! literal writes and drained worker updates; workers never touch it.
//! Columns are discovered incrementally and never removed; rows are
//! append-only and keyed by their ID-column values.

use crate::style::{format_value, layout, render_field, HidePolicy, TableStyle, WidthSpec};
use crate::table::summary::{summarize, AggregateState};
use crate::table::width::{allocate, ColumnDemand};
use crate::worker::Datum;
use std::collections::HashMap;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

/// One value slot, with its resolution state.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Last resolved raw value; `Missing` until anything arrives.
    pub raw: Datum,
    /// True while a deferred resolution is outstanding.
    pub pending: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            raw: Datum::Missing,
            pending: false,
        }
    }
}

struct Column {
    name: String,
    width: usize,
    hidden: bool,
    content_width: usize,
}

struct Row {
    key: Vec<String>,
    cells: HashMap<String, Cell>,
}

/// The full table model: columns, rows, and aggregate accumulation.
pub struct TableState {
    style: TableStyle,
    styling: bool,
    table_width: Option<usize>,
    ids: Vec<String>,
    columns: Vec<Column>,
    col_index: HashMap<String, usize>,
    rows: Vec<Row>,
    key_index: HashMap<Vec<String>, usize>,
    aggregates: AggregateState,
}

impl TableState {
    /// Create a state for the declared columns.
    pub fn new(
        columns: &[String],
        style: TableStyle,
        ids: Vec<String>,
        styling: bool,
        table_width: Option<usize>,
    ) -> Self {
        let mut state = Self {
            style,
            styling,
            table_width,
            ids,
            columns: Vec::new(),
            col_index: HashMap::new(),
            rows: Vec::new(),
            key_index: HashMap::new(),
            aggregates: AggregateState::default(),
        };
        for name in columns {
            state.ensure_column(name);
        }
        state
    }

    /// Currently declared column names, in display order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// The ID columns identifying a row.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// The table style.
    pub const fn style(&self) -> &TableStyle {
        &self.style
    }

    /// Update the total table width (terminal resize or forced width).
    pub fn set_table_width(&mut self, width: Option<usize>) {
        self.table_width = width;
    }

    /// Number of rows seen so far.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Register `name` as a column, if unseen.  Returns true when the
    /// column set grew.  Existing rows gain a missing cell for it.
    pub fn ensure_column(&mut self, name: &str) -> bool {
        if self.col_index.contains_key(name) {
            return false;
        }
        debug!(column = name, "discovered column");
        let spec = self.style.spec(name);
        let hidden = !matches!(spec.hide, HidePolicy::Visible);
        let mut placeholder_width = spec.missing.width();
        if self.style.header {
            // The header label is content too.
            placeholder_width = placeholder_width.max(name.width());
        }
        self.col_index.insert(name.to_owned(), self.columns.len());
        self.columns.push(Column {
            name: name.to_owned(),
            width: 0,
            hidden,
            content_width: placeholder_width,
        });
        for row in &mut self.rows {
            row.cells.entry(name.to_owned()).or_default();
        }
        true
    }

    /// Find or append the row for `key`.  Returns its arrival index and
    /// whether it is new.
    pub fn upsert_row(&mut self, key: Vec<String>) -> (usize, bool) {
        if let Some(&idx) = self.key_index.get(&key) {
            return (idx, false);
        }
        let idx = self.rows.len();
        let cells = self
            .columns
            .iter()
            .map(|c| (c.name.clone(), Cell::default()))
            .collect();
        self.key_index.insert(key.clone(), idx);
        self.rows.push(Row { key, cells });
        (idx, true)
    }

    /// The ID key of a row.
    pub fn key_of(&self, row: usize) -> &[String] {
        &self.rows[row].key
    }

    /// Write a raw value into a cell.
    ///
    /// A `Missing` value never clobbers a previously resolved one, so a
    /// resubmitted row with absent fields leaves those cells intact.
    /// Non-missing values unhide until-populated columns.
    pub fn set_cell(&mut self, row: usize, column: &str, raw: Datum, pending: bool) {
        let Some(&col_idx) = self.col_index.get(column) else {
            return;
        };
        let cell = self.rows[row]
            .cells
            .entry(column.to_owned())
            .or_default();
        if !(raw.is_missing() && !cell.raw.is_missing()) {
            cell.raw = raw;
        }
        cell.pending = pending;

        let spec = self.style.spec(column);
        let cell_raw = self.rows[row].cells[column].raw.clone();
        if !cell_raw.is_missing()
            && matches!(spec.hide, HidePolicy::UntilPopulated)
            && self.columns[col_idx].hidden
        {
            debug!(column, "unhiding until-populated column");
            self.columns[col_idx].hidden = false;
        }
        let rendered_width = format_value(spec, &cell_raw).width();
        let col = &mut self.columns[col_idx];
        if rendered_width > col.content_width {
            col.content_width = rendered_width;
        }
    }

    /// Mark a cell's pending state without touching its value.
    pub fn set_pending(&mut self, row: usize, column: &str, pending: bool) {
        if let Some(cell) = self.rows[row].cells.get_mut(column) {
            cell.pending = pending;
        }
    }

    /// Whether any cell of `row` still awaits resolution.
    pub fn row_has_pending(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_some_and(|r| r.cells.values().any(|c| c.pending))
    }

    /// Indexed read: the current display values for the row identified
    /// by the given ID-column values, post-transform and post-missing
    /// substitution.
    pub fn get(&self, key: &[String]) -> Option<HashMap<String, String>> {
        let &idx = self.key_index.get(key)?;
        let row = &self.rows[idx];
        Some(
            row.cells
                .iter()
                .map(|(name, cell)| {
                    (name.clone(), format_value(self.style.spec(name), &cell.raw))
                })
                .collect(),
        )
    }

    /// Recompute column widths from current content.  Returns true when
    /// any width changed, meaning previously painted lines are stale.
    pub fn recompute_widths(&mut self) -> bool {
        let table_width = self.table_width;
        let demands: Vec<ColumnDemand> = self
            .columns
            .iter()
            .map(|col| {
                let spec = self.style.spec(&col.name);
                let (fixed, min, max, weight) = match &spec.width {
                    WidthSpec::Fixed(extent) => (extent.resolve(table_width), 0, None, 1),
                    WidthSpec::Auto { min, max, weight } => (
                        None,
                        min.and_then(|e| e.resolve(table_width)).unwrap_or(0),
                        max.and_then(|e| e.resolve(table_width)),
                        *weight,
                    ),
                };
                ColumnDemand {
                    name: col.name.clone(),
                    fixed,
                    min,
                    max,
                    weight,
                    content: col.content_width,
                    hidden: col.hidden,
                }
            })
            .collect();

        let widths = allocate(&demands, self.style.separator.width(), table_width);
        let mut changed = false;
        for col in &mut self.columns {
            let assigned = widths.get(&col.name).copied().unwrap_or(0);
            if assigned != col.width {
                debug!(column = %col.name, from = col.width, to = assigned, "adjusting width");
                col.width = assigned;
                changed = true;
            }
        }
        changed
    }

    fn visible(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.hidden && c.width > 0)
    }

    /// Render one row as a line, without the trailing newline.
    pub fn render_row(&self, idx: usize) -> String {
        let row = &self.rows[idx];
        let fields: Vec<String> = self
            .visible()
            .map(|col| {
                let spec = self.style.spec(&col.name);
                let raw = row
                    .cells
                    .get(&col.name)
                    .map_or(&Datum::Missing, |c| &c.raw);
                render_field(spec, raw, col.width, self.styling)
            })
            .collect();
        fields.join(&self.style.separator)
    }

    /// Render the header line, if the style asks for one.
    pub fn header_line(&self) -> Option<String> {
        if !self.style.header {
            return None;
        }
        let fields: Vec<String> = self
            .visible()
            .map(|col| layout(self.style.spec(&col.name), &col.name, col.width))
            .collect();
        Some(fields.join(&self.style.separator))
    }

    /// Whether any visible column declares an aggregate.
    pub fn has_summary(&self) -> bool {
        self.columns
            .iter()
            .filter(|c| !c.hidden)
            .any(|c| self.style.spec(&c.name).aggregate.is_some())
    }

    /// Render the summary block from finalized cell values.
    pub fn summary_lines(&mut self) -> Vec<String> {
        self.aggregates.rebuild(self.rows.iter().flat_map(|row| {
            row.cells
                .iter()
                .filter(|(_, cell)| !cell.pending)
                .map(|(name, cell)| (name.as_str(), &cell.raw))
        }));

        let summary_rows = summarize(
            self.columns
                .iter()
                .filter(|c| !c.hidden)
                .map(|c| (c.name.as_str(), self.style.spec(&c.name))),
            &self.aggregates,
        );

        // Summary text is content too; widths settle on the caller's
        // next recompute.
        for values in &summary_rows {
            for (name, text) in values {
                if let Some(&idx) = self.col_index.get(name) {
                    let width = text.width();
                    let col = &mut self.columns[idx];
                    if width > col.content_width {
                        col.content_width = width;
                    }
                }
            }
        }

        summary_rows
            .iter()
            .map(|values| {
                let fields: Vec<String> = self
                    .visible()
                    .map(|col| {
                        let spec = self.style.spec(&col.name);
                        let text = values.get(&col.name).map_or("", String::as_str);
                        layout(spec, text, col.width)
                    })
                    .collect();
                fields.join(&self.style.separator)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Extent, StyleSpec};
    use std::sync::Arc;

    fn state_with(columns: &[&str]) -> TableState {
        let cols: Vec<String> = columns.iter().map(|s| (*s).to_owned()).collect();
        let ids = vec![cols[0].clone()];
        TableState::new(&cols, TableStyle::default(), ids, false, None)
    }

    #[test]
    fn literal_row_round_trips_through_indexed_read() {
        let mut state = state_with(&["name", "status"]);
        let (row, new) = state.upsert_row(vec!["job-1".to_owned()]);
        assert!(new);
        state.set_cell(row, "name", Datum::from("job-1"), false);
        state.set_cell(row, "status", Datum::from("ok"), false);

        let values = state.get(&["job-1".to_owned()]).unwrap();
        assert_eq!(values["name"], "job-1");
        assert_eq!(values["status"], "ok");
    }

    #[test]
    fn resubmitting_a_key_updates_in_place() {
        let mut state = state_with(&["name", "status"]);
        let (first, _) = state.upsert_row(vec!["job-1".to_owned()]);
        let (second, new) = state.upsert_row(vec!["job-1".to_owned()]);
        assert_eq!(first, second);
        assert!(!new);
    }

    #[test]
    fn missing_never_clobbers_a_resolved_value() {
        let mut state = state_with(&["name", "status"]);
        let (row, _) = state.upsert_row(vec!["job-1".to_owned()]);
        state.set_cell(row, "status", Datum::from("ok"), false);
        state.set_cell(row, "status", Datum::Missing, false);
        let values = state.get(&["job-1".to_owned()]).unwrap();
        assert_eq!(values["status"], "ok");
    }

    #[test]
    fn discovered_columns_backfill_existing_rows() {
        let mut state = state_with(&["name"]);
        let (row, _) = state.upsert_row(vec!["job-1".to_owned()]);
        state.set_cell(row, "name", Datum::from("job-1"), false);
        assert!(state.ensure_column("host"));
        state.recompute_widths();
        let line = state.render_row(row);
        assert!(line.starts_with("job-1"));
        let values = state.get(&["job-1".to_owned()]).unwrap();
        assert_eq!(values["host"], "");
    }

    #[test]
    fn until_populated_column_unhides_on_first_value() {
        let cols = vec!["name".to_owned(), "err".to_owned()];
        let mut style = TableStyle::default();
        style.columns.insert(
            "err".to_owned(),
            StyleSpec {
                hide: HidePolicy::UntilPopulated,
                ..StyleSpec::default()
            },
        );
        let mut state = TableState::new(&cols, style, vec!["name".to_owned()], false, None);
        let (row, _) = state.upsert_row(vec!["job-1".to_owned()]);
        state.set_cell(row, "name", Datum::from("job-1"), false);
        state.recompute_widths();
        assert_eq!(state.render_row(row), "job-1");

        state.set_cell(row, "err", Datum::from("timeout"), false);
        state.recompute_widths();
        assert_eq!(state.render_row(row), "job-1 timeout");
    }

    #[test]
    fn pending_cells_render_the_placeholder() {
        let cols = vec!["name".to_owned(), "status".to_owned()];
        let mut style = TableStyle::default();
        style.columns.insert(
            "status".to_owned(),
            StyleSpec {
                missing: "?".to_owned(),
                ..StyleSpec::default()
            },
        );
        let mut state = TableState::new(&cols, style, vec!["name".to_owned()], false, None);
        let (row, _) = state.upsert_row(vec!["job-1".to_owned()]);
        state.set_cell(row, "name", Datum::from("job-1"), false);
        state.set_pending(row, "status", true);
        state.recompute_widths();
        assert_eq!(state.render_row(row), "job-1 ?");
        assert!(state.row_has_pending(row));
    }

    #[test]
    fn summary_uses_only_finalized_values() {
        let cols = vec!["name".to_owned(), "size".to_owned()];
        let mut style = TableStyle::default();
        style.columns.insert(
            "size".to_owned(),
            StyleSpec {
                aggregate: Some(Arc::new(|values: &[Datum]| {
                    let total: f64 = values.iter().filter_map(Datum::as_f64).sum();
                    vec![format!("sum: {total}")]
                })),
                ..StyleSpec::default()
            },
        );
        let mut state = TableState::new(&cols, style, vec!["name".to_owned()], false, None);
        let (a, _) = state.upsert_row(vec!["a".to_owned()]);
        state.set_cell(a, "name", Datum::from("a"), false);
        state.set_cell(a, "size", Datum::from(10i64), false);
        let (b, _) = state.upsert_row(vec!["b".to_owned()]);
        state.set_cell(b, "name", Datum::from("b"), false);
        state.set_cell(b, "size", Datum::from(5i64), true);
        state.recompute_widths();

        assert!(state.has_summary());
        state.summary_lines(); // summary content feeds widths
        state.recompute_widths();
        let lines = state.summary_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("sum: 10"), "pending cell must not count");

        state.set_pending(b, "size", false);
        let lines = state.summary_lines();
        assert!(lines[0].contains("sum: 15"));
    }

    #[test]
    fn fraction_widths_resolve_against_the_table_width() {
        let cols = vec!["name".to_owned(), "log".to_owned()];
        let mut style = TableStyle::default();
        style.columns.insert(
            "log".to_owned(),
            StyleSpec {
                width: WidthSpec::Fixed(Extent::Frac(0.5)),
                ..StyleSpec::default()
            },
        );
        let mut state = TableState::new(&cols, style, vec!["name".to_owned()], false, Some(20));
        let (row, _) = state.upsert_row(vec!["a".to_owned()]);
        state.set_cell(row, "name", Datum::from("a"), false);
        state.set_cell(row, "log", Datum::from("0123456789abcdef"), false);
        state.recompute_widths();

        // Half of 20 columns, content truncated to fit.
        let line = state.render_row(row);
        assert!(line.ends_with('\u{2026}'));
        assert_eq!(
            line.rsplit(' ').next().map(UnicodeWidthStr::width),
            Some(10)
        );
    }

    #[test]
    fn table_width_change_reflows_the_layout() {
        let cols = vec!["name".to_owned(), "log".to_owned()];
        let mut style = TableStyle::default();
        style.columns.insert(
            "log".to_owned(),
            StyleSpec {
                width: WidthSpec::Fixed(Extent::Frac(0.5)),
                ..StyleSpec::default()
            },
        );
        let mut state = TableState::new(&cols, style, vec!["name".to_owned()], false, Some(20));
        let (row, _) = state.upsert_row(vec!["a".to_owned()]);
        state.set_cell(row, "name", Datum::from("a"), false);
        state.set_cell(row, "log", Datum::from("0123456789abcdef"), false);
        state.recompute_widths();

        // A narrower table re-resolves the fraction.
        state.set_table_width(Some(12));
        assert!(state.recompute_widths());
        let line = state.render_row(row);
        assert_eq!(line.rsplit(' ').next().map(UnicodeWidthStr::width), Some(6));
    }

    #[test]
    fn width_growth_reports_stale_layout() {
        let mut state = state_with(&["name"]);
        let (row, _) = state.upsert_row(vec!["ab".to_owned()]);
        state.set_cell(row, "name", Datum::from("ab"), false);
        assert!(state.recompute_widths());
        assert!(!state.recompute_widths());

        let (row2, _) = state.upsert_row(vec!["abcdef".to_owned()]);
        state.set_cell(row2, "name", Datum::from("abcdef"), false);
        assert!(state.recompute_widths());
    }
}
