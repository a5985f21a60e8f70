//! The table session: the coordinator that owns everything.
//!
//! A [`Session`] is the single writer for both the table model and the
//! sink.  Callers submit rows; deferred values resolve on the worker
//! pool and come back over one ordered channel; the session drains that
//! channel on every entry point and applies updates one at a time, with
//! a repaint between each, so two changes to one cell paint twice
//! rather than coalescing.

use crate::config::{Config, Mode};
use crate::error::{ResolutionFailure, TableError};
use crate::render::{LineTarget, Renderer};
use crate::style::TableStyle;
use crate::table::TableState;
use crate::worker::{
    resolve_row, Coordinate, Datum, PendingWork, Producer, RowInput, WorkUpdate, WorkerPool,
};
use std::collections::HashSet;
use std::io::{self, Write};
use tracing::{debug, trace, warn};

/// A live table bound to an output sink.
///
/// Dropping a session without calling [`Session::close`] still drains
/// outstanding work and restores the terminal, but swallows errors;
/// call `close` to observe them.
pub struct Session<W: Write> {
    state: TableState,
    pool: Option<WorkerPool>,
    renderer: Renderer<W>,
    mode: Mode,
    interactive: bool,
    fixed_geometry: bool,
    wait_for_top: usize,
    continue_on_failure: bool,
    failures: Vec<ResolutionFailure>,
    outstanding: usize,
    aborted: bool,
    closed: bool,
}

impl Session<io::Stdout> {
    /// Open a session on stdout, probing interactivity when the
    /// configuration leaves it unset.
    pub fn stdout(
        columns: Vec<String>,
        style: TableStyle,
        mut config: Config,
    ) -> Result<Self, TableError> {
        if config.interactive.is_none() {
            use crossterm::tty::IsTty;
            config.interactive = Some(io::stdout().is_tty());
        }
        Self::open(io::stdout(), columns, style, config)
    }
}

impl<W: Write> Session<W> {
    /// Open a session writing to `sink`.
    ///
    /// Validates the style and configuration before any output; a
    /// rejected open leaves the sink untouched.
    pub fn open(
        sink: W,
        columns: Vec<String>,
        style: TableStyle,
        config: Config,
    ) -> Result<Self, TableError> {
        style.validate()?;
        if columns.is_empty() {
            return Err(TableError::schema("columns", "at least one column is required"));
        }

        let interactive = config.interactive.unwrap_or(false);
        let probed = config.term_size.or_else(|| {
            if interactive {
                crossterm::terminal::size().ok()
            } else {
                None
            }
        });
        // In-place rewrites need known geometry; an interactive sink
        // whose size cannot be learned degrades to append-once.
        let mode = config.mode.unwrap_or(match (interactive, probed) {
            (true, Some(_)) => Mode::Update,
            (true, None) => Mode::Incremental,
            (false, _) => Mode::Final,
        });
        if mode == Mode::Update && !interactive {
            return Err(TableError::schema(
                "mode_",
                "update mode requires an interactive sink",
            ));
        }

        let ids = match config.ids {
            Some(ids) => {
                for id in &ids {
                    if !columns.contains(id) {
                        return Err(TableError::schema(
                            "ids",
                            format!("id column {id:?} is not a declared column"),
                        ));
                    }
                }
                ids
            }
            None => vec![columns[0].clone()],
        };
        let term_width = probed.map(|(w, _)| w as usize);
        let term_height = probed.map_or(24, |(_, h)| h as usize);
        let table_width = style.width.or(if interactive { term_width } else { None });

        debug!(?mode, interactive, ?probed, "opening table session");
        let state = TableState::new(&columns, style, ids, interactive, table_width);
        let mut renderer = Renderer::new(sink, mode, interactive, term_width, term_height);
        renderer.begin()?;

        Ok(Self {
            state,
            pool: Some(WorkerPool::new(config.max_workers)),
            renderer,
            mode,
            interactive,
            fixed_geometry: config.term_size.is_some(),
            wait_for_top: config.wait_for_top,
            continue_on_failure: config.continue_on_failure,
            failures: Vec::new(),
            outstanding: 0,
            aborted: false,
            closed: false,
        })
    }

    /// Submit one row.
    ///
    /// A row whose ID-column values match an earlier row updates that
    /// row in place; otherwise it is appended.  Deferred values are
    /// dispatched to the worker pool and the call returns without
    /// waiting for them, except when new-row admission is held back for
    /// still-pending rows at the top of the screen.
    pub fn submit(&mut self, input: RowInput) -> Result<(), TableError> {
        self.refresh_geometry();
        self.drain_ready()?;
        if self.aborted && !self.failures.is_empty() {
            return Err(TableError::Resolution {
                failures: std::mem::take(&mut self.failures),
            });
        }

        let resolved = resolve_row(input, &self.state.column_names(), self.state.style())?;

        for (column, _) in &resolved.writes {
            self.state.ensure_column(column);
        }
        for (column, _) in &resolved.pending {
            self.state.ensure_column(column);
        }

        let key = self.row_key(&resolved.writes)?;
        let is_new = self.state.get(&key).is_none();
        if is_new {
            self.hold_for_top_rows()?;
        }
        let (row, _) = self.state.upsert_row(key);
        trace!(row, is_new, "applying submitted row");

        let pending_columns: HashSet<&str> = resolved
            .pending
            .iter()
            .map(|(c, _)| c.as_str())
            .collect();
        for (column, datum) in resolved.writes {
            let pending = pending_columns.contains(column.as_str());
            self.state.set_cell(row, &column, datum, pending);
        }
        for column in pending_columns.iter().copied() {
            self.state.set_pending(row, column, true);
        }
        for (column, producer) in resolved.pending {
            self.dispatch(Coordinate { row, column }, producer);
        }

        self.render()
    }

    /// Current display values for the row with the given ID-column
    /// values, after draining any ready updates.  Values are
    /// post-transform; pending cells show their last-known value.
    pub fn get(&mut self, key: &[String]) -> Result<Option<std::collections::HashMap<String, String>>, TableError> {
        self.drain_ready()?;
        Ok(self.state.get(key))
    }

    /// Run `f` against the raw sink for foreign output, then repaint
    /// the table below it.
    ///
    /// In update mode the painted-line bookkeeping is reset so the next
    /// repaint appends a fresh copy of the table instead of moving the
    /// cursor into the foreign text.
    pub fn outside_write<T>(&mut self, f: impl FnOnce(&mut W) -> T) -> Result<T, TableError> {
        self.drain_ready()?;
        let value = self.renderer.with_sink(f)?;
        if self.mode == Mode::Update && self.interactive {
            self.renderer.forget();
            self.render()?;
        }
        Ok(value)
    }

    /// Block until every outstanding deferred resolution has been
    /// applied, without ending the session.
    ///
    /// Under a fail-fast policy any failure collected so far surfaces
    /// here; under the default collecting policy failures keep
    /// accumulating until [`Session::close`].
    pub fn wait(&mut self) -> Result<(), TableError> {
        self.drain_outstanding()?;
        if !self.continue_on_failure && !self.failures.is_empty() {
            return Err(TableError::Resolution {
                failures: std::mem::take(&mut self.failures),
            });
        }
        Ok(())
    }

    /// Finish the session: block until outstanding resolutions settle,
    /// write the final rendering, and restore the terminal.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Resolution`] with the collected producer
    /// failures, or [`TableError::Render`] if the sink failed.
    pub fn close(mut self) -> Result<(), TableError> {
        self.finish()
    }

    fn row_key(&self, writes: &[(String, Datum)]) -> Result<Vec<String>, TableError> {
        self.state
            .ids()
            .iter()
            .map(|id| {
                writes
                    .iter()
                    .find(|(c, _)| c == id)
                    .map(|(_, d)| d.to_display())
                    .ok_or_else(|| {
                        TableError::schema("ids", format!("row is missing id column {id:?}"))
                    })
            })
            .collect()
    }

    fn dispatch(&mut self, coord: Coordinate, producer: Producer) {
        if let Some(pool) = self.pool.as_ref() {
            pool.submit(PendingWork { coord, producer });
            self.outstanding += 1;
        }
    }

    /// Block until no dispatched work remains, applying updates and
    /// repainting after each.  Stops early once the session aborted.
    fn drain_outstanding(&mut self) -> Result<(), TableError> {
        while self.outstanding > 0 && !self.aborted {
            let update = {
                let Some(pool) = self.pool.as_ref() else { break };
                match pool.updates().recv() {
                    Ok(update) => update,
                    Err(_) => break,
                }
            };
            self.apply_update(update);
            self.render()?;
        }
        Ok(())
    }

    /// Re-probe the terminal before admitting a row, so a resize mid
    /// session reflows the table.  Explicitly configured geometry is
    /// never second-guessed.
    fn refresh_geometry(&mut self) {
        if !self.interactive || self.fixed_geometry {
            return;
        }
        let Ok((w, h)) = crossterm::terminal::size() else {
            return;
        };
        self.renderer.set_term_size(Some(w as usize), h as usize);
        if self.state.style().width.is_none() {
            self.state.set_table_width(Some(w as usize));
        }
    }

    /// Apply every update already sitting in the channel, repainting
    /// after each one.
    fn drain_ready(&mut self) -> Result<(), TableError> {
        loop {
            let Some(pool) = self.pool.as_ref() else {
                return Ok(());
            };
            let Ok(update) = pool.updates().try_recv() else {
                return Ok(());
            };
            self.apply_update(update);
            self.render()?;
        }
    }

    /// Block new-row admission while a row about to scroll off the top
    /// still has pending cells, draining updates until it settles.
    fn hold_for_top_rows(&mut self) -> Result<(), TableError> {
        if self.mode != Mode::Update || !self.interactive || self.wait_for_top == 0 {
            return Ok(());
        }
        loop {
            if self.aborted || self.outstanding == 0 {
                return Ok(());
            }
            let visible = self.renderer.term_height() - 1;
            let painted = self.renderer.painted_physical_lines();
            if painted + 1 <= visible {
                return Ok(());
            }
            let Some(top) = self.renderer.top_reachable_row() else {
                return Ok(());
            };
            let top_end = (top + self.wait_for_top).min(self.state.row_count());
            if !(top..top_end).any(|i| self.state.row_has_pending(i)) {
                return Ok(());
            }
            debug!(top, "holding new row for pending top-of-screen rows");
            let update = {
                let Some(pool) = self.pool.as_ref() else {
                    return Ok(());
                };
                match pool.updates().recv() {
                    Ok(update) => update,
                    Err(_) => return Ok(()),
                }
            };
            self.apply_update(update);
            self.render()?;
        }
    }

    fn apply_update(&mut self, update: WorkUpdate) {
        match update {
            WorkUpdate::Value { coord, value } => {
                self.apply_produced(&coord, value, false);
                self.outstanding = self.outstanding.saturating_sub(1);
            }
            WorkUpdate::StreamYield { coord, value, rest } => {
                self.apply_produced(&coord, value, true);
                // Re-enqueue only now that the yielded value has been
                // applied; the stream's next item is not pulled before
                // this lands in the queue.
                if let Some(pool) = self.pool.as_ref() {
                    pool.submit(PendingWork {
                        coord,
                        producer: Producer::Stream(rest),
                    });
                } else {
                    self.outstanding = self.outstanding.saturating_sub(1);
                }
            }
            WorkUpdate::StreamDone { coord } => {
                trace!(row = coord.row, column = %coord.column, "stream exhausted");
                self.state.set_pending(coord.row, &coord.column, false);
                self.outstanding = self.outstanding.saturating_sub(1);
            }
            WorkUpdate::Failed { coord, error } => {
                warn!(row = coord.row, column = %coord.column, %error, "producer failed");
                self.state.set_pending(coord.row, &coord.column, false);
                self.failures.push(ResolutionFailure {
                    row: self.state.key_of(coord.row).to_vec(),
                    column: coord.column,
                    message: error.to_string(),
                });
                self.outstanding = self.outstanding.saturating_sub(1);
                if !self.continue_on_failure && !self.aborted {
                    self.aborted = true;
                    if let Some(pool) = self.pool.as_ref() {
                        pool.abort();
                    }
                }
            }
        }
    }

    /// Write one produced value into its cell.  A produced mapping
    /// spreads into its named columns, possibly growing the column set;
    /// the producing cell itself only changes pending state.
    fn apply_produced(&mut self, coord: &Coordinate, value: Datum, still_pending: bool) {
        match value {
            Datum::Map(entries) => {
                self.state.set_pending(coord.row, &coord.column, still_pending);
                for (column, datum) in entries {
                    self.state.ensure_column(&column);
                    let own = column == coord.column;
                    self.state
                        .set_cell(coord.row, &column, datum, still_pending && own);
                }
            }
            datum => {
                self.state
                    .set_cell(coord.row, &coord.column, datum, still_pending);
            }
        }
    }

    fn desired_lines(&mut self) -> Vec<(LineTarget, String)> {
        let mut lines = Vec::new();
        if let Some(header) = self.state.header_line() {
            lines.push((LineTarget::Header, header));
        }
        for row in 0..self.state.row_count() {
            lines.push((LineTarget::Row(row), self.state.render_row(row)));
        }
        if self.state.has_summary() {
            for (i, text) in self.state.summary_lines().into_iter().enumerate() {
                lines.push((LineTarget::Summary(i), text));
            }
        }
        lines
    }

    /// Compute the full desired rendering, re-running layout once when
    /// summary content widened a column.
    fn settled_lines(&mut self) -> Vec<(LineTarget, String)> {
        self.state.recompute_widths();
        let desired = self.desired_lines();
        if self.state.recompute_widths() {
            self.desired_lines()
        } else {
            desired
        }
    }

    fn render(&mut self) -> Result<(), TableError> {
        let desired = self.settled_lines();
        self.renderer.sync(&desired)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TableError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!(outstanding = self.outstanding, "closing table session");

        let drained = self.drain_outstanding();

        // Join the workers; in-flight work finishes and reports even
        // after an abort, so sweep the channel once more.
        if let Some(pool) = self.pool.take() {
            let updates = pool.updates().clone();
            pool.shutdown();
            while let Ok(update) = updates.try_recv() {
                self.apply_update(update);
            }
        }

        let finalized: Result<(), TableError> = drained.and_then(|()| {
            let desired = self.settled_lines();
            self.renderer.finalize(&desired)?;
            Ok(())
        });
        let teardown = self.renderer.teardown();

        if !self.failures.is_empty() {
            return Err(TableError::Resolution {
                failures: std::mem::take(&mut self.failures),
            });
        }
        finalized?;
        teardown?;
        Ok(())
    }
}

impl<W: Write> Drop for Session<W> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.finish();
        }
    }
}
