//! Line-tracking terminal renderer.
//!
//! The renderer owns the sink and a model of what is currently painted
//! at each terminal line.  Given the desired full rendering of the
//! table it computes the minimal write sequence: a single-line in-place
//! rewrite when exactly one on-screen line changed, a repaint from the
//! first changed line otherwise, plain appends in incremental mode, and
//! nothing at all in final mode until close.
//!
//! Rows that have scrolled past the terminal's visible line count are
//! unreachable for cursor-based rewrites; their updates are silently
//! dropped from the visual output.  Wrapped rows are tracked by their
//! physical line count so cursor arithmetic survives rows wider than
//! the terminal.

use crate::config::Mode;
use crate::render::output::OutputBuffer;
use regex::Regex;
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing::{debug, trace};
use unicode_width::UnicodeWidthStr;

/// What a painted terminal line corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTarget {
    /// The header row.
    Header,
    /// A data row, by arrival index.
    Row(usize),
    /// A line of the trailing summary block, by index within it.
    Summary(usize),
}

impl LineTarget {
    const fn is_summary(self) -> bool {
        matches!(self, Self::Summary(_))
    }
}

#[derive(Debug, Clone)]
struct ScreenLine {
    target: LineTarget,
    text: String,
    physical: usize,
}

/// Display width of `text`, ignoring ANSI escape sequences.
fn display_width(text: &str) -> usize {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap());
    re.replace_all(text, "").width()
}

/// The terminal renderer.
pub struct Renderer<W: Write> {
    sink: W,
    out: OutputBuffer,
    mode: Mode,
    interactive: bool,
    term_width: Option<usize>,
    term_height: usize,
    lines: Vec<ScreenLine>,
    cursor_hidden: bool,
}

impl<W: Write> Renderer<W> {
    /// Create a renderer for `sink`.
    pub fn new(
        sink: W,
        mode: Mode,
        interactive: bool,
        term_width: Option<usize>,
        term_height: usize,
    ) -> Self {
        Self {
            sink,
            out: OutputBuffer::new(),
            mode,
            interactive,
            term_width,
            term_height: term_height.max(2),
            lines: Vec::new(),
            cursor_hidden: false,
        }
    }

    /// Terminal height in lines.
    pub const fn term_height(&self) -> usize {
        self.term_height
    }

    /// Update the cached terminal geometry.
    pub fn set_term_size(&mut self, width: Option<usize>, height: usize) {
        self.term_width = width;
        self.term_height = height.max(2);
    }

    /// Total physical terminal lines painted, counting wrapped rows by
    /// how many lines they actually occupy.
    pub fn painted_physical_lines(&self) -> usize {
        self.lines.iter().map(|l| l.physical).sum()
    }

    /// Arrival index of the topmost data row still reachable for
    /// in-place rewrites, or `None` when no row is on screen.
    pub fn top_reachable_row(&self) -> Option<usize> {
        let mut from_bottom = 0;
        let mut top = None;
        for line in self.lines.iter().rev() {
            from_bottom += line.physical;
            if from_bottom > self.term_height - 1 {
                break;
            }
            if let LineTarget::Row(idx) = line.target {
                top = Some(idx);
            }
        }
        top
    }

    /// Hide the cursor for the session.  In-place updates without this
    /// leave a visibly hopping cursor.
    pub fn begin(&mut self) -> io::Result<()> {
        if self.interactive && self.mode == Mode::Update {
            self.out.cursor_hide();
            self.cursor_hidden = true;
            self.out.flush_to(&mut self.sink)?;
        }
        Ok(())
    }

    /// Restore cursor visibility and attributes.  Safe to call on every
    /// exit path, including after sink failures.
    pub fn teardown(&mut self) -> io::Result<()> {
        if self.cursor_hidden {
            self.out.cursor_show();
            self.cursor_hidden = false;
        }
        if self.interactive {
            self.out.reset_attrs();
        }
        self.out.flush_to(&mut self.sink)
    }

    /// Drop all knowledge of what is on screen.  The next sync repaints
    /// the whole table as fresh appends.  Used after foreign output has
    /// been interleaved below the table.
    pub fn forget(&mut self) {
        debug!("forgetting painted lines");
        self.lines.clear();
    }

    /// Run `f` against the raw sink, flushing pending output first.
    pub fn with_sink<T>(&mut self, f: impl FnOnce(&mut W) -> T) -> io::Result<T> {
        self.out.flush_to(&mut self.sink)?;
        Ok(f(&mut self.sink))
    }

    fn physical(&self, text: &str) -> usize {
        match self.term_width {
            Some(w) if w > 0 => display_width(text).div_ceil(w).max(1),
            _ => 1,
        }
    }

    /// Physical distance from the cursor's resting position (start of
    /// the line after the last painted one) up to the start of line
    /// `idx`.
    fn distance_to(&self, idx: usize) -> usize {
        self.lines[idx..].iter().map(|l| l.physical).sum()
    }

    /// Whether line `idx` can still be reached by cursor movement.
    fn reachable(&self, idx: usize) -> bool {
        self.distance_to(idx) <= self.term_height - 1
    }

    /// Bring the screen in line with `desired`, the full rendering of
    /// the table (header, rows in arrival order, summary block last).
    pub fn sync(&mut self, desired: &[(LineTarget, String)]) -> io::Result<()> {
        match self.mode {
            Mode::Final => Ok(()),
            Mode::Incremental => self.sync_append_only(desired, true),
            Mode::Update => {
                if self.interactive {
                    self.sync_update(desired)
                } else {
                    self.sync_append_only(desired, true)
                }
            }
        }
    }

    /// Append-only degraded path: paint lines not yet painted, never
    /// rewrite.  Summary lines are withheld until close.
    fn sync_append_only(
        &mut self,
        desired: &[(LineTarget, String)],
        skip_summary: bool,
    ) -> io::Result<()> {
        let painted = self.lines.len();
        let mut seen = 0;
        for (target, text) in desired {
            if skip_summary && target.is_summary() {
                continue;
            }
            if seen >= painted {
                self.out.write_str(text);
                self.out.write_str("\n");
                self.lines.push(ScreenLine {
                    target: *target,
                    text: text.clone(),
                    physical: self.physical(text),
                });
            }
            seen += 1;
        }
        self.out.flush_to(&mut self.sink)
    }

    fn sync_update(&mut self, desired: &[(LineTarget, String)]) -> io::Result<()> {
        let common = self.lines.len().min(desired.len());
        let mut first_change = None;
        let mut change_count = 0;
        for i in 0..common {
            let line = &self.lines[i];
            let (target, text) = &desired[i];
            if line.target != *target || line.text != *text {
                if line.target == *target && !self.reachable(i) {
                    // Scrolled off: visually dropped, state stays correct.
                    trace!(line = i, "dropping update for scrolled-off line");
                    continue;
                }
                change_count += 1;
                if first_change.is_none() {
                    first_change = Some(i);
                }
            }
        }
        if desired.len() != self.lines.len() {
            change_count += 1;
            if first_change.is_none() {
                first_change = Some(common);
            }
        }
        let Some(first) = first_change else {
            return Ok(());
        };

        // Minimal path: one changed on-screen line, same shape.
        if change_count == 1 && first < common && desired.len() == self.lines.len() {
            let (target, text) = &desired[first];
            let new_physical = self.physical(text);
            if self.lines[first].target == *target
                && new_physical == 1
                && self.lines[first].physical == 1
            {
                let n_up = self.distance_to(first);
                trace!(line = first, n_up, "rewriting line in place");
                self.out.cursor_up(n_up);
                self.out.carriage_return();
                self.out.clear_line();
                self.out.write_str(text);
                self.out.cursor_down(n_up);
                self.out.carriage_return();
                self.lines[first] = ScreenLine {
                    target: *target,
                    text: text.clone(),
                    physical: 1,
                };
                return self.out.flush_to(&mut self.sink);
            }
        }

        self.repaint_from(first, desired)
    }

    /// Rewrite everything from line `start` down: clear, repaint each
    /// desired line, then clear whatever old content extends below.
    fn repaint_from(&mut self, start: usize, desired: &[(LineTarget, String)]) -> io::Result<()> {
        // Clamp to the reachable region; lines above it keep their old
        // content.
        let mut start = start.min(self.lines.len());
        while start < self.lines.len() && !self.reachable(start) {
            start += 1;
        }
        let n_up = if start < self.lines.len() {
            self.distance_to(start)
        } else {
            0
        };
        debug!(start, n_up, total = desired.len(), "repainting from line");

        self.out.cursor_up(n_up);
        self.lines.truncate(start);
        for (target, text) in &desired[start..] {
            self.out.carriage_return();
            self.out.clear_line();
            self.out.write_str(text);
            self.out.write_str("\n");
            self.lines.push(ScreenLine {
                target: *target,
                text: text.clone(),
                physical: self.physical(text),
            });
        }
        // Old content may extend below the new end (e.g. a shrinking
        // summary block).
        self.out.write_str("\x1b[0J");
        self.out.flush_to(&mut self.sink)
    }

    /// Final write at session close.
    ///
    /// Final mode paints the whole table exactly once; incremental mode
    /// appends the withheld summary block; update mode is already
    /// current.
    pub fn finalize(&mut self, desired: &[(LineTarget, String)]) -> io::Result<()> {
        match self.mode {
            Mode::Final => self.sync_append_only(desired, false),
            Mode::Incremental => {
                for (target, text) in desired {
                    if target.is_summary() {
                        self.out.write_str(text);
                        self.out.write_str("\n");
                        self.lines.push(ScreenLine {
                            target: *target,
                            text: text.clone(),
                            physical: self.physical(text),
                        });
                    }
                }
                self.out.flush_to(&mut self.sink)
            }
            Mode::Update => {
                if self.interactive {
                    self.sync_update(desired)
                } else {
                    self.sync_append_only(desired, false)
                }
            }
        }
    }
}
