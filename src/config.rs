//! Session configuration.
//!
//! All knobs are explicit; there is no ambient global output target or
//! terminal probe hidden inside the table machinery.

use std::num::NonZeroUsize;

/// How rows are written and updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Rewrite on-screen rows in place as deferred values arrive.
    /// Requires an interactive sink.
    Update,
    /// Print each row exactly once, at first flush.  Later cell changes
    /// are visible only through indexed reads.
    Incremental,
    /// Buffer everything; print the final table once at close.
    Final,
}

/// Configuration for a table session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Write mode.  If `None`, resolved from interactivity at open:
    /// interactive sinks get [`Mode::Update`], everything else
    /// [`Mode::Final`].
    pub mode: Option<Mode>,
    /// Number of concurrent worker slots for deferred values.
    pub max_workers: usize,
    /// If true (the default), producer failures are collected and
    /// surfaced together at close.  If false, the first failure aborts
    /// queued work and surfaces at the next submit or at close.
    pub continue_on_failure: bool,
    /// Block new-row admission while any of this many top-of-screen
    /// rows still has pending work.  Zero disables the check.
    pub wait_for_top: usize,
    /// Whether the sink is an interactive terminal.  `None` means not
    /// interactive; callers writing to a real terminal should probe and
    /// set this (see [`crate::Session::stdout`]).
    pub interactive: Option<bool>,
    /// Terminal geometry (columns, rows).  If `None` and the sink is
    /// interactive, the terminal is probed at open.
    pub term_size: Option<(u16, u16)>,
    /// Columns whose values identify a row.  Defaults to the first
    /// declared column.
    pub ids: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: None,
            max_workers: default_workers(),
            continue_on_failure: true,
            wait_for_top: 3,
            interactive: None,
            term_size: None,
            ids: None,
        }
    }
}

fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    (cpus + 4).min(32)
}
