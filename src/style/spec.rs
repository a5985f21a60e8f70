//! Typed per-column style specifications.
//!
//! Styles arrive here already validated into concrete types; the table
//! machinery consumes them read-only.  Schema validation of loosely
//! typed style declarations is a collaborator's job, not this crate's.

use crate::error::TableError;
use crate::worker::Datum;
use bitflags::bitflags;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// Text attribute modifiers applied to a rendered field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attrs: u8 {
        /// Bold text.
        const BOLD = 0b0000_0001;
        /// Underlined text.  Interactive sinks only.
        const UNDERLINE = 0b0000_0010;
    }
}

/// Basic terminal foreground colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// SGR 30.
    Black,
    /// SGR 31.
    Red,
    /// SGR 32.
    Green,
    /// SGR 33.
    Yellow,
    /// SGR 34.
    Blue,
    /// SGR 35.
    Magenta,
    /// SGR 36.
    Cyan,
    /// SGR 37.
    White,
}

impl Color {
    /// SGR foreground code.
    pub(crate) const fn sgr(self) -> u8 {
        match self {
            Self::Black => 30,
            Self::Red => 31,
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Blue => 34,
            Self::Magenta => 35,
            Self::Cyan => 36,
            Self::White => 37,
        }
    }
}

/// Selects a style attribute from a cell's raw value.
#[derive(Debug, Clone)]
pub enum Select<T> {
    /// Always this value.
    Plain(T),
    /// Keyed by the value's display string.
    Lookup(Vec<(String, T)>),
    /// First regular expression that matches the display string wins.
    ReLookup(Vec<(Regex, T)>),
    /// Half-open numeric intervals `[start, end)`; `None` bounds are
    /// unbounded.
    Interval(Vec<(Option<f64>, Option<f64>, T)>),
}

impl<T: Clone> Select<T> {
    /// Resolve the attribute for `raw`, or `None` if nothing matches.
    pub fn resolve(&self, raw: &Datum) -> Option<T> {
        match self {
            Self::Plain(v) => Some(v.clone()),
            Self::Lookup(entries) => {
                let key = raw.to_display();
                entries
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.clone())
            }
            Self::ReLookup(entries) => {
                let key = raw.to_display();
                entries
                    .iter()
                    .find(|(re, _)| re.is_match(&key))
                    .map(|(_, v)| v.clone())
            }
            Self::Interval(entries) => {
                let x = raw.as_f64()?;
                entries
                    .iter()
                    .find(|(start, end, _)| {
                        start.map_or(true, |s| s <= x) && end.map_or(true, |e| x < e)
                    })
                    .map(|(_, _, v)| v.clone())
            }
        }
    }
}

/// Which side of an overlong value to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncateSide {
    /// Drop the head.
    Left,
    /// Drop the middle.
    Center,
    /// Drop the tail.
    #[default]
    Right,
}

/// Text alignment within a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    /// Pad on the right.
    #[default]
    Left,
    /// Pad on the left.
    Right,
    /// Pad both sides.
    Center,
}

/// A width extent: an absolute character count, or a fraction of the
/// total table width in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    /// Absolute character count.
    Chars(usize),
    /// Fraction of the table width, resolved once the width is known.
    Frac(f64),
}

impl Extent {
    /// Resolve to characters.  Fractions of an unbounded table resolve
    /// to `None` (no constraint).
    pub fn resolve(self, table_width: Option<usize>) -> Option<usize> {
        match self {
            Self::Chars(n) => Some(n),
            #[allow(
                clippy::cast_sign_loss,
                clippy::cast_possible_truncation,
                clippy::cast_precision_loss
            )]
            Self::Frac(f) => table_width.map(|w| ((w as f64) * f) as usize),
        }
    }

    fn validate(self, key: &str) -> Result<(), TableError> {
        if let Self::Frac(f) = self {
            if !(f > 0.0 && f <= 1.0) {
                return Err(TableError::schema(
                    key,
                    format!("fraction {f} is outside (0, 1]"),
                ));
            }
        }
        Ok(())
    }
}

/// Per-column width policy.
#[derive(Debug, Clone, PartialEq)]
pub enum WidthSpec {
    /// Width follows the longest observed content, optionally bounded.
    Auto {
        /// Lower bound.
        min: Option<Extent>,
        /// Upper bound.
        max: Option<Extent>,
        /// Relative claim on scarce width when columns must shrink.
        weight: u32,
    },
    /// Exact width; content is truncated to fit.
    Fixed(Extent),
}

impl Default for WidthSpec {
    fn default() -> Self {
        Self::Auto {
            min: None,
            max: None,
            weight: 1,
        }
    }
}

/// When a column is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HidePolicy {
    /// Always shown.
    #[default]
    Visible,
    /// Never shown.  Values are still tracked for indexed reads.
    Hidden,
    /// Hidden until any row has a non-missing value for it.
    UntilPopulated,
}

/// Transform applied to a raw value before formatting.
pub type Transform = Arc<dyn Fn(&Datum) -> String + Send + Sync>;

/// Aggregate over a column's finalized raw values, producing one or
/// more summary lines for that column.
pub type Aggregate = Arc<dyn Fn(&[Datum]) -> Vec<String> + Send + Sync>;

/// Resolved styling rules for one column.
#[derive(Clone, Default)]
pub struct StyleSpec {
    /// Foreground color selection.
    pub color: Option<Select<Color>>,
    /// Bold selection.
    pub bold: Option<Select<bool>>,
    /// Underline selection.  Ignored on non-interactive sinks.
    pub underline: Option<Select<bool>>,
    /// Value transform, applied before width measurement and layout.
    pub transform: Option<Transform>,
    /// Summary aggregate.
    pub aggregate: Option<Aggregate>,
    /// Placeholder shown for missing or still-pending values.
    pub missing: String,
    /// Visibility policy.
    pub hide: HidePolicy,
    /// Width policy.
    pub width: WidthSpec,
    /// Alignment within the field.
    pub align: Align,
    /// Truncation side for overlong content.
    pub truncate: TruncateSide,
    /// Truncation marker.  `None` uses an ellipsis; an empty string
    /// truncates without a marker.
    pub marker: Option<String>,
    /// Route even literal values for this column through the worker
    /// pool.
    pub delayed: bool,
}

impl fmt::Debug for StyleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleSpec")
            .field("color", &self.color)
            .field("missing", &self.missing)
            .field("hide", &self.hide)
            .field("width", &self.width)
            .field("align", &self.align)
            .field("transform", &self.transform.as_ref().map(|_| "fn"))
            .field("aggregate", &self.aggregate.as_ref().map(|_| "fn"))
            .field("delayed", &self.delayed)
            .finish_non_exhaustive()
    }
}

impl StyleSpec {
    /// The effective truncation marker.
    pub fn marker(&self) -> &str {
        self.marker.as_deref().unwrap_or("\u{2026}")
    }

    fn validate(&self, column: &str) -> Result<(), TableError> {
        match &self.width {
            WidthSpec::Fixed(extent) => extent.validate(column)?,
            WidthSpec::Auto { min, max, .. } => {
                if let Some(e) = min {
                    e.validate(column)?;
                }
                if let Some(e) = max {
                    e.validate(column)?;
                }
                if let (Some(Extent::Chars(lo)), Some(Extent::Chars(hi))) = (min, max) {
                    if lo > hi {
                        return Err(TableError::schema(
                            column,
                            format!("width min {lo} exceeds max {hi}"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Table-level style: per-column specs plus shared layout settings.
#[derive(Clone)]
pub struct TableStyle {
    /// Per-column overrides.
    pub columns: HashMap<String, StyleSpec>,
    /// Applied to columns without an override, including columns
    /// discovered mid-session.
    pub default: StyleSpec,
    /// Separator between fields.
    pub separator: String,
    /// Explicit total table width.  Overrides the terminal-reported
    /// width; on non-interactive sinks the table is otherwise
    /// unbounded.
    pub width: Option<usize>,
    /// Whether to render a header row of column names.
    pub header: bool,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            columns: HashMap::new(),
            default: StyleSpec::default(),
            separator: " ".to_owned(),
            width: None,
            header: false,
        }
    }
}

impl fmt::Debug for TableStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableStyle")
            .field("columns", &self.columns.keys().collect::<Vec<_>>())
            .field("separator", &self.separator)
            .field("width", &self.width)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl TableStyle {
    /// Style for `column`, falling back to the default spec.
    pub fn spec(&self, column: &str) -> &StyleSpec {
        self.columns.get(column).unwrap_or(&self.default)
    }

    /// Check the style for problems that must surface before any
    /// output.
    pub fn validate(&self) -> Result<(), TableError> {
        self.default.validate("default_")?;
        for (column, spec) in &self.columns {
            spec.validate(column)?;
        }
        if let Some(0) = self.width {
            return Err(TableError::schema("width_", "table width must be positive"));
        }
        Ok(())
    }
}
