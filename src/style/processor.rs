//! Field rendering: transform, layout, and SGR styling.
//!
//! A cell value goes through three steps, mirroring the order the width
//! bookkeeping expects:
//!
//! ```text
//!     transform -> layout (truncate + pad) -> paint (SGR)
//! ```
//!
//! Width measurement elsewhere uses [`format_value`] so that transforms
//! are measured, not raw values.

use crate::style::spec::{Align, Attrs, StyleSpec};
use crate::style::truncate::truncate;
use crate::worker::Datum;
use unicode_width::UnicodeWidthStr;

/// The display string for `raw` under `spec`: transformed, with the
/// missing placeholder substituted.  No layout, no styling.
pub fn format_value(spec: &StyleSpec, raw: &Datum) -> String {
    if raw.is_missing() {
        return spec.missing.clone();
    }
    match &spec.transform {
        Some(transform) => transform(raw),
        None => raw.to_display(),
    }
}

/// Fit `text` into exactly `width` display columns per the alignment.
pub fn layout(spec: &StyleSpec, text: &str, width: usize) -> String {
    let clipped = truncate(text, width, spec.truncate, spec.marker());
    let used = clipped.width();
    let pad = width.saturating_sub(used);
    match spec.align {
        Align::Left => format!("{clipped}{}", " ".repeat(pad)),
        Align::Right => format!("{}{clipped}", " ".repeat(pad)),
        Align::Center => {
            let left = pad / 2;
            format!("{}{clipped}{}", " ".repeat(left), " ".repeat(pad - left))
        }
    }
}

/// Render one field: transform, fit to `width`, and (when `styling` is
/// on) wrap the non-whitespace core in SGR codes resolved from the raw
/// value.
pub fn render_field(spec: &StyleSpec, raw: &Datum, width: usize, styling: bool) -> String {
    let text = format_value(spec, raw);
    let laid_out = layout(spec, &text, width);
    if !styling || raw.is_missing() {
        return laid_out;
    }

    let color = spec.color.as_ref().and_then(|s| s.resolve(raw));
    let mut attrs = Attrs::empty();
    if spec
        .bold
        .as_ref()
        .and_then(|s| s.resolve(raw))
        .unwrap_or(false)
    {
        attrs |= Attrs::BOLD;
    }
    if spec
        .underline
        .as_ref()
        .and_then(|s| s.resolve(raw))
        .unwrap_or(false)
    {
        attrs |= Attrs::UNDERLINE;
    }
    if color.is_none() && attrs.is_empty() {
        return laid_out;
    }

    // Codes wrap only the trimmed core so flanking alignment padding is
    // never underlined or colored.
    let core_start = laid_out.len() - laid_out.trim_start().len();
    let core_end = laid_out.trim_end().len();
    if core_start >= core_end {
        return laid_out;
    }

    let mut codes: Vec<String> = Vec::new();
    if attrs.contains(Attrs::BOLD) {
        codes.push("1".to_owned());
    }
    if attrs.contains(Attrs::UNDERLINE) {
        codes.push("4".to_owned());
    }
    if let Some(c) = color {
        codes.push(c.sgr().to_string());
    }

    format!(
        "{}\x1b[{}m{}\x1b[0m{}",
        &laid_out[..core_start],
        codes.join(";"),
        &laid_out[core_start..core_end],
        &laid_out[core_end..]
    )
}
