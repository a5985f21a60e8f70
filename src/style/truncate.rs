//! Grapheme-aware field truncation.
//!
//! Truncation operates on display columns, not bytes or chars, so a
//! double-width character is never split and the result always fits the
//! requested width.

use crate::style::TruncateSide;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Truncate `text` to at most `width` display columns.
///
/// The marker replaces the dropped portion when it fits; a marker wider
/// than the field is itself truncated from the right.
pub fn truncate(text: &str, width: usize, side: TruncateSide, marker: &str) -> String {
    if text.width() <= width {
        return text.to_owned();
    }
    if width == 0 {
        return String::new();
    }

    let marker_width = marker.width();
    if marker_width >= width {
        let (head, _) = take_front(marker, width);
        return head;
    }

    let budget = width - marker_width;
    match side {
        TruncateSide::Right => {
            let (head, _) = take_front(text, budget);
            head + marker
        }
        TruncateSide::Left => {
            let (tail, _) = take_back(text, budget);
            format!("{marker}{tail}")
        }
        TruncateSide::Center => {
            let head_budget = budget - budget / 2;
            let (head, head_used) = take_front(text, head_budget);
            // Give the tail any columns the head could not use.
            let (tail, _) = take_back(text, budget - head_used);
            format!("{head}{marker}{tail}")
        }
    }
}

/// Longest prefix of `text` no wider than `budget`, with its width.
fn take_front(text: &str, budget: usize) -> (String, usize) {
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        if used + w > budget {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    (out, used)
}

/// Longest suffix of `text` no wider than `budget`, with its width.
fn take_back(text: &str, budget: usize) -> (String, usize) {
    let mut parts: Vec<&str> = Vec::new();
    let mut used = 0;
    for grapheme in text.graphemes(true).rev() {
        let w = grapheme.width();
        if used + w > budget {
            break;
        }
        parts.push(grapheme);
        used += w;
    }
    parts.reverse();
    (parts.concat(), used)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_values_pass_through() {
        assert_eq!(truncate("abc", 5, TruncateSide::Right, "…"), "abc");
        assert_eq!(truncate("abcde", 5, TruncateSide::Right, "…"), "abcde");
    }

    #[test]
    fn right_truncation_keeps_head() {
        assert_eq!(truncate("abcdefgh", 5, TruncateSide::Right, "…"), "abcd…");
        assert_eq!(truncate("abcdefgh", 5, TruncateSide::Right, ""), "abcde");
    }

    #[test]
    fn left_truncation_keeps_tail() {
        assert_eq!(truncate("abcdefgh", 5, TruncateSide::Left, "…"), "…efgh");
    }

    #[test]
    fn center_truncation_keeps_both_ends() {
        assert_eq!(truncate("abcdefgh", 5, TruncateSide::Center, "…"), "ab…gh");
        assert_eq!(truncate("abcdefgh", 6, TruncateSide::Center, "…"), "abc…gh");
    }

    #[test]
    fn multichar_marker() {
        assert_eq!(
            truncate("abcdefgh", 6, TruncateSide::Right, "..."),
            "abc..."
        );
    }

    #[test]
    fn marker_wider_than_field_is_clipped() {
        assert_eq!(truncate("abcdefgh", 2, TruncateSide::Right, "..."), "..");
    }

    #[test]
    fn wide_graphemes_are_not_split() {
        // Each CJK character is two columns wide.
        assert_eq!(truncate("日本語表示", 5, TruncateSide::Right, "…"), "日本…");
        assert_eq!(truncate("日本語表示", 4, TruncateSide::Right, ""), "日本");
    }
}
