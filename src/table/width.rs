//! Column width allocation.
//!
//! [`allocate`] is a pure function from per-column demands and the
//! available table width to concrete character widths.  Fixed widths
//! are honored exactly, even when their sum exceeds the table width;
//! an overflowing table beats a hard failure.

use std::collections::HashMap;
use tracing::trace;

/// One column's input to the allocator, with extents already resolved
/// to character counts.
#[derive(Debug, Clone)]
pub struct ColumnDemand {
    /// Column name.
    pub name: String,
    /// Exact width, if the column is fixed-width.
    pub fixed: Option<usize>,
    /// Lower bound for auto-width columns.
    pub min: usize,
    /// Upper bound for auto-width columns.
    pub max: Option<usize>,
    /// Relative claim on scarce width.
    pub weight: u32,
    /// Longest observed content width, post-transform.
    pub content: usize,
    /// Hidden columns take no width.
    pub hidden: bool,
}

/// Assign a width to every column.
///
/// `table_width` of `None` means the table is unbounded (non-interactive
/// sink with no explicit width): auto columns expand to fit content.
pub fn allocate(
    demands: &[ColumnDemand],
    separator_width: usize,
    table_width: Option<usize>,
) -> HashMap<String, usize> {
    let mut widths: HashMap<String, usize> = HashMap::new();
    let visible: Vec<&ColumnDemand> = demands.iter().filter(|d| !d.hidden).collect();
    for d in demands {
        if d.hidden {
            widths.insert(d.name.clone(), 0);
        }
    }

    let mut width_fixed = separator_width * visible.len().saturating_sub(1);
    for d in &visible {
        if let Some(w) = d.fixed {
            widths.insert(d.name.clone(), w);
            width_fixed += w;
        }
    }

    let autos: Vec<&ColumnDemand> = visible.iter().filter(|d| d.fixed.is_none()).copied().collect();
    if autos.is_empty() {
        return widths;
    }

    let Some(table_width) = table_width else {
        // Unbounded: every auto column gets what its content wants.
        for d in &autos {
            let want = d.content.max(d.min);
            widths.insert(d.name.clone(), d.max.map_or(want, |m| want.min(m)));
        }
        return widths;
    };

    let mut available = table_width.saturating_sub(width_fixed);
    let wants: HashMap<&str, usize> = autos
        .iter()
        .map(|d| {
            let floor = d.content.max(d.min);
            (d.name.as_str(), d.max.map_or(floor, |m| floor.min(m)))
        })
        .collect();

    // Every column with demand claims one column first.
    let mut assigned: HashMap<&str, usize> = HashMap::new();
    for d in &autos {
        if wants[d.name.as_str()] > 0 && available > 0 {
            assigned.insert(&d.name, 1);
            available -= 1;
        } else {
            assigned.insert(&d.name, 0);
        }
    }

    // Claim remaining width in weight-sized increments, minimums first.
    // The iteration order must be stable across calls so repeated
    // allocations for the same content agree.
    let mut order: Vec<&ColumnDemand> = autos.clone();
    order.sort_by(|a, b| {
        (b.min, b.weight, &b.name).cmp(&(a.min, a.weight, &a.name))
    });

    let mut in_need: Vec<&str> = order
        .iter()
        .filter(|d| assigned[d.name.as_str()] > 0)
        .map(|d| d.name.as_str())
        .collect();
    while available > 0 && !in_need.is_empty() {
        let mut claimed_this_pass = 0;
        let mut still_need = Vec::new();
        for d in &order {
            let name = d.name.as_str();
            if !in_need.contains(&name) {
                continue;
            }
            let has = assigned[name];
            let outstanding = wants[name].saturating_sub(has);
            if outstanding == 0 {
                continue;
            }
            let step = if has >= d.min {
                d.weight as usize
            } else {
                d.min - has
            };
            let claim = step.min(outstanding).min(available);
            if claim == 0 {
                continue;
            }
            trace!(column = name, claim, available, "claiming width");
            *assigned.get_mut(name).unwrap() += claim;
            available -= claim;
            claimed_this_pass += claim;
            if assigned[name] < wants[name] {
                still_need.push(name);
            }
            if available == 0 {
                break;
            }
        }
        if claimed_this_pass == 0 {
            // No one could claim anything; stop rather than spin.
            break;
        }
        in_need = still_need;
    }

    for d in &autos {
        widths.insert(d.name.clone(), assigned[d.name.as_str()]);
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(name: &str, width: usize) -> ColumnDemand {
        ColumnDemand {
            name: name.to_owned(),
            fixed: Some(width),
            min: 0,
            max: None,
            weight: 1,
            content: 0,
            hidden: false,
        }
    }

    fn auto(name: &str, content: usize) -> ColumnDemand {
        ColumnDemand {
            name: name.to_owned(),
            fixed: None,
            min: 0,
            max: None,
            weight: 1,
            content,
            hidden: false,
        }
    }

    #[test]
    fn fixed_widths_are_honored_exactly() {
        let demands = vec![fixed("a", 4), fixed("b", 6)];
        let widths = allocate(&demands, 1, Some(20));
        assert_eq!(widths["a"], 4);
        assert_eq!(widths["b"], 6);
    }

    #[test]
    fn width_conservation_with_flexible_columns() {
        // Fixed 4 + separator 1*2 + flexible should fill to 20 when
        // content demands it.
        let demands = vec![fixed("a", 4), auto("b", 30), auto("c", 30)];
        let widths = allocate(&demands, 1, Some(20));
        let used = widths["a"] + widths["b"] + widths["c"] + 2;
        assert_eq!(used, 20);
    }

    #[test]
    fn content_smaller_than_available_is_not_inflated() {
        let demands = vec![auto("a", 3), auto("b", 5)];
        let widths = allocate(&demands, 1, Some(40));
        assert_eq!(widths["a"], 3);
        assert_eq!(widths["b"], 5);
    }

    #[test]
    fn weight_biases_scarce_width() {
        let mut heavy = auto("heavy", 50);
        heavy.weight = 3;
        let light = auto("light", 50);
        let widths = allocate(&[heavy, light], 1, Some(21));
        assert!(widths["heavy"] > widths["light"]);
        assert_eq!(widths["heavy"] + widths["light"] + 1, 21);
    }

    #[test]
    fn minimums_are_satisfied_before_weights() {
        let mut a = auto("a", 50);
        a.min = 8;
        let mut b = auto("b", 50);
        b.weight = 5;
        let widths = allocate(&[a, b], 1, Some(19));
        assert!(widths["a"] >= 8);
    }

    #[test]
    fn claiming_accumulates_over_passes_until_satisfied() {
        // Weight-sized increments must keep accruing across passes, not
        // stop after the first one.
        let demands = vec![auto("a", 50)];
        let widths = allocate(&demands, 0, Some(80));
        assert_eq!(widths["a"], 50);

        let mut capped = auto("b", 50);
        capped.max = Some(10);
        let widths = allocate(&[capped], 0, Some(80));
        assert_eq!(widths["b"], 10);
    }

    #[test]
    fn max_caps_auto_width() {
        let mut a = auto("a", 50);
        a.max = Some(10);
        let widths = allocate(&[a], 0, Some(80));
        assert_eq!(widths["a"], 10);
    }

    #[test]
    fn unbounded_table_expands_to_content() {
        let demands = vec![auto("a", 42), auto("b", 7)];
        let widths = allocate(&demands, 1, None);
        assert_eq!(widths["a"], 42);
        assert_eq!(widths["b"], 7);
    }

    #[test]
    fn hidden_columns_take_no_width() {
        let mut h = auto("h", 30);
        h.hidden = true;
        let demands = vec![h, auto("a", 5)];
        let widths = allocate(&demands, 1, Some(10));
        assert_eq!(widths["h"], 0);
        assert_eq!(widths["a"], 5);
    }

    #[test]
    fn allocation_is_stable_across_calls() {
        let demands = vec![auto("a", 40), auto("b", 40), auto("c", 40)];
        let first = allocate(&demands, 1, Some(30));
        let second = allocate(&demands, 1, Some(30));
        assert_eq!(first, second);
    }

    #[test]
    fn overconstrained_fixed_widths_overflow_rather_than_fail() {
        let demands = vec![fixed("a", 30), fixed("b", 30)];
        let widths = allocate(&demands, 1, Some(20));
        assert_eq!(widths["a"], 30);
        assert_eq!(widths["b"], 30);
    }
}
