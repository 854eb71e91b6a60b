//! FILENAME: engine/src/value.rs
//! Row values - the normalized cell representation.
//!
//! Every cell the pipeline touches is a `RowValue`. The type is designed to:
//! - Round-trip through JSON without a tag (rows look like plain records)
//! - Act as a hash-map key (NaN values fold into one equivalence class)
//! - Coerce predictably for relational filters and typed sorting

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A normalized cell value.
///
/// `Empty` stands for null/undefined/missing. An empty string is a distinct
/// `Text` value but folds into the same "blank" class for the operators that
/// care (see [`RowValue::is_blank`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl RowValue {
    pub fn text(s: impl Into<String>) -> Self {
        RowValue::Text(s.into())
    }

    /// Whether this value belongs to the blank equivalence class:
    /// null/undefined/empty-string are treated as one value by the
    /// membership and emptiness operators.
    pub fn is_blank(&self) -> bool {
        match self {
            RowValue::Empty => true,
            RowValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Coerces to a number the way `Number(x)` would: numbers pass through,
    /// booleans become 0/1, numeric-looking text parses, everything else is
    /// NaN. NaN comparisons are always false, so an incoercible operand can
    /// never satisfy a relational filter.
    pub fn as_number(&self) -> f64 {
        match self {
            RowValue::Number(n) => *n,
            RowValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            RowValue::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            RowValue::Empty => f64::NAN,
        }
    }

    /// The display string used for substring matching, group labels, and
    /// quick-filter scans. Blank values render as an empty string here; the
    /// grouping layer substitutes its own sentinel label.
    pub fn display(&self) -> String {
        match self {
            RowValue::Empty => String::new(),
            RowValue::Number(n) => format!("{}", n),
            RowValue::Text(s) => s.clone(),
            RowValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        }
    }

    /// Attempts to interpret this value as a local date-time.
    ///
    /// Numbers are unix milliseconds. Text tries RFC 3339 first, then the
    /// common `YYYY-MM-DD[ HH:MM:SS]` shapes. Anything else is `None`, which
    /// every date operator treats as "not matched".
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            RowValue::Number(ms) => {
                if ms.is_nan() || ms.is_infinite() {
                    return None;
                }
                chrono::DateTime::from_timestamp_millis(*ms as i64).map(|dt| dt.naive_utc())
            }
            RowValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                    return Some(dt.naive_local());
                }
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    return Some(dt);
                }
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                    return Some(dt);
                }
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    return d.and_hms_opt(0, 0, 0);
                }
                if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
                    return d.and_hms_opt(0, 0, 0);
                }
                None
            }
            _ => None,
        }
    }
}

impl Default for RowValue {
    fn default() -> Self {
        RowValue::Empty
    }
}

impl PartialEq for RowValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RowValue::Empty, RowValue::Empty) => true,
            (RowValue::Number(a), RowValue::Number(b)) => {
                // NaN values are treated as equal to each other
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (RowValue::Text(a), RowValue::Text(b)) => a == b,
            (RowValue::Bool(a), RowValue::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for RowValue {}

impl std::hash::Hash for RowValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            RowValue::Empty => 0u8.hash(state),
            RowValue::Number(n) => {
                1u8.hash(state);
                if n.is_nan() {
                    // All NaN values hash to the same thing
                    u64::MAX.hash(state);
                } else {
                    n.to_bits().hash(state);
                }
            }
            RowValue::Text(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            RowValue::Bool(b) => {
                3u8.hash(state);
                b.hash(state);
            }
        }
    }
}

/// Type-aware comparison used wherever values are ordered without a column
/// type hint: Empty < Number < Text < Bool, same-kind values compared
/// directly.
pub fn compare_values(a: &RowValue, b: &RowValue) -> Ordering {
    match (a, b) {
        (RowValue::Empty, RowValue::Empty) => Ordering::Equal,
        (RowValue::Empty, _) => Ordering::Less,
        (_, RowValue::Empty) => Ordering::Greater,

        (RowValue::Number(na), RowValue::Number(nb)) => {
            na.partial_cmp(nb).unwrap_or(Ordering::Equal)
        }
        (RowValue::Number(_), _) => Ordering::Less,
        (_, RowValue::Number(_)) => Ordering::Greater,

        (RowValue::Text(ta), RowValue::Text(tb)) => ta.cmp(tb),
        (RowValue::Text(_), _) => Ordering::Less,
        (_, RowValue::Text(_)) => Ordering::Greater,

        (RowValue::Bool(ba), RowValue::Bool(bb)) => ba.cmp(bb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_class() {
        assert!(RowValue::Empty.is_blank());
        assert!(RowValue::text("").is_blank());
        assert!(!RowValue::text(" ").is_blank());
        assert!(!RowValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(RowValue::text("42").as_number(), 42.0);
        assert_eq!(RowValue::text(" 3.5 ").as_number(), 3.5);
        assert_eq!(RowValue::Bool(true).as_number(), 1.0);
        assert!(RowValue::text("abc").as_number().is_nan());
        assert!(RowValue::Empty.as_number().is_nan());
    }

    #[test]
    fn test_nan_equality_and_hash() {
        use std::collections::HashSet;
        let a = RowValue::Number(f64::NAN);
        let b = RowValue::Number(f64::NAN);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_date_parsing() {
        let dt = RowValue::text("2024-03-15").as_datetime().unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());

        let dt = RowValue::text("2024-03-15 13:45:00").as_datetime().unwrap();
        assert_eq!(dt.and_utc().timestamp() % 60, 0);

        assert!(RowValue::text("not a date").as_datetime().is_none());
        assert!(RowValue::Number(f64::NAN).as_datetime().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(RowValue::Number(25.0).display(), "25");
        assert_eq!(RowValue::Number(2.5).display(), "2.5");
        assert_eq!(RowValue::text("x").display(), "x");
        assert_eq!(RowValue::Empty.display(), "");
    }

    #[test]
    fn test_type_ladder_ordering() {
        let mut vs = vec![
            RowValue::text("b"),
            RowValue::Number(9.0),
            RowValue::Empty,
            RowValue::Bool(false),
            RowValue::text("a"),
        ];
        vs.sort_by(compare_values);
        assert_eq!(vs[0], RowValue::Empty);
        assert_eq!(vs[1], RowValue::Number(9.0));
        assert_eq!(vs[2], RowValue::text("a"));
        assert_eq!(vs[3], RowValue::text("b"));
        assert_eq!(vs[4], RowValue::Bool(false));
    }

    #[test]
    fn test_untagged_serde() {
        let json = serde_json::to_string(&RowValue::Number(2.0)).unwrap();
        assert_eq!(json, "2.0");
        let v: RowValue = serde_json::from_str("\"hi\"").unwrap();
        assert_eq!(v, RowValue::text("hi"));
        let v: RowValue = serde_json::from_str("null").unwrap();
        assert_eq!(v, RowValue::Empty);
    }
}
