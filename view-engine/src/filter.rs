//! FILENAME: view-engine/src/filter.rs
//! Filter Engine - condition evaluation and the quick filter.
//!
//! Every active condition must independently evaluate to true (AND); the
//! quick term matches when any searchable field contains it
//! case-insensitively. Malformed input (unknown field, incoercible operand)
//! degrades to "not matched" rather than throwing.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use engine::{DataSet, DataType, Row, RowValue};
use log::warn;

use crate::definition::{FilterCondition, FilterOperator};

/// A condition with its column resolved up front, so per-row evaluation
/// never repeats the lookup. Conditions on unknown fields keep `col: None`
/// and match nothing.
struct ResolvedCondition<'a> {
    cond: &'a FilterCondition,
    col: Option<usize>,
    data_type: DataType,
}

/// Applies the structured conditions and the quick term to the dataset,
/// returning the surviving row positions in original order.
///
/// `now` is the reference instant for the date-bucket operators; pass the
/// current local wall time in production and a fixed value in tests.
pub fn apply(
    data: &DataSet,
    conditions: &[FilterCondition],
    quick_term: Option<&str>,
    now: NaiveDateTime,
) -> Vec<u32> {
    let resolved: Vec<ResolvedCondition<'_>> = conditions
        .iter()
        .map(|cond| {
            let col = data.column_index(&cond.field);
            if col.is_none() {
                warn!("filter condition targets unknown field '{}'", cond.field);
            }
            let data_type = cond
                .data_type
                .or_else(|| col.map(|i| data.columns()[i].data_type))
                .unwrap_or_default();
            ResolvedCondition {
                cond,
                col,
                data_type,
            }
        })
        .collect();

    let quick = quick_term
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase);

    data.rows()
        .iter()
        .filter(|row| {
            resolved.iter().all(|rc| evaluate(rc, row, now))
                && quick
                    .as_deref()
                    .map_or(true, |term| quick_matches(data, row, term))
        })
        .map(|row| row.source_row)
        .collect()
}

/// Quick-filter semantics: case-insensitive substring over every searchable
/// field's display string.
fn quick_matches(data: &DataSet, row: &Row, term_lower: &str) -> bool {
    data.searchable_columns().any(|(col, _)| {
        row.values
            .get(col)
            .map_or(false, |v| v.display().to_lowercase().contains(term_lower))
    })
}

fn evaluate(rc: &ResolvedCondition<'_>, row: &Row, now: NaiveDateTime) -> bool {
    let Some(col) = rc.col else {
        return false;
    };
    let cell = row.values.get(col).unwrap_or(&RowValue::Empty);

    // A custom predicate fully overrides operator dispatch.
    if let Some(custom) = &rc.cond.custom {
        return custom(cell, row);
    }

    let cond = rc.cond;
    match cond.operator {
        FilterOperator::Equals => operand(cond).map_or(false, |v| loose_eq(cell, v, cond)),
        FilterOperator::NotEquals => operand(cond).map_or(false, |v| !loose_eq(cell, v, cond)),

        FilterOperator::Contains => text_op(cell, cond, |hay, needle| hay.contains(needle)),
        FilterOperator::NotContains => {
            cond.value.is_some() && !text_op(cell, cond, |hay, needle| hay.contains(needle))
        }
        FilterOperator::StartsWith => text_op(cell, cond, |hay, needle| hay.starts_with(needle)),
        FilterOperator::EndsWith => text_op(cell, cond, |hay, needle| hay.ends_with(needle)),

        FilterOperator::GreaterThan => relational(rc, cell, |a, b| a > b),
        FilterOperator::GreaterThanOrEqual => relational(rc, cell, |a, b| a >= b),
        FilterOperator::LessThan => relational(rc, cell, |a, b| a < b),
        FilterOperator::LessThanOrEqual => relational(rc, cell, |a, b| a <= b),
        FilterOperator::Between => {
            relational(rc, cell, |a, lo| a >= lo)
                && relational2(rc, cell, |a, hi| a <= hi)
        }

        FilterOperator::In => in_list(cell, cond),
        FilterOperator::NotIn => !in_list(cell, cond),

        FilterOperator::IsEmpty => cell.is_blank(),
        FilterOperator::IsNotEmpty => !cell.is_blank(),

        FilterOperator::DateRange => date_range(cell, cond),

        // Remaining operators are the canned date buckets.
        _ => {
            let Some(ts) = cell.as_datetime() else {
                return false;
            };
            match bucket_window(cond.operator, now) {
                Some((start, end)) => ts >= start && ts <= end,
                None => false,
            }
        }
    }
}

fn operand(cond: &FilterCondition) -> Option<&RowValue> {
    cond.value.as_ref()
}

/// Equality used by the equality family and `In`/`NotIn` membership: numeric
/// when either side is a number and both coerce, textual otherwise
/// (case-insensitive unless the condition opts in).
fn loose_eq(cell: &RowValue, target: &RowValue, cond: &FilterCondition) -> bool {
    let numeric_side = matches!(cell, RowValue::Number(_)) || matches!(target, RowValue::Number(_));
    if numeric_side {
        let a = cell.as_number();
        let b = target.as_number();
        if !a.is_nan() && !b.is_nan() {
            return a == b;
        }
    }
    let a = cell.display();
    let b = target.display();
    if cond.case_sensitive {
        a == b
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

fn text_op(cell: &RowValue, cond: &FilterCondition, op: impl Fn(&str, &str) -> bool) -> bool {
    let Some(target) = cond.value.as_ref() else {
        return false;
    };
    let hay = cell.display();
    let needle = target.display();
    if cond.case_sensitive {
        op(&hay, &needle)
    } else {
        op(&hay.to_lowercase(), &needle.to_lowercase())
    }
}

/// Relational comparison against `value`. Both sides coerce through `Number`
/// (or through date parsing for date-typed conditions); NaN / invalid dates
/// consistently evaluate to "not matched".
fn relational(rc: &ResolvedCondition<'_>, cell: &RowValue, op: impl Fn(f64, f64) -> bool) -> bool {
    relational_against(rc, cell, rc.cond.value.as_ref(), op)
}

fn relational2(rc: &ResolvedCondition<'_>, cell: &RowValue, op: impl Fn(f64, f64) -> bool) -> bool {
    relational_against(rc, cell, rc.cond.value2.as_ref(), op)
}

fn relational_against(
    rc: &ResolvedCondition<'_>,
    cell: &RowValue,
    target: Option<&RowValue>,
    op: impl Fn(f64, f64) -> bool,
) -> bool {
    let Some(target) = target else {
        return false;
    };
    let (a, b) = if rc.data_type == DataType::Date {
        let a = cell
            .as_datetime()
            .map(|d| d.and_utc().timestamp_millis() as f64);
        let b = target
            .as_datetime()
            .map(|d| d.and_utc().timestamp_millis() as f64);
        match (a, b) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        }
    } else {
        (cell.as_number(), target.as_number())
    };
    if a.is_nan() || b.is_nan() {
        return false;
    }
    op(a, b)
}

/// `In` membership. Null, undefined, and the empty string form one blank
/// equivalence class whose membership must be listed explicitly.
fn in_list(cell: &RowValue, cond: &FilterCondition) -> bool {
    if cell.is_blank() {
        return cond.values.iter().any(|v| v.is_blank());
    }
    cond.values.iter().any(|v| loose_eq(cell, v, cond))
}

fn date_range(cell: &RowValue, cond: &FilterCondition) -> bool {
    let Some(ts) = cell.as_datetime() else {
        return false;
    };
    let start = cond.value.as_ref().and_then(RowValue::as_datetime);
    let end = cond.value2.as_ref().and_then(RowValue::as_datetime);
    start.map_or(true, |s| ts >= s) && end.map_or(true, |e| ts <= e)
}

// ============================================================================
// DATE BUCKETS
// ============================================================================

fn start_of_day(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_opt(0, 0, 0).unwrap()
}

fn end_of_day(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_milli_opt(23, 59, 59, 999)
        .unwrap()
}

fn start_of_week(d: NaiveDate) -> NaiveDate {
    // Weeks run Sunday 00:00 through Saturday 23:59:59.999.
    d - Duration::days(d.weekday().num_days_from_sunday() as i64)
}

fn start_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap()
}

fn start_of_quarter(d: NaiveDate) -> NaiveDate {
    let month = ((d.month0() / 3) * 3) + 1;
    NaiveDate::from_ymd_opt(d.year(), month, 1).unwrap()
}

fn start_of_year(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), 1, 1).unwrap()
}

fn end_of_month(start: NaiveDate) -> NaiveDate {
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    next.unwrap() - Duration::days(1)
}

/// The inclusive reference window for a date-bucket operator, computed from
/// the explicit `now` at evaluation time so persisted conditions stay
/// correct across recomputation.
pub fn bucket_window(
    operator: FilterOperator,
    now: NaiveDateTime,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let today = now.date();
    let window = match operator {
        FilterOperator::Today => (start_of_day(today), end_of_day(today)),
        FilterOperator::Yesterday => {
            let y = today - Duration::days(1);
            (start_of_day(y), end_of_day(y))
        }
        FilterOperator::ThisWeek => {
            let start = start_of_week(today);
            (start_of_day(start), end_of_day(start + Duration::days(6)))
        }
        FilterOperator::LastWeek => {
            let start = start_of_week(today) - Duration::days(7);
            (start_of_day(start), end_of_day(start + Duration::days(6)))
        }
        FilterOperator::ThisMonth => {
            let start = start_of_month(today);
            (start_of_day(start), end_of_day(end_of_month(start)))
        }
        FilterOperator::LastMonth => {
            let start = start_of_month(start_of_month(today) - Duration::days(1));
            (start_of_day(start), end_of_day(end_of_month(start)))
        }
        FilterOperator::ThisQuarter => {
            let start = start_of_quarter(today);
            let end = start_of_quarter(start + Duration::days(100)) - Duration::days(1);
            (start_of_day(start), end_of_day(end))
        }
        FilterOperator::LastQuarter => {
            let this_start = start_of_quarter(today);
            let start = start_of_quarter(this_start - Duration::days(1));
            (start_of_day(start), end_of_day(this_start - Duration::days(1)))
        }
        FilterOperator::ThisYear => {
            let start = start_of_year(today);
            let end = NaiveDate::from_ymd_opt(today.year(), 12, 31)?;
            (start_of_day(start), end_of_day(end))
        }
        FilterOperator::LastYear => {
            let start = NaiveDate::from_ymd_opt(today.year() - 1, 1, 1)?;
            let end = NaiveDate::from_ymd_opt(today.year() - 1, 12, 31)?;
            (start_of_day(start), end_of_day(end))
        }
        FilterOperator::YearToDate => (start_of_day(start_of_year(today)), now),
        _ => return None,
    };
    Some(window)
}
