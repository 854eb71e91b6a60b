//! FILENAME: view-engine/src/sort.rs
//! Sort Engine - multi-key ordering with explicit stability.
//!
//! Descriptors are consulted in ascending effective-index order; a row pair
//! resolves at the first key whose comparison is non-zero. The comparator
//! ends with the original input position, so the relation is a total order
//! and the stable fallback never depends on the sort primitive.

use std::cmp::Ordering;

use engine::{DataSet, DataType, RowValue};
use log::warn;

use crate::definition::{SortDescriptor, SortDirection};

struct ResolvedSort<'a> {
    desc: &'a SortDescriptor,
    col: usize,
    data_type: DataType,
}

/// Reorders `indices` in place according to the active descriptors. Rows
/// that tie on every key keep their relative input order.
pub fn apply(data: &DataSet, indices: &mut Vec<u32>, descriptors: &[SortDescriptor]) {
    let resolved = resolve(data, descriptors);
    if resolved.is_empty() {
        return;
    }

    let mut decorated: Vec<(usize, u32)> = indices.iter().copied().enumerate().collect();
    decorated.sort_by(|&(pos_a, row_a), &(pos_b, row_b)| {
        for rc in &resolved {
            let ord = compare_in_descriptor(data, rc, row_a, row_b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        // All keys tied: the input position makes the order total.
        pos_a.cmp(&pos_b)
    });

    indices.clear();
    indices.extend(decorated.into_iter().map(|(_, row)| row));
}

/// Resolves descriptors against the dataset in ascending effective-index
/// order (explicit `index` first, declaration position otherwise). Unknown
/// fields degrade to a tie and log a warning.
fn resolve<'a>(data: &DataSet, descriptors: &'a [SortDescriptor]) -> Vec<ResolvedSort<'a>> {
    let mut order: Vec<(usize, &SortDescriptor)> = descriptors
        .iter()
        .enumerate()
        .map(|(pos, d)| (d.index.unwrap_or(pos), d))
        .collect();
    order.sort_by_key(|&(effective, _)| effective);

    order
        .into_iter()
        .filter_map(|(_, desc)| match data.column_index(&desc.field) {
            Some(col) => Some(ResolvedSort {
                desc,
                col,
                data_type: data.columns()[col].data_type,
            }),
            None => {
                warn!("sort descriptor targets unknown field '{}'", desc.field);
                None
            }
        })
        .collect()
}

fn compare_in_descriptor(data: &DataSet, rc: &ResolvedSort<'_>, row_a: u32, row_b: u32) -> Ordering {
    let a = cell(data, row_a, rc.col);
    let b = cell(data, row_b, rc.col);

    // A custom comparator is authoritative; only its sign responds to the
    // direction.
    if let Some(comparator) = &rc.desc.comparator {
        return directed(comparator(a, b), rc.desc.direction);
    }

    // Nulls sort after any non-null value regardless of direction; a pair of
    // nulls is a tie that falls through to the next descriptor.
    match (is_null(a, rc.data_type), is_null(b, rc.data_type)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    directed(compare_typed(a, b, rc.data_type), rc.desc.direction)
}

fn cell<'a>(data: &'a DataSet, row: u32, col: usize) -> &'a RowValue {
    data.row(row)
        .and_then(|r| r.values.get(col))
        .unwrap_or(&RowValue::Empty)
}

/// Null for ordering purposes: a missing value, or a value the column's
/// declared type cannot coerce (NaN number, invalid date).
fn is_null(v: &RowValue, data_type: DataType) -> bool {
    if matches!(v, RowValue::Empty) {
        return true;
    }
    match data_type {
        DataType::Number => v.as_number().is_nan(),
        DataType::Date => v.as_datetime().is_none(),
        _ => false,
    }
}

fn compare_typed(a: &RowValue, b: &RowValue, data_type: DataType) -> Ordering {
    match data_type {
        DataType::Number => a
            .as_number()
            .partial_cmp(&b.as_number())
            .unwrap_or(Ordering::Equal),
        DataType::Date => a.as_datetime().cmp(&b.as_datetime()),
        DataType::Text | DataType::Bool => caseless_cmp(&a.display(), &b.display()),
    }
}

/// Locale-leaning string ordering: compare the lowercase fold first so
/// "apple" < "Banana", then break exact-fold ties bytewise for determinism.
pub fn caseless_cmp(a: &str, b: &str) -> Ordering {
    match a.to_lowercase().cmp(&b.to_lowercase()) {
        Ordering::Equal => a.cmp(b),
        ord => ord,
    }
}

fn directed(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
    }
}

// ============================================================================
// DESCRIPTOR MAINTENANCE
// ============================================================================

/// Single-click sort toggling.
///
/// Cycles ascending → descending → unsorted (the unsorted step is skipped
/// when `allow_unsorted` is false). In multi-sort mode a column already
/// active updates its direction in place without disturbing the other
/// columns' priority order; in single-sort mode the toggled column replaces
/// every other descriptor.
pub fn toggle_sort(
    descriptors: &mut Vec<SortDescriptor>,
    field: &str,
    multi: bool,
    allow_unsorted: bool,
) {
    let existing = descriptors.iter().position(|d| d.field == field);

    match existing {
        Some(pos) => match descriptors[pos].direction {
            SortDirection::Ascending => {
                descriptors[pos].direction = SortDirection::Descending;
                if !multi {
                    descriptors.retain(|d| d.field == field);
                    renumber(descriptors);
                }
            }
            SortDirection::Descending => {
                if allow_unsorted {
                    remove_sort(descriptors, field);
                } else {
                    descriptors[pos].direction = SortDirection::Ascending;
                    if !multi {
                        descriptors.retain(|d| d.field == field);
                        renumber(descriptors);
                    }
                }
            }
        },
        None => {
            if !multi {
                descriptors.clear();
            }
            let next_index = descriptors.len();
            descriptors.push(SortDescriptor::new(field, SortDirection::Ascending).with_index(next_index));
        }
    }
}

/// Removes a column from the active sort and re-numbers the remaining
/// priorities contiguously.
pub fn remove_sort(descriptors: &mut Vec<SortDescriptor>, field: &str) {
    descriptors.retain(|d| d.field != field);
    renumber(descriptors);
}

/// Re-assigns contiguous `index` values preserving the current effective
/// priority order.
pub fn renumber(descriptors: &mut Vec<SortDescriptor>) {
    let mut order: Vec<(usize, usize)> = descriptors
        .iter()
        .enumerate()
        .map(|(pos, d)| (d.index.unwrap_or(pos), pos))
        .collect();
    order.sort_by_key(|&(effective, _)| effective);
    for (new_index, (_, pos)) in order.into_iter().enumerate() {
        descriptors[pos].index = Some(new_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::ColumnMeta;
    use std::sync::Arc;

    fn create_test_data() -> DataSet {
        DataSet::from_rows(
            vec![
                ColumnMeta::new("id", DataType::Number),
                ColumnMeta::new("age", DataType::Number),
                ColumnMeta::new("name", DataType::Text),
            ],
            vec![
                vec![RowValue::Number(1.0), RowValue::Number(30.0), RowValue::text("banana")],
                vec![RowValue::Number(2.0), RowValue::Number(25.0), RowValue::text("Apple")],
                vec![RowValue::Number(3.0), RowValue::Number(30.0), RowValue::text("cherry")],
            ],
        )
    }

    fn all_indices(data: &DataSet) -> Vec<u32> {
        (0..data.len() as u32).collect()
    }

    #[test]
    fn test_ties_keep_original_relative_order() {
        let data = create_test_data();
        let mut idx = all_indices(&data);
        apply(
            &data,
            &mut idx,
            &[SortDescriptor::new("age", SortDirection::Ascending)],
        );
        // Ages 30, 25, 30 → row 1 first, then the two 30s in input order.
        assert_eq!(idx, vec![1, 0, 2]);
    }

    #[test]
    fn test_multi_key_resolves_left_to_right() {
        let data = create_test_data();
        let mut idx = all_indices(&data);
        apply(
            &data,
            &mut idx,
            &[
                SortDescriptor::new("age", SortDirection::Ascending).with_index(0),
                SortDescriptor::new("name", SortDirection::Descending).with_index(1),
            ],
        );
        // 25 first; the 30s ordered by name descending: cherry before banana.
        assert_eq!(idx, vec![1, 2, 0]);
    }

    #[test]
    fn test_explicit_index_overrides_declaration_order() {
        let data = create_test_data();
        let mut idx = all_indices(&data);
        apply(
            &data,
            &mut idx,
            &[
                SortDescriptor::new("name", SortDirection::Ascending).with_index(1),
                SortDescriptor::new("age", SortDirection::Ascending).with_index(0),
            ],
        );
        assert_eq!(idx, vec![1, 0, 2]);
    }

    #[test]
    fn test_nulls_sort_last_in_both_directions() {
        let data = DataSet::from_rows(
            vec![ColumnMeta::new("v", DataType::Number)],
            vec![
                vec![RowValue::Empty],
                vec![RowValue::Number(2.0)],
                vec![RowValue::Number(1.0)],
            ],
        );
        let mut idx = all_indices(&data);
        apply(&data, &mut idx, &[SortDescriptor::new("v", SortDirection::Ascending)]);
        assert_eq!(idx, vec![2, 1, 0]);

        let mut idx = all_indices(&data);
        apply(&data, &mut idx, &[SortDescriptor::new("v", SortDirection::Descending)]);
        assert_eq!(idx, vec![1, 2, 0]);
    }

    #[test]
    fn test_caseless_string_ordering() {
        let data = create_test_data();
        let mut idx = all_indices(&data);
        apply(&data, &mut idx, &[SortDescriptor::new("name", SortDirection::Ascending)]);
        // Apple < banana < cherry despite the capital A.
        assert_eq!(idx, vec![1, 0, 2]);
    }

    #[test]
    fn test_custom_comparator_is_authoritative() {
        let data = create_test_data();
        let mut idx = all_indices(&data);
        // Compare by string length; descending flips the sign.
        let by_len: crate::definition::CustomComparator =
            Arc::new(|a, b| a.display().len().cmp(&b.display().len()));
        apply(
            &data,
            &mut idx,
            &[SortDescriptor::new("name", SortDirection::Descending).with_comparator(by_len)],
        );
        assert_eq!(idx, vec![0, 2, 1]); // banana(6), cherry(6), Apple(5)
    }

    #[test]
    fn test_unknown_field_is_a_tie() {
        let data = create_test_data();
        let mut idx = all_indices(&data);
        apply(&data, &mut idx, &[SortDescriptor::new("ghost", SortDirection::Ascending)]);
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn test_stability_with_large_tie_groups() {
        let rows: Vec<Vec<RowValue>> = (0..100)
            .map(|i| vec![RowValue::Number((i % 3) as f64), RowValue::Number(i as f64)])
            .collect();
        let data = DataSet::from_rows(
            vec![
                ColumnMeta::new("bucket", DataType::Number),
                ColumnMeta::new("seq", DataType::Number),
            ],
            rows,
        );
        let mut idx = all_indices(&data);
        apply(&data, &mut idx, &[SortDescriptor::new("bucket", SortDirection::Ascending)]);
        // Within each bucket the sequence must be strictly increasing.
        for pair in idx.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let ba = data.value(a, "bucket").unwrap().as_number();
            let bb = data.value(b, "bucket").unwrap().as_number();
            if ba == bb {
                assert!(a < b, "tie group broke input order: {} after {}", a, b);
            }
        }
    }

    #[test]
    fn test_toggle_cycles_and_renumbers() {
        let mut sorts = Vec::new();
        toggle_sort(&mut sorts, "age", true, true);
        assert_eq!(sorts[0].direction, SortDirection::Ascending);

        toggle_sort(&mut sorts, "name", true, true);
        assert_eq!(sorts[1].index, Some(1));

        // Toggling age in multi mode flips it in place, keeping priority 0.
        toggle_sort(&mut sorts, "age", true, true);
        assert_eq!(sorts[0].direction, SortDirection::Descending);
        assert_eq!(sorts[0].index, Some(0));

        // Third click removes it; name is renumbered to priority 0.
        toggle_sort(&mut sorts, "age", true, true);
        assert_eq!(sorts.len(), 1);
        assert_eq!(sorts[0].field, "name");
        assert_eq!(sorts[0].index, Some(0));
    }

    #[test]
    fn test_toggle_without_unsorted_state() {
        let mut sorts = Vec::new();
        toggle_sort(&mut sorts, "age", false, false);
        toggle_sort(&mut sorts, "age", false, false);
        assert_eq!(sorts[0].direction, SortDirection::Descending);
        toggle_sort(&mut sorts, "age", false, false);
        assert_eq!(sorts[0].direction, SortDirection::Ascending);
        assert_eq!(sorts.len(), 1);
    }

    #[test]
    fn test_single_mode_replaces_other_columns() {
        let mut sorts = vec![
            SortDescriptor::new("age", SortDirection::Ascending).with_index(0),
            SortDescriptor::new("name", SortDirection::Ascending).with_index(1),
        ];
        toggle_sort(&mut sorts, "id", false, true);
        assert_eq!(sorts.len(), 1);
        assert_eq!(sorts[0].field, "id");
        assert_eq!(sorts[0].index, Some(0));
    }
}
