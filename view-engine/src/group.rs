//! FILENAME: view-engine/src/group.rs
//! Group Engine - hierarchical partition, expand state, aggregates.
//!
//! Rows are bucketed by the current descriptor's field value, then each
//! bucket recurses into the next descriptor until descriptors are
//! exhausted and buckets become leaf wrappers. Group membership is a strict
//! partition: each row belongs to exactly one leaf group path.
//!
//! Expand/collapse state is looked up (never stored on the node) by the
//! path-qualified composite key, so it survives the rebuild that happens on
//! every recomputation.

use engine::{compare_values, DataSet, RowValue};
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::definition::{AggregateKind, AggregateSpec, GroupDescriptor, GroupKeyState, SortDirection};
use crate::view::{AggregateResult, GroupNode, GroupedRow, LeafRow, VisibleRow};

/// Label used for the sentinel bucket of null/undefined/empty values.
pub const BLANK_LABEL: &str = "(blank)";

// ============================================================================
// EXPAND STATE
// ============================================================================

/// Per-key expand/collapse overrides, keyed by composite group key.
///
/// A key with no override falls back to the owning descriptor's `expanded`
/// default. Keys are value-based, not node-based, so state survives data
/// reloads as long as the grouping values are unchanged.
#[derive(Debug, Clone, Default)]
pub struct ExpandState {
    overrides: FxHashMap<String, bool>,
}

impl ExpandState {
    pub fn new() -> Self {
        ExpandState::default()
    }

    pub fn is_expanded(&self, key: &str, default: bool) -> bool {
        self.overrides.get(key).copied().unwrap_or(default)
    }

    /// Records an override. Returns true when the effective state changed.
    pub fn set(&mut self, key: &str, expanded: bool, default: bool) -> bool {
        let before = self.is_expanded(key, default);
        if expanded == default {
            self.overrides.remove(key);
        } else {
            self.overrides.insert(key.to_string(), expanded);
        }
        before != expanded
    }

    pub fn clear(&mut self) {
        self.overrides.clear();
    }

    /// Ordered projection for persistence (keyed set -> sorted list).
    pub fn to_entries(&self) -> Vec<GroupKeyState> {
        let mut entries: Vec<GroupKeyState> = self
            .overrides
            .iter()
            .map(|(key, &expanded)| GroupKeyState {
                key: key.clone(),
                expanded,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn from_entries(entries: &[GroupKeyState]) -> Self {
        ExpandState {
            overrides: entries
                .iter()
                .map(|e| (e.key.clone(), e.expanded))
                .collect(),
        }
    }
}

// ============================================================================
// GROUPING
// ============================================================================

/// Partitions `indices` into the grouped hierarchy. With no descriptors the
/// rows come back as plain leaf wrappers.
pub fn group(
    data: &DataSet,
    indices: &[u32],
    descriptors: &[GroupDescriptor],
    expand: &ExpandState,
) -> Vec<GroupedRow> {
    let mut ordered: Vec<&GroupDescriptor> = descriptors.iter().collect();
    ordered.sort_by_key(|d| d.index);
    let ordered: Vec<&GroupDescriptor> = ordered
        .into_iter()
        .filter(|d| {
            let known = data.column_index(&d.field).is_some();
            if !known {
                warn!("group descriptor targets unknown field '{}'", d.field);
            }
            known
        })
        .collect();

    build_level(data, indices, &ordered, 0, "", expand)
}

fn build_level(
    data: &DataSet,
    indices: &[u32],
    descriptors: &[&GroupDescriptor],
    level: usize,
    parent_key: &str,
    expand: &ExpandState,
) -> Vec<GroupedRow> {
    let Some(desc) = descriptors.get(level) else {
        return indices
            .iter()
            .map(|&row| {
                GroupedRow::Leaf(LeafRow {
                    row,
                    level,
                    group_key: (!parent_key.is_empty()).then(|| parent_key.to_string()),
                })
            })
            .collect();
    };

    // Bucket rows by field value, remembering first-occurrence order.
    let mut order: Vec<RowValue> = Vec::new();
    let mut buckets: FxHashMap<RowValue, Vec<u32>> = FxHashMap::default();
    for &row in indices {
        let value = data
            .value(row, &desc.field)
            .cloned()
            .unwrap_or(RowValue::Empty);
        // Blank values fold into one sentinel bucket.
        let value = if value.is_blank() { RowValue::Empty } else { value };
        let bucket = buckets.entry(value.clone()).or_insert_with(|| {
            order.push(value);
            Vec::new()
        });
        bucket.push(row);
    }

    if let Some(direction) = desc.sort_direction {
        order.sort_by(|a, b| {
            // The sentinel bucket is always last regardless of direction.
            match (a.is_blank(), b.is_blank()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                (false, false) => {
                    let ord = compare_values(a, b);
                    match direction {
                        SortDirection::Ascending => ord,
                        SortDirection::Descending => ord.reverse(),
                    }
                }
            }
        });
    }

    order
        .into_iter()
        .map(|value| {
            let items = buckets.remove(&value).unwrap_or_default();
            let label = if value.is_blank() {
                BLANK_LABEL.to_string()
            } else {
                value.display()
            };
            let key = if parent_key.is_empty() {
                format!("{}:{}", desc.field, label)
            } else {
                format!("{}|{}:{}", parent_key, desc.field, label)
            };
            let expanded = expand.is_expanded(&key, desc.expanded);

            // Children are built even while collapsed so counts stay full;
            // the collapsed node simply omits them from the output.
            let children = build_level(data, &items, descriptors, level + 1, &key, expand);
            let aggregates = compute_aggregates(data, &items, &desc.aggregates);

            GroupedRow::Group(GroupNode {
                key,
                field: desc.field.clone(),
                count: items.len(),
                value,
                label,
                items,
                level,
                expanded,
                children: expanded.then_some(children),
                aggregates,
            })
        })
        .collect()
}

/// Pre-order walk producing the linear render sequence: each group row is
/// followed by its children only while expanded.
pub fn flatten(groups: &[GroupedRow]) -> Vec<VisibleRow> {
    let mut out = Vec::new();
    flatten_into(groups, &mut out);
    out
}

fn flatten_into(nodes: &[GroupedRow], out: &mut Vec<VisibleRow>) {
    for node in nodes {
        match node {
            GroupedRow::Group(g) => {
                out.push(VisibleRow::Group {
                    key: g.key.clone(),
                    field: g.field.clone(),
                    label: g.label.clone(),
                    level: g.level,
                    expanded: g.expanded,
                    count: g.count,
                    aggregates: g.aggregates.clone(),
                });
                if let Some(children) = &g.children {
                    flatten_into(children, out);
                }
            }
            GroupedRow::Leaf(leaf) => out.push(VisibleRow::Leaf(leaf.clone())),
        }
    }
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// Computes the configured aggregates over a group's leaf items. Numeric
/// aggregates filter out non-numeric values rather than coercing them.
pub fn compute_aggregates(
    data: &DataSet,
    items: &[u32],
    specs: &[AggregateSpec],
) -> Vec<AggregateResult> {
    specs
        .iter()
        .map(|spec| AggregateResult {
            field: spec.field.clone(),
            kind: spec.kind,
            value: compute_one(data, items, spec),
        })
        .collect()
}

fn compute_one(data: &DataSet, items: &[u32], spec: &AggregateSpec) -> f64 {
    if let Some(custom) = &spec.custom {
        return custom(data, items);
    }

    match spec.kind {
        AggregateKind::Count => items.len() as f64,
        AggregateKind::DistinctCount => {
            let mut seen: FxHashSet<RowValue> = FxHashSet::default();
            for &row in items {
                if let Some(v) = data.value(row, &spec.field) {
                    seen.insert(v.clone());
                }
            }
            seen.len() as f64
        }
        AggregateKind::Custom => {
            warn!(
                "custom aggregate on '{}' has no calculation attached",
                spec.field
            );
            0.0
        }
        kind => {
            let numbers: SmallVec<[f64; 8]> = items
                .iter()
                .filter_map(|&row| match data.value(row, &spec.field) {
                    Some(RowValue::Number(n)) if !n.is_nan() => Some(*n),
                    _ => None,
                })
                .collect();
            if numbers.is_empty() {
                return 0.0;
            }
            match kind {
                AggregateKind::Sum => numbers.iter().sum(),
                AggregateKind::Avg => numbers.iter().sum::<f64>() / numbers.len() as f64,
                AggregateKind::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
                AggregateKind::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                _ => 0.0,
            }
        }
    }
}
