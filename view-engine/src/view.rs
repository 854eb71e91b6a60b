//! FILENAME: view-engine/src/view.rs
//! Renderable output - what the frontend displays.
//!
//! Every type here is a derived snapshot: the pipeline replaces these
//! structures wholesale on each recomputation and consumers must not retain
//! references across recomputations.

use engine::{RowKey, RowValue};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ============================================================================
// SEARCH OUTPUT
// ============================================================================

/// One highlighted span inside one field of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Field the match occurred in.
    pub field: String,

    /// The full field value the span indexes into.
    pub value: String,

    /// The matched slice of `value`.
    pub match_text: String,

    /// Byte offset of the span start within `value`.
    pub start_index: usize,

    /// Byte offset one past the span end.
    pub end_index: usize,

    /// Contribution of this span to the row score.
    pub score: f32,
}

/// All matches for one row, plus its key and summed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Row position in the dataset.
    pub row: u32,

    pub key: RowKey,

    /// Sum of match scores plus the positional bonus.
    pub score: f32,

    pub matches: SmallVec<[SearchMatch; 2]>,
}

// ============================================================================
// GROUPING OUTPUT
// ============================================================================

/// Aggregate computed for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub field: String,
    pub kind: crate::definition::AggregateKind,
    pub value: f64,
}

/// An intermediate node of the grouping hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupNode {
    /// Path-qualified composite key, e.g. `"dept:Eng|role:SWE"`. This is the
    /// stable identity for expand/collapse state; it survives data reloads
    /// as long as the grouping values are unchanged.
    pub key: String,

    /// Field this level groups by.
    pub field: String,

    /// The shared bucket value (blank sentinel for null/undefined/empty).
    pub value: RowValue,

    /// Display label for the bucket value.
    pub label: String,

    /// Row positions of every leaf under this node.
    pub items: Vec<u32>,

    /// Depth in the hierarchy (0 = top level).
    pub level: usize,

    pub expanded: bool,

    /// Leaf count under this node. Unaffected by collapse.
    pub count: usize,

    /// Child nodes; omitted entirely while collapsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<GroupedRow>>,

    #[serde(default)]
    pub aggregates: Vec<AggregateResult>,
}

/// A leaf of the grouping hierarchy: the original row wrapped with
/// positional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafRow {
    /// Row position in the dataset.
    pub row: u32,

    /// Depth in the hierarchy (0 when ungrouped).
    pub level: usize,

    /// Key of the owning leaf group, when grouped.
    #[serde(default)]
    pub group_key: Option<String>,
}

/// A tagged node of the grouped result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroupedRow {
    Group(GroupNode),
    Leaf(LeafRow),
}

impl GroupedRow {
    /// Leaf count of this node (1 for a leaf).
    pub fn count(&self) -> usize {
        match self {
            GroupedRow::Group(g) => g.count,
            GroupedRow::Leaf(_) => 1,
        }
    }
}

/// One entry of the flattened render list: either a group header or a data
/// row. Produced by the pre-order walk; collapsed subtrees are excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VisibleRow {
    Group {
        key: String,
        field: String,
        label: String,
        level: usize,
        expanded: bool,
        count: usize,
        aggregates: Vec<AggregateResult>,
    },
    Leaf(LeafRow),
}

// ============================================================================
// WINDOWING OUTPUT
// ============================================================================

/// The computed render window. Derived, never hand-edited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// First materialized index (inclusive).
    pub start_index: usize,

    /// One past the last materialized index.
    pub end_index: usize,

    /// Spacer height above the materialized rows.
    pub offset_top: f64,

    /// Spacer height below the materialized rows.
    pub offset_bottom: f64,

    pub total_height: f64,

    pub viewport_height: f64,

    /// The (possibly clamped) scroll position this window was computed for.
    pub scroll_top: f64,

    /// False while virtualization is bypassed (unmeasured container, small
    /// dataset, or content shorter than the container).
    pub virtualized: bool,
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

// ============================================================================
// FINAL SNAPSHOT
// ============================================================================

/// The complete derived output of one recomputation: the visible row
/// sequence after every enabled stage, plus the windowing metadata and
/// per-row highlight spans.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisibleView {
    /// Rows to materialize, in render order.
    pub rows: Vec<VisibleRow>,

    /// Length of the flattened sequence before windowing.
    pub total_rows: usize,

    /// Rows that survived filtering and searching (leaf count).
    pub total_items: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageInfo>,

    /// Highlight spans per matched row position.
    #[serde(default)]
    pub highlights: FxHashMap<u32, SmallVec<[SearchMatch; 2]>>,
}
