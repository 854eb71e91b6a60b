//! FILENAME: view-engine/src/definition.rs
//! View Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE the active view.
//! These structures are designed to be:
//! - Serializable (for saving/loading grid state)
//! - Immutable snapshots of user intent
//!
//! The custom-predicate / custom-comparator escape hatches are the one
//! exception: they are function values, skipped on serialization and absent
//! after a load.

use std::cmp::Ordering;
use std::sync::Arc;

use engine::{DataSet, DataType, Row, RowValue};
use serde::{Deserialize, Serialize};

// ============================================================================
// FILTERING
// ============================================================================

/// The closed set of filter operators.
///
/// Date-bucket operators compute their reference window from an explicit
/// "now" at evaluation time, so a persisted "today" condition stays correct
/// across recomputations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisQuarter,
    LastQuarter,
    ThisYear,
    LastYear,
    YearToDate,
    DateRange,
}

/// A predicate that fully replaces operator dispatch for its condition.
/// Receives the cell value and the whole row.
pub type CustomFilter = Arc<dyn Fn(&RowValue, &Row) -> bool + Send + Sync>;

/// One structured filter condition. All active conditions are ANDed; each is
/// evaluated independently of the others.
#[derive(Clone, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Field the condition targets.
    pub field: String,

    /// Operator to dispatch on (ignored when `custom` is present).
    pub operator: FilterOperator,

    /// Primary operand.
    #[serde(default)]
    pub value: Option<RowValue>,

    /// Second operand for `Between` / `DateRange`.
    #[serde(default)]
    pub value2: Option<RowValue>,

    /// Operand list for `In` / `NotIn`. Blank membership (null, undefined,
    /// empty string) must be listed explicitly by the caller.
    #[serde(default)]
    pub values: Vec<RowValue>,

    /// Case-sensitive text comparison. Off by default.
    #[serde(default)]
    pub case_sensitive: bool,

    /// Overrides the column's declared type for coercion.
    #[serde(default)]
    pub data_type: Option<DataType>,

    /// Custom predicate escape hatch; bypasses operator dispatch entirely.
    #[serde(skip)]
    pub custom: Option<CustomFilter>,
}

impl std::fmt::Debug for FilterCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterCondition")
            .field("field", &self.field)
            .field("operator", &self.operator)
            .field("value", &self.value)
            .field("value2", &self.value2)
            .field("values", &self.values)
            .field("case_sensitive", &self.case_sensitive)
            .field("data_type", &self.data_type)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: FilterOperator) -> Self {
        FilterCondition {
            field: field.into(),
            operator,
            value: None,
            value2: None,
            values: Vec::new(),
            case_sensitive: false,
            data_type: None,
            custom: None,
        }
    }

    pub fn with_value(mut self, value: RowValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_range(mut self, low: RowValue, high: RowValue) -> Self {
        self.value = Some(low);
        self.value2 = Some(high);
        self
    }

    pub fn with_values(mut self, values: Vec<RowValue>) -> Self {
        self.values = values;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_custom(mut self, custom: CustomFilter) -> Self {
        self.custom = Some(custom);
        self
    }
}

// ============================================================================
// SORTING
// ============================================================================

/// Sort direction for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// A comparator that replaces typed coercion for its descriptor. Its sign is
/// flipped for descending direction.
pub type CustomComparator = Arc<dyn Fn(&RowValue, &RowValue) -> Ordering + Send + Sync>;

/// One active sort rule.
#[derive(Clone, Serialize, Deserialize)]
pub struct SortDescriptor {
    /// Field the descriptor targets.
    pub field: String,

    pub direction: SortDirection,

    /// Tie-break precedence in multi-sort (lower compares first). Absence
    /// means declaration order.
    #[serde(default)]
    pub index: Option<usize>,

    /// Custom comparator escape hatch.
    #[serde(skip)]
    pub comparator: Option<CustomComparator>,
}

impl std::fmt::Debug for SortDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortDescriptor")
            .field("field", &self.field)
            .field("direction", &self.direction)
            .field("index", &self.index)
            .field("comparator", &self.comparator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl SortDescriptor {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        SortDescriptor {
            field: field.into(),
            direction,
            index: None,
            comparator: None,
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_comparator(mut self, comparator: CustomComparator) -> Self {
        self.comparator = Some(comparator);
        self
    }
}

// ============================================================================
// GROUPING
// ============================================================================

/// Supported aggregate calculations over a group's leaf items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AggregateKind {
    #[default]
    Sum,
    Avg,
    Min,
    Max,
    Count,
    DistinctCount,
    /// Resolved through the attached `custom` closure.
    Custom,
}

/// A custom aggregate over a group's items (row positions into the dataset).
pub type CustomAggregate = Arc<dyn Fn(&DataSet, &[u32]) -> f64 + Send + Sync>;

/// One aggregate to compute per group.
#[derive(Clone, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// Field the aggregate reads.
    pub field: String,

    pub kind: AggregateKind,

    #[serde(skip)]
    pub custom: Option<CustomAggregate>,
}

impl std::fmt::Debug for AggregateSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateSpec")
            .field("field", &self.field)
            .field("kind", &self.kind)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl AggregateSpec {
    pub fn new(field: impl Into<String>, kind: AggregateKind) -> Self {
        AggregateSpec {
            field: field.into(),
            kind,
            custom: None,
        }
    }

    pub fn custom(field: impl Into<String>, calc: CustomAggregate) -> Self {
        AggregateSpec {
            field: field.into(),
            kind: AggregateKind::Custom,
            custom: Some(calc),
        }
    }
}

/// One grouping level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDescriptor {
    /// Field whose values partition the rows at this level.
    pub field: String,

    /// Default expand state for groups at this level. Per-key overrides live
    /// in the expand-state lookup table, not on the descriptor.
    #[serde(default = "default_expanded")]
    pub expanded: bool,

    /// Optional ordering of the buckets; first-occurrence order when absent.
    /// The blank sentinel bucket sorts last regardless of direction.
    #[serde(default)]
    pub sort_direction: Option<SortDirection>,

    /// Hierarchy position (lower is outer).
    pub index: usize,

    /// Aggregates computed for every group at this level.
    #[serde(default)]
    pub aggregates: Vec<AggregateSpec>,
}

fn default_expanded() -> bool {
    true
}

impl GroupDescriptor {
    pub fn new(field: impl Into<String>, index: usize) -> Self {
        GroupDescriptor {
            field: field.into(),
            expanded: true,
            sort_direction: None,
            index,
            aggregates: Vec::new(),
        }
    }

    pub fn with_sort(mut self, direction: SortDirection) -> Self {
        self.sort_direction = Some(direction);
        self
    }

    pub fn with_aggregates(mut self, aggregates: Vec<AggregateSpec>) -> Self {
        self.aggregates = aggregates;
        self
    }

    pub fn collapsed(mut self) -> Self {
        self.expanded = false;
        self
    }
}

// ============================================================================
// PAGINATION & VIRTUALIZATION CONFIG
// ============================================================================

/// Client-mode pagination state. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub page: usize,
    pub page_size: usize,
}

impl PageState {
    pub fn new(page_size: usize) -> Self {
        PageState { page: 1, page_size }
    }
}

/// Virtual-scroll configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VirtualConfig {
    /// Fixed row height in pixels.
    pub row_height: f64,

    /// Extra rows materialized above and below the visible range.
    #[serde(default = "default_buffer")]
    pub buffer: usize,

    /// Row counts at or below this render unvirtualized (full pass-through).
    #[serde(default = "default_virtual_threshold")]
    pub disable_threshold: usize,
}

fn default_buffer() -> usize {
    5
}

fn default_virtual_threshold() -> usize {
    100
}

impl Default for VirtualConfig {
    fn default() -> Self {
        VirtualConfig {
            row_height: 32.0,
            buffer: 5,
            disable_threshold: 100,
        }
    }
}

/// Search behavior knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Case-sensitive token matching. Off by default.
    #[serde(default)]
    pub case_sensitive: bool,

    /// Datasets at or below this size are scanned directly; the inverted
    /// index only pays for itself above it.
    #[serde(default = "default_scan_threshold")]
    pub scan_threshold: usize,

    /// Maximum cached query results (FIFO eviction).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_scan_threshold() -> usize {
    200
}

fn default_cache_capacity() -> usize {
    64
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            case_sensitive: false,
            scan_threshold: 200,
            cache_capacity: 64,
        }
    }
}

// ============================================================================
// STATE SNAPSHOT
// ============================================================================

/// Explicit expand/collapse override for one group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupKeyState {
    pub key: String,
    pub expanded: bool,
}

/// Serializable projection of the view state, produced for the persistence
/// collaborator and for the generic state-changed event. Keyed sets are
/// converted to ordered lists here and reconstructed on load. Conditions
/// carrying custom predicates serialize their declarative part only.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateSnapshot {
    /// Snapshot format version.
    pub version: u32,

    #[serde(default)]
    pub filters: Vec<FilterCondition>,

    #[serde(default)]
    pub quick_filter: Option<String>,

    #[serde(default)]
    pub search_term: Option<String>,

    #[serde(default)]
    pub sorts: Vec<SortDescriptor>,

    #[serde(default)]
    pub groups: Vec<GroupDescriptor>,

    /// Ordered list of per-key expand overrides.
    #[serde(default)]
    pub expanded_keys: Vec<GroupKeyState>,

    #[serde(default)]
    pub page: Option<PageState>,
}

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;
