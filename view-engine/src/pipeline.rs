//! FILENAME: view-engine/src/pipeline.rs
//! View Pipeline - the orchestrating calculator.
//!
//! Owns the dataset, the active definitions, and the derived caches, and
//! recomputes the visible view on demand:
//!
//! raw dataset -> filter -> (search, if a query is active) -> sort ->
//! group (optional) -> paginate (client mode) | virtual scroll.
//!
//! All recomputation is synchronous and every derived structure is replaced
//! wholesale - consumers treat each [`VisibleView`] as a fresh snapshot and
//! never retain references across recomputations. No error escapes the
//! pipeline: malformed configuration degrades inside the stages and the
//! result is an empty or pass-through view, never a panic.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDateTime;
use engine::{default_row_key, ColumnMeta, DataSet, RowKey, RowValue};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::definition::{
    FilterCondition, GroupDescriptor, PageState, SearchConfig, SortDescriptor, StateSnapshot,
    VirtualConfig, SNAPSHOT_VERSION,
};
use crate::group::ExpandState;
use crate::scheduler::{Generation, Scheduler};
use crate::search::SearchIndex;
use crate::view::{LeafRow, SearchResult, VisibleRow, VisibleView};
use crate::{filter, group, paginate, sort, virtual_scroll};

/// Row-key extractor supplied by the host.
pub type RowKeyFn = Arc<dyn Fn(&DataSet, u32) -> RowKey + Send + Sync>;

/// Clock supplied by the host (tests pass a fixed instant).
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Events emitted toward the surrounding UI/state layers. Drained with
/// [`ViewPipeline::drain_events`]; the pipeline never acts on them itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GridEvent {
    FilterChanged,
    SortChanged,
    GroupChanged,
    GroupExpanded { key: String },
    GroupCollapsed { key: String },
    Search { term: String },
    PageChanged { page: usize },
    PageSizeChanged { page_size: usize },
    /// Generic change notification carrying the serializable state
    /// projection for the persistence collaborator.
    StateChanged(Box<StateSnapshot>),
}

/// The pipeline instance. One per grid.
pub struct ViewPipeline {
    data: DataSet,

    conditions: Vec<FilterCondition>,
    quick_filter: Option<String>,
    search_term: Option<String>,
    sorts: Vec<SortDescriptor>,
    groups: Vec<GroupDescriptor>,
    expand: ExpandState,
    page: Option<PageState>,
    virtual_config: Option<VirtualConfig>,

    scroll_top: f64,
    container_height: f64,

    search: SearchIndex,
    scheduler: Scheduler,
    events: VecDeque<GridEvent>,

    key_fn: Option<RowKeyFn>,
    clock: Clock,
}

impl ViewPipeline {
    pub fn new(data: DataSet) -> Self {
        ViewPipeline {
            data,
            conditions: Vec::new(),
            quick_filter: None,
            search_term: None,
            sorts: Vec::new(),
            groups: Vec::new(),
            expand: ExpandState::new(),
            page: None,
            virtual_config: None,
            scroll_top: 0.0,
            container_height: 0.0,
            search: SearchIndex::default(),
            scheduler: Scheduler::new(),
            events: VecDeque::new(),
            key_fn: None,
            clock: Arc::new(|| chrono::Local::now().naive_local()),
        }
    }

    pub fn with_search_config(mut self, config: SearchConfig) -> Self {
        self.search = SearchIndex::new(config);
        self
    }

    pub fn with_row_key(mut self, key_fn: RowKeyFn) -> Self {
        self.key_fn = Some(key_fn);
        self
    }

    /// Replaces the wall clock; date-bucket filters become pure functions of
    /// the injected instant.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    // ========================================================================
    // INPUT MUTATION
    // ========================================================================

    pub fn data(&self) -> &DataSet {
        &self.data
    }

    /// Replaces the raw dataset. Derived caches invalidate via the revision
    /// bump on their next use.
    pub fn set_rows(&mut self, rows: Vec<Vec<RowValue>>) {
        self.data.replace_rows(rows);
        self.emit_state_changed();
    }

    pub fn set_columns(&mut self, columns: Vec<ColumnMeta>) {
        self.data.replace_columns(columns);
        self.search.invalidate();
        self.emit_state_changed();
    }

    pub fn set_conditions(&mut self, conditions: Vec<FilterCondition>) {
        self.conditions = conditions;
        self.events.push_back(GridEvent::FilterChanged);
        self.emit_state_changed();
    }

    pub fn add_condition(&mut self, condition: FilterCondition) {
        self.conditions.push(condition);
        self.events.push_back(GridEvent::FilterChanged);
        self.emit_state_changed();
    }

    pub fn clear_conditions(&mut self) {
        if !self.conditions.is_empty() {
            self.conditions.clear();
            self.events.push_back(GridEvent::FilterChanged);
            self.emit_state_changed();
        }
    }

    pub fn set_quick_filter(&mut self, term: Option<String>) {
        self.quick_filter = term.filter(|t| !t.trim().is_empty());
        self.events.push_back(GridEvent::FilterChanged);
        self.emit_state_changed();
    }

    pub fn set_search_term(&mut self, term: Option<String>) {
        self.search_term = term.filter(|t| !t.trim().is_empty());
        self.events.push_back(GridEvent::Search {
            term: self.search_term.clone().unwrap_or_default(),
        });
        self.emit_state_changed();
    }

    pub fn set_sorts(&mut self, sorts: Vec<SortDescriptor>) {
        self.sorts = sorts;
        self.events.push_back(GridEvent::SortChanged);
        self.emit_state_changed();
    }

    /// Single-click sort toggle (see [`sort::toggle_sort`]).
    pub fn toggle_sort(&mut self, field: &str, multi: bool, allow_unsorted: bool) {
        sort::toggle_sort(&mut self.sorts, field, multi, allow_unsorted);
        self.events.push_back(GridEvent::SortChanged);
        self.emit_state_changed();
    }

    pub fn set_groups(&mut self, groups: Vec<GroupDescriptor>) {
        self.groups = groups;
        self.events.push_back(GridEvent::GroupChanged);
        self.emit_state_changed();
    }

    /// Expands or collapses one group by composite key.
    pub fn set_group_expanded(&mut self, key: &str, expanded: bool) {
        let default = self.default_expanded_for(key);
        if self.expand.set(key, expanded, default) {
            self.events.push_back(if expanded {
                GridEvent::GroupExpanded { key: key.to_string() }
            } else {
                GridEvent::GroupCollapsed { key: key.to_string() }
            });
            self.emit_state_changed();
        }
    }

    /// The owning descriptor's default for a composite key (its level is the
    /// number of path segments minus one).
    fn default_expanded_for(&self, key: &str) -> bool {
        let level = key.split('|').count().saturating_sub(1);
        let mut ordered: Vec<&GroupDescriptor> = self.groups.iter().collect();
        ordered.sort_by_key(|d| d.index);
        ordered.get(level).map_or(true, |d| d.expanded)
    }

    /// Enables client-mode pagination.
    pub fn set_page_state(&mut self, page: Option<PageState>) {
        self.page = page;
        self.emit_state_changed();
    }

    pub fn set_page(&mut self, page: usize) {
        if let Some(state) = self.page.as_mut() {
            state.page = page.max(1);
            let page = state.page;
            self.events.push_back(GridEvent::PageChanged { page });
            self.emit_state_changed();
        }
    }

    /// Changes the page size, repositioning so the first visible record
    /// stays approximately stationary.
    pub fn set_page_size(&mut self, page_size: usize) {
        if let Some(state) = self.page.as_mut() {
            paginate::change_page_size(state, page_size);
            self.events.push_back(GridEvent::PageSizeChanged { page_size });
            self.emit_state_changed();
        }
    }

    /// Enables virtual-scroll mode (takes precedence over pagination).
    pub fn set_virtual_config(&mut self, config: Option<VirtualConfig>) {
        self.virtual_config = config;
    }

    pub fn set_container_height(&mut self, height: f64) {
        self.container_height = height;
    }

    pub fn set_scroll_top(&mut self, scroll_top: f64) {
        self.scroll_top = scroll_top;
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn drain_events(&mut self) -> Vec<GridEvent> {
        self.events.drain(..).collect()
    }

    fn emit_state_changed(&mut self) {
        let snapshot = self.snapshot();
        self.events
            .push_back(GridEvent::StateChanged(Box::new(snapshot)));
    }

    // ========================================================================
    // RECOMPUTATION
    // ========================================================================

    /// Starts a unit of recomputation work; pair with
    /// [`ViewPipeline::recompute_if_current`] when triggers can supersede
    /// each other (debounced keystrokes, coalesced scrolls).
    pub fn begin_recompute(&mut self) -> Generation {
        self.scheduler.begin()
    }

    /// Runs the recomputation only if `generation` has not been superseded
    /// by a newer trigger; a stale token yields `None` and no work.
    pub fn recompute_if_current(&mut self, generation: Generation) -> Option<VisibleView> {
        if self.scheduler.is_current(generation) {
            Some(self.recompute())
        } else {
            None
        }
    }

    /// Runs the full stage chain and returns a fresh snapshot.
    pub fn recompute(&mut self) -> VisibleView {
        let now = (self.clock)();

        // Stage 1: filtering (structured conditions AND quick term).
        let mut current = filter::apply(
            &self.data,
            &self.conditions,
            self.quick_filter.as_deref(),
            now,
        );

        // Stage 2: indexed search, when a query is active. Results arrive
        // ranked; the ranking survives unless sort descriptors take over.
        let mut highlights = FxHashMap::default();
        if let Some(term) = self.search_term.clone() {
            let results = self.search.query(&self.data, &term);
            let rank: FxHashMap<u32, usize> = results
                .iter()
                .enumerate()
                .map(|(i, r)| (r.row, i))
                .collect();
            current.retain(|row| rank.contains_key(row));
            current.sort_by_key(|row| rank[row]);

            let visible: FxHashSet<u32> = current.iter().copied().collect();
            for result in results {
                if visible.contains(&result.row) {
                    highlights.insert(result.row, result.matches);
                }
            }
        }

        // Stage 3: multi-key sort.
        sort::apply(&self.data, &mut current, &self.sorts);

        let total_items = current.len();

        // Stage 4: grouping + flatten.
        let flat: Vec<VisibleRow> = if self.groups.is_empty() {
            current
                .iter()
                .map(|&row| {
                    VisibleRow::Leaf(LeafRow {
                        row,
                        level: 0,
                        group_key: None,
                    })
                })
                .collect()
        } else {
            let tree = group::group(&self.data, &current, &self.groups, &self.expand);
            group::flatten(&tree)
        };
        let total_rows = flat.len();

        // Stage 5: windowing - virtual scroll wins over pagination.
        if let Some(config) = self.virtual_config {
            let viewport =
                virtual_scroll::compute(total_rows, self.scroll_top, self.container_height, &config);
            if viewport.virtualized {
                // Keep the underlying scroll position in sync with clamping.
                self.scroll_top = viewport.scroll_top;
            }
            let rows = flat[viewport.start_index..viewport.end_index].to_vec();
            return VisibleView {
                rows,
                total_rows,
                total_items,
                viewport: Some(viewport),
                page: None,
                highlights,
            };
        }

        if let Some(state) = self.page.as_mut() {
            let info = paginate::page_info(*state, total_rows);
            if info.page != state.page {
                state.page = info.page;
                self.events.push_back(GridEvent::PageChanged { page: info.page });
            }
            let range = paginate::slice(total_rows, info.page, info.page_size);
            return VisibleView {
                rows: flat[range].to_vec(),
                total_rows,
                total_items,
                viewport: None,
                page: Some(info),
                highlights,
            };
        }

        VisibleView {
            rows: flat,
            total_rows,
            total_items,
            viewport: None,
            page: None,
            highlights,
        }
    }

    /// Ranked search results with the host's row keys applied. Independent
    /// of the visible view; used by search-result collaborators.
    pub fn ranked_results(&mut self, term: &str) -> Vec<SearchResult> {
        let mut results = self.search.query(&self.data, term);
        if let Some(key_fn) = &self.key_fn {
            for result in &mut results {
                result.key = key_fn(&self.data, result.row);
            }
        }
        results
    }

    /// Row key for one row position, through the host extractor when set.
    pub fn row_key(&self, row: u32) -> RowKey {
        match &self.key_fn {
            Some(key_fn) => key_fn(&self.data, row),
            None => default_row_key(&self.data, row),
        }
    }

    /// Ordered unique values of one field, for filter-dropdown collaborators.
    pub fn distinct_values(&self, field: &str) -> Vec<RowValue> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for row in self.data.rows() {
            let value = self
                .data
                .value_in(row, field)
                .cloned()
                .unwrap_or(RowValue::Empty);
            if seen.insert(value.clone()) {
                out.push(value);
            }
        }
        out.sort_by(engine::compare_values);
        out
    }

    // ========================================================================
    // STATE SNAPSHOT
    // ========================================================================

    /// Serializable projection of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            version: SNAPSHOT_VERSION,
            filters: self.conditions.clone(),
            quick_filter: self.quick_filter.clone(),
            search_term: self.search_term.clone(),
            sorts: self.sorts.clone(),
            groups: self.groups.clone(),
            expanded_keys: self.expand.to_entries(),
            page: self.page,
        }
    }

    /// Restores a previously captured projection. Custom predicates and
    /// comparators do not survive serialization and come back empty.
    pub fn apply_snapshot(&mut self, snapshot: StateSnapshot) {
        self.conditions = snapshot.filters;
        self.quick_filter = snapshot.quick_filter;
        self.search_term = snapshot.search_term;
        self.sorts = snapshot.sorts;
        self.groups = snapshot.groups;
        self.expand = ExpandState::from_entries(&snapshot.expanded_keys);
        self.page = snapshot.page;
        self.emit_state_changed();
    }
}
