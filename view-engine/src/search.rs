//! FILENAME: view-engine/src/search.rs
//! Search Index - token index, ranked queries, highlight spans.
//!
//! Construction tokenizes each searchable field value into (a) the whole
//! value, (b) whitespace-split words of length >= 2, and (c) all overlapping
//! 2-character substrings (bigrams); each token maps to the row positions
//! containing it. The index is only a candidate generator: postings are a
//! superset filter and every candidate is re-scored by the exact matching
//! rules below.
//!
//! The index is built once per dataset revision and reused across queries
//! until the dataset changes, then rebuilt lazily on the next query. Below a
//! size threshold a direct per-row scan replaces the index entirely, since
//! index maintenance costs more than it saves.

use std::collections::VecDeque;

use engine::{default_row_key, DataSet};
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::definition::SearchConfig;
use crate::view::{SearchMatch, SearchResult};

/// Score for an exact whole-field match.
const SCORE_EXACT: f32 = 100.0;
/// Score for a prefix match.
const SCORE_STARTS_WITH: f32 = 75.0;
/// Base score for a substring match; decays with the match offset.
const SCORE_CONTAINS: f32 = 50.0;
/// Substring matches never decay below this.
const SCORE_CONTAINS_FLOOR: f32 = 10.0;

type CacheKey = (String, bool, usize);

/// Bounded FIFO cache of query results, keyed by
/// `(term, case-sensitivity, dataset length)`.
struct QueryCache {
    map: FxHashMap<CacheKey, Vec<SearchResult>>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl QueryCache {
    fn new(capacity: usize) -> Self {
        QueryCache {
            map: FxHashMap::default(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, key: &CacheKey) -> Option<&Vec<SearchResult>> {
        self.map.get(key)
    }

    fn insert(&mut self, key: CacheKey, results: Vec<SearchResult>) {
        if self.capacity == 0 {
            return;
        }
        if !self.map.contains_key(&key) {
            if self.order.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                }
            }
            self.order.push_back(key.clone());
        }
        self.map.insert(key, results);
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

/// The inverted index over searchable fields.
pub struct SearchIndex {
    config: SearchConfig,
    postings: FxHashMap<Box<str>, Vec<u32>>,
    built_revision: Option<u64>,
    cache: QueryCache,
}

impl Default for SearchIndex {
    fn default() -> Self {
        SearchIndex::new(SearchConfig::default())
    }
}

impl SearchIndex {
    pub fn new(config: SearchConfig) -> Self {
        let cache = QueryCache::new(config.cache_capacity);
        SearchIndex {
            config,
            postings: FxHashMap::default(),
            built_revision: None,
            cache,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Drops the index and the query cache. The next query rebuilds lazily.
    pub fn invalidate(&mut self) {
        self.postings.clear();
        self.built_revision = None;
        self.cache.clear();
    }

    /// Rebuilds the postings if the dataset revision moved since the last
    /// build. Small datasets skip the build entirely (scan path).
    fn ensure_built(&mut self, data: &DataSet) {
        if self.built_revision == Some(data.revision()) {
            return;
        }
        self.postings.clear();
        self.cache.clear();
        if data.len() > self.config.scan_threshold {
            self.build_postings(data);
            debug!(
                "search index rebuilt: {} tokens over {} rows (revision {})",
                self.postings.len(),
                data.len(),
                data.revision()
            );
        }
        self.built_revision = Some(data.revision());
    }

    fn build_postings(&mut self, data: &DataSet) {
        for row in data.rows() {
            for (col, _) in data.searchable_columns() {
                let Some(value) = row.values.get(col) else {
                    continue;
                };
                let raw = value.display();
                if raw.is_empty() {
                    continue;
                }
                let norm = self.normalize(&raw);

                self.add_posting(norm.as_str(), row.source_row);
                for word in norm.split_whitespace() {
                    if word.chars().count() >= 2 {
                        self.add_posting(word, row.source_row);
                    }
                }
                for bigram in bigrams(&norm) {
                    self.add_posting(&bigram, row.source_row);
                }
            }
        }
    }

    fn add_posting(&mut self, token: &str, row: u32) {
        let list = self
            .postings
            .entry(Box::from(token))
            .or_insert_with(Vec::new);
        // Tokens repeat within one row (several fields, repeated bigrams);
        // postings stay sorted and deduplicated because rows arrive in order.
        if list.last() != Some(&row) {
            list.push(row);
        }
    }

    fn normalize(&self, s: &str) -> String {
        if self.config.case_sensitive {
            s.to_string()
        } else {
            // ASCII folding preserves byte offsets, which keeps match spans
            // valid slices of the original value.
            s.to_ascii_lowercase()
        }
    }

    /// Ranked search. Results are ordered by descending score with original
    /// row order breaking ties; each result carries its highlight spans.
    pub fn query(&mut self, data: &DataSet, term: &str) -> Vec<SearchResult> {
        let term = self.normalize(term.trim());
        if term.is_empty() {
            return Vec::new();
        }

        self.ensure_built(data);

        let key: CacheKey = (term.clone(), self.config.case_sensitive, data.len());
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }

        let mut results: Vec<SearchResult> = if data.len() <= self.config.scan_threshold {
            // Scan path: every row is a candidate.
            (0..data.len() as u32)
                .filter_map(|row| self.score_row(data, row, &term))
                .collect()
        } else {
            let mut candidates: Vec<u32> = self.candidates(&term).into_iter().collect();
            candidates.sort_unstable();
            candidates
                .into_iter()
                .filter_map(|row| self.score_row(data, row, &term))
                .collect()
        };

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.row.cmp(&b.row))
        });

        self.cache.insert(key, results.clone());
        results
    }

    /// Candidate rows: the union of postings for the exact term and for each
    /// of its bigrams. A superset of the true matches by construction.
    fn candidates(&self, term: &str) -> FxHashSet<u32> {
        let mut set = FxHashSet::default();
        if let Some(rows) = self.postings.get(term) {
            set.extend(rows.iter().copied());
        }
        for bigram in bigrams(term) {
            if let Some(rows) = self.postings.get(bigram.as_str()) {
                set.extend(rows.iter().copied());
            }
        }
        set
    }

    /// Exact matching rules, applied per searchable field:
    /// full-field match > prefix > substring (earlier offset scores higher),
    /// weighted per field; one row sums its field scores and adds a small
    /// bonus favoring earlier rows.
    fn score_row(&self, data: &DataSet, row_idx: u32, term: &str) -> Option<SearchResult> {
        let row = data.row(row_idx)?;
        let mut matches: SmallVec<[SearchMatch; 2]> = SmallVec::new();
        let mut total = 0.0f32;

        for (col, meta) in data.searchable_columns() {
            let Some(value) = row.values.get(col) else {
                continue;
            };
            let raw = value.display();
            if raw.is_empty() {
                continue;
            }
            let norm = self.normalize(&raw);

            let (score, start) = if norm == term {
                (SCORE_EXACT, 0)
            } else if norm.starts_with(term) {
                (SCORE_STARTS_WITH, 0)
            } else if let Some(pos) = norm.find(term) {
                ((SCORE_CONTAINS - pos as f32).max(SCORE_CONTAINS_FLOOR), pos)
            } else {
                continue;
            };

            let end = if score == SCORE_EXACT {
                raw.len()
            } else {
                start + term.len()
            };
            let weighted = score * meta.search_weight;
            matches.push(SearchMatch {
                field: meta.field.clone(),
                match_text: raw.get(start..end).unwrap_or("").to_string(),
                value: raw,
                start_index: start,
                end_index: end,
                score: weighted,
            });
            total += weighted;
        }

        if matches.is_empty() {
            return None;
        }
        total += 1.0 / (1.0 + row_idx as f32);
        Some(SearchResult {
            row: row_idx,
            key: default_row_key(data, row_idx),
            score: total,
            matches,
        })
    }
}

/// All overlapping 2-character substrings of `s`, as owned strings.
fn bigrams(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| w.iter().collect()).collect()
}

/// Renders one field value with `<mark>` tags around each match span.
///
/// Spans are processed in descending start-offset order so earlier
/// insertions never shift later offsets; the caller passes the matches that
/// belong to this field.
pub fn highlight_value(value: &str, matches: &[SearchMatch]) -> String {
    let mut spans: Vec<(usize, usize)> = matches
        .iter()
        .map(|m| (m.start_index, m.end_index))
        .filter(|&(start, end)| {
            start < end
                && end <= value.len()
                && value.is_char_boundary(start)
                && value.is_char_boundary(end)
        })
        .collect();
    spans.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = value.to_string();
    for (start, end) in spans {
        out.insert_str(end, "</mark>");
        out.insert_str(start, "<mark>");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{ColumnMeta, DataType, RowValue};

    fn people() -> DataSet {
        DataSet::from_rows(
            vec![
                ColumnMeta::new("id", DataType::Number).with_searchable(false),
                ColumnMeta::new("name", DataType::Text),
                ColumnMeta::new("city", DataType::Text),
            ],
            vec![
                vec![RowValue::Number(1.0), RowValue::text("John"), RowValue::text("Oslo")],
                vec![RowValue::Number(2.0), RowValue::text("Joan"), RowValue::text("Lisbon")],
                vec![RowValue::Number(3.0), RowValue::text("Bo"), RowValue::text("Johannesburg")],
                vec![RowValue::Number(4.0), RowValue::text("Maja"), RowValue::text("Rio")],
            ],
        )
    }

    #[test]
    fn test_prefix_match_span() {
        let mut index = SearchIndex::default();
        let data = people();
        let results = index.query(&data, "jo");

        let john = results.iter().find(|r| r.row == 0).unwrap();
        let m = &john.matches[0];
        assert_eq!(m.field, "name");
        assert_eq!(m.start_index, 0);
        assert_eq!(m.end_index, 2);
        assert_eq!(m.match_text, "Jo");
        assert_eq!(highlight_value(&m.value, &john.matches), "<mark>Jo</mark>hn");
    }

    #[test]
    fn test_ranking_exact_over_prefix_over_contains() {
        let data = DataSet::from_rows(
            vec![ColumnMeta::new("name", DataType::Text)],
            vec![
                vec![RowValue::text("Cujo")],   // contains
                vec![RowValue::text("Jovan")],  // starts with
                vec![RowValue::text("Jo")],     // exact
            ],
        );
        let mut index = SearchIndex::default();
        let rows: Vec<u32> = index.query(&data, "jo").iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![2, 1, 0]);
    }

    #[test]
    fn test_earlier_offset_scores_higher() {
        let data = DataSet::from_rows(
            vec![ColumnMeta::new("name", DataType::Text)],
            vec![
                vec![RowValue::text("xxxxxjo")],
                vec![RowValue::text("xjo")],
            ],
        );
        let mut index = SearchIndex::default();
        let rows: Vec<u32> = index.query(&data, "jo").iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![1, 0]);
    }

    #[test]
    fn test_field_weight_scales_score() {
        let data = DataSet::from_rows(
            vec![
                ColumnMeta::new("title", DataType::Text).with_search_weight(3.0),
                ColumnMeta::new("body", DataType::Text),
            ],
            vec![
                vec![RowValue::Empty, RowValue::text("needle")],
                vec![RowValue::text("needle"), RowValue::Empty],
            ],
        );
        let mut index = SearchIndex::default();
        let results = index.query(&data, "needle");
        assert_eq!(results[0].row, 1);
        assert!(results[0].score > results[1].score * 2.0);
    }

    #[test]
    fn test_multiple_field_matches_sum() {
        let data = DataSet::from_rows(
            vec![
                ColumnMeta::new("a", DataType::Text),
                ColumnMeta::new("b", DataType::Text),
            ],
            vec![
                vec![RowValue::text("jo"), RowValue::text("jo")],
                vec![RowValue::text("jo"), RowValue::Empty],
            ],
        );
        let mut index = SearchIndex::default();
        let results = index.query(&data, "jo");
        assert_eq!(results[0].row, 0);
        assert_eq!(results[0].matches.len(), 2);
    }

    #[test]
    fn test_ties_break_by_original_order() {
        let data = DataSet::from_rows(
            vec![ColumnMeta::new("name", DataType::Text)],
            (0..5).map(|_| vec![RowValue::text("same")]).collect(),
        );
        let mut index = SearchIndex::default();
        let rows: Vec<u32> = index.query(&data, "same").iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_index_path_matches_scan_path() {
        let rows: Vec<Vec<RowValue>> = (0..40)
            .map(|i| vec![RowValue::text(format!("item {} johnson", i))])
            .collect();
        let data = DataSet::from_rows(vec![ColumnMeta::new("name", DataType::Text)], rows);

        let mut scan = SearchIndex::new(SearchConfig {
            scan_threshold: 1000,
            ..SearchConfig::default()
        });
        let mut indexed = SearchIndex::new(SearchConfig {
            scan_threshold: 10,
            ..SearchConfig::default()
        });

        let a = scan.query(&data, "johnson");
        let b = indexed.query(&data, "johnson");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_rebuild_on_revision_bump() {
        let mut data = people();
        let mut index = SearchIndex::default();
        assert_eq!(index.query(&data, "maja").len(), 1);

        data.replace_rows(vec![vec![
            RowValue::Number(9.0),
            RowValue::text("Nadia"),
            RowValue::text("Cairo"),
        ]]);
        assert!(index.query(&data, "maja").is_empty());
        assert_eq!(index.query(&data, "nadia").len(), 1);
    }

    #[test]
    fn test_cache_eviction_is_fifo() {
        let data = people();
        let mut index = SearchIndex::new(SearchConfig {
            cache_capacity: 2,
            ..SearchConfig::default()
        });
        index.query(&data, "jo");
        index.query(&data, "bo");
        index.query(&data, "rio"); // evicts "jo"
        assert_eq!(index.cache.order.len(), 2);
        assert!(index
            .cache
            .get(&("jo".to_string(), false, data.len()))
            .is_none());
        assert!(index
            .cache
            .get(&("rio".to_string(), false, data.len()))
            .is_some());
    }

    #[test]
    fn test_case_sensitive_mode() {
        let data = people();
        let mut index = SearchIndex::new(SearchConfig {
            case_sensitive: true,
            ..SearchConfig::default()
        });
        assert!(index.query(&data, "john").is_empty());
        assert_eq!(index.query(&data, "John").len(), 1);
    }

    #[test]
    fn test_overlapping_highlights_render_inside_out() {
        let matches = vec![
            SearchMatch {
                field: "name".into(),
                value: "abcd".into(),
                match_text: "ab".into(),
                start_index: 0,
                end_index: 2,
                score: 1.0,
            },
            SearchMatch {
                field: "name".into(),
                value: "abcd".into(),
                match_text: "cd".into(),
                start_index: 2,
                end_index: 4,
                score: 1.0,
            },
        ];
        assert_eq!(
            highlight_value("abcd", &matches),
            "<mark>ab</mark><mark>cd</mark>"
        );
    }

    #[test]
    fn test_empty_term_returns_nothing() {
        let data = people();
        let mut index = SearchIndex::default();
        assert!(index.query(&data, "").is_empty());
        assert!(index.query(&data, "   ").is_empty());
    }
}
