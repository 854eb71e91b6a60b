//! FILENAME: view-engine/src/lib.rs
//! View pipeline for the Tabula data grid.
//!
//! This crate turns a raw in-memory dataset into the small set of rows a
//! renderer actually materializes, and keeps that result correct under
//! high-frequency interactive mutation (every keystroke, every scroll tick).
//! It depends on `engine` only for shared types (RowValue, DataSet,
//! ColumnMeta).
//!
//! Layers:
//! - `definition`: Serializable configuration (what the view IS)
//! - `filter`, `search`, `sort`, `group`, `paginate`, `virtual_scroll`:
//!   the stage engines (HOW we compute)
//! - `view`: Renderable output for the frontend (WHAT we display)
//! - `pipeline`: Orchestration, events, and the recompute scheduler

pub mod definition;
pub mod filter;
pub mod group;
pub mod paginate;
pub mod pipeline;
pub mod scheduler;
pub mod search;
pub mod sort;
pub mod view;
pub mod virtual_scroll;

pub use definition::*;
pub use group::ExpandState;
pub use pipeline::{GridEvent, ViewPipeline};
pub use scheduler::{Generation, Scheduler};
pub use search::SearchIndex;
pub use view::*;
