//! FILENAME: persistence/src/lib.rs
//! Grid state persistence for the Tabula view pipeline.
//!
//! Serializes the pipeline's [`StateSnapshot`] projection (filters, sort and
//! group descriptors, expanded-group key list, pagination, search terms) to
//! JSON and restores it. Non-serializable parts of the live state (custom
//! predicates, comparators) are projections' known blind spot: they are
//! skipped on save and come back empty on load.

pub mod error;
pub mod state;

pub use error::StateError;
pub use state::{
    load_state, load_state_from_reader, save_state, save_state_to_writer,
};
