//! FILENAME: persistence/src/state.rs
//! Snapshot save/load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use view_engine::definition::{StateSnapshot, SNAPSHOT_VERSION};

use crate::error::StateError;

/// Writes a snapshot as pretty-printed JSON.
pub fn save_state_to_writer<W: Write>(writer: W, snapshot: &StateSnapshot) -> Result<(), StateError> {
    serde_json::to_writer_pretty(writer, snapshot)?;
    Ok(())
}

/// Reads a snapshot, rejecting versions newer than this build understands.
pub fn load_state_from_reader<R: Read>(reader: R) -> Result<StateSnapshot, StateError> {
    let snapshot: StateSnapshot = serde_json::from_reader(reader)?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(StateError::UnsupportedVersion(snapshot.version));
    }
    Ok(snapshot)
}

pub fn save_state(path: &Path, snapshot: &StateSnapshot) -> Result<(), StateError> {
    let file = File::create(path)?;
    save_state_to_writer(BufWriter::new(file), snapshot)
}

pub fn load_state(path: &Path) -> Result<StateSnapshot, StateError> {
    let file = File::open(path)?;
    load_state_from_reader(BufReader::new(file))
}
