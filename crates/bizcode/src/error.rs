//! Setup errors.
//!
//! Formatting itself never fails. Only building the pieces around it
//! (opening the registry file, spawning the worker, loading a status
//! table) can.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Registry directory could not be created.
    #[error("cannot create registry directory {path}: {source}")]
    RegistryDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Registry file could not be opened or created.
    #[error("cannot open registry file {path}: {source}")]
    RegistryFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Status table file could not be read.
    #[error("cannot read status table {path}: {source}")]
    StatusFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Status table is not valid JSON.
    #[error("invalid status table: {0}")]
    StatusTable(#[from] serde_json::Error),

    /// Registry worker thread could not be spawned.
    #[error("cannot spawn registry worker: {0}")]
    Spawn(#[source] io::Error),

    /// The process-wide formatter was already set up.
    #[error("global formatter already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, Error>;
