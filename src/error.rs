// src/error.rs
//! Public error type for the entire crate
//!
//! Every failure is returned to the immediate caller as a typed value.
//! None of these messages ever carries key material.

use std::path::PathBuf;

use thiserror::Error;

use crate::enums::Direction;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("cannot open database at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: OpenError,
    },

    #[error("wrong key or corrupted database at {} ({kind})", path.display())]
    KeyOrCorruption { path: PathBuf, kind: CorruptionKind },

    #[error("parameter binding failed: {0}")]
    Bind(#[source] rusqlite::Error),

    #[error("statement failed: {0}")]
    Execution(#[source] rusqlite::Error),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("rekey failed: {0}")]
    Rekey(#[from] RekeyError),

    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("backup failed: {0}")]
    Backup(#[from] BackupError),

    #[error("session for {} is closed", path.display())]
    Closed { path: PathBuf },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// True when the failure means "this key cannot read this storage".
    pub fn is_key_or_corruption(&self) -> bool {
        match self {
            CoreError::KeyOrCorruption { .. } => true,
            CoreError::Rekey(RekeyError::NotVerified { source }) => source.is_key_or_corruption(),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum OpenError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("parent directory {} does not exist", .0.display())]
    MissingParent(PathBuf),

    #[error("engine refused the storage: {0}")]
    Engine(#[source] rusqlite::Error),

    #[error("could not apply key or cipher settings: {0}")]
    KeySetup(#[source] rusqlite::Error),
}

/// How a key/corruption failure was recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionKind {
    /// The engine could not decode a page that must exist
    Undecodable,
    /// File length disagrees with the page count recorded in the header
    LengthMismatch { expected: u64, actual: u64 },
}

impl std::fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorruptionKind::Undecodable => f.write_str("page could not be decoded"),
            CorruptionKind::LengthMismatch { expected, actual } => {
                write!(f, "file is {actual} bytes, header accounts for {expected}")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("a transaction is already active; nesting is not supported")]
    AlreadyActive,

    #[error("no transaction is active")]
    NotActive,

    #[error("a statement failed inside the transaction; it has been rolled back")]
    StatementFailed,

    #[error("the engine ended the transaction: {0}")]
    Engine(#[source] rusqlite::Error),
}

#[derive(Error, Debug)]
pub enum RekeyError {
    #[error("current key was not verified: {source}")]
    NotVerified {
        #[source]
        source: Box<CoreError>,
    },

    #[error("rekey only changes between encrypted keys; use conversion for plaintext")]
    PlaintextUnsupported,

    #[error("cannot rekey inside an active transaction")]
    TransactionActive,

    #[error("engine rejected the rekey, database restored under the old key: {source}")]
    Restored {
        #[source]
        source: rusqlite::Error,
    },

    #[error("new key did not verify after rekey, database restored under the old key")]
    NewKeyUnverified,

    #[error("rekey failed and the old key could not be re-verified: {source}")]
    Unrecoverable {
        #[source]
        source: Box<CoreError>,
    },
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("{direction} conversion requires {requirement}")]
    DirectionMismatch {
        direction: Direction,
        requirement: &'static str,
    },

    #[error("destination {} already exists", .0.display())]
    DestinationExists(PathBuf),

    #[error("source session is unusable: {source}")]
    Source {
        #[source]
        source: Box<CoreError>,
    },

    #[error("destination session could not be prepared: {source}")]
    Destination {
        #[source]
        source: Box<CoreError>,
    },

    #[error("attach of source failed: {0}")]
    Attach(#[source] rusqlite::Error),

    #[error("bulk export failed: {0}")]
    Export(#[source] rusqlite::Error),

    #[error("detach of source failed: {0}")]
    Detach(#[source] rusqlite::Error),

    #[error("exported content differs from source: {0}")]
    Mismatch(String),

    #[error("could not move converted database into place: {0}")]
    Persist(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("backup could not start: {0}")]
    Init(#[source] rusqlite::Error),

    #[error("backup step failed: {0}")]
    Step(#[source] rusqlite::Error),

    #[error("backup step found the source busy")]
    Busy,

    #[error("backup step found the source locked")]
    Locked,

    #[error("{} was the destination of a failed backup and must be discarded", .0.display())]
    DestinationDiscarded(PathBuf),

    #[error("{role} session is unusable: {source}")]
    Session {
        role: &'static str,
        #[source]
        source: Box<CoreError>,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}
