// src/lib.rs
//! cipher-session: key lifecycle for SQLCipher-encrypted SQLite storage
//!
//! Features:
//! - Sessions with lazy key verification (wrong key ≠ failed open)
//! - In-place rekey that always leaves exactly one valid key
//! - All-or-nothing plaintext ⇄ encrypted conversion
//! - Incremental backup into a session opened under its own key
//! - Table/row-count and content-digest comparison
//! - Full secure-gate v0.5 integration for key material

pub mod aliases;
pub mod backup;
pub mod config;
pub mod consts;
pub mod convert;
pub mod enums;
pub mod error;
pub mod key;
pub mod rekey;
pub mod session;
pub mod verify;

// Re-export everything users need at the crate root
pub use backup::{BackupJob, Progress};
pub use config::load as load_config;
pub use convert::{convert, convert_with};
pub use enums::{BackupStatus, Direction, KeyCheck, StepSize};
pub use error::{CoreError, Result};
pub use key::KeyMaterial;
pub use rekey::rekey;
pub use session::{Cursor, Prepared, Record, Session};
pub use verify::{compare, compare_contents, ComparisonReport, TableComparison};
