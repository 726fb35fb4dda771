// src/enums.rs
//! Public enum types used throughout the crate
//!
//! Central location for the small #[derive(...)] enums that describe
//! session trust, conversion direction and backup progress.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Trust state of the key applied to a session.
///
/// Applying a key proves nothing; the state only moves off `Unverified`
/// once the first read of stored content succeeds or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KeyCheck {
    #[default]
    Unverified,
    Verified,
    KeyMismatchOrCorrupt,
}

/// Direction of a conversion between plaintext and encrypted storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// plaintext source → keyed destination
    Encrypt,
    /// keyed source → plaintext destination
    Decrypt,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encrypt => f.write_str("encrypt"),
            Direction::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Pages copied per backup step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSize {
    Pages(NonZeroU32),
    Unlimited,
}

impl StepSize {
    /// Value handed to the engine's step primitive (-1 copies everything)
    pub(crate) fn as_engine_pages(self) -> i32 {
        match self {
            StepSize::Pages(n) => i32::try_from(n.get()).unwrap_or(i32::MAX),
            StepSize::Unlimited => -1,
        }
    }
}

impl From<u32> for StepSize {
    /// Zero means "no limit"
    fn from(pages: u32) -> Self {
        NonZeroU32::new(pages).map_or(StepSize::Unlimited, StepSize::Pages)
    }
}

/// Whether a backup step left work to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStatus {
    More,
    Done,
}
