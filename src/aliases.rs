// src/aliases.rs
//! Re-exports secure-gate's ergonomic secret types
//!
//! These are the canonical secret containers used throughout cipher-session.

pub use secure_gate::{dynamic_alias, fixed_alias, SecureRandomExt};

// Fixed-size secrets
fixed_alias!(RawKey32, 32); // 256-bit SQLCipher raw key (bypasses the KDF)

// Dynamic secrets
dynamic_alias!(Passphrase, String); // Text handed to the engine KDF, or x'..' raw-key form
