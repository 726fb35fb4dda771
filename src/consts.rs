// src/consts.rs
//! Shared constants: security parameters and defaults

/// Recommended KDF iterations for SQLCipher databases (2025+)
// ~0.1-0.2s per open on modern hardware
pub const DB_KDF_ITERATIONS: u32 = 256_000;

/// SQLCipher 4 page size
pub const CIPHER_PAGE_SIZE: u32 = 4096;

pub const CIPHER_HMAC_ALGORITHM: &str = "HMAC_SHA512";

pub const CIPHER_KDF_ALGORITHM: &str = "PBKDF2_HMAC_SHA512";

pub const CIPHER_PLAINTEXT_HEADER_SIZE: u32 = 0;

/// Pages copied per backup step unless configured otherwise
pub const DEFAULT_BACKUP_PAGES_PER_STEP: u32 = 64;

/// Length of a raw (pre-derived) SQLCipher key in bytes
pub const RAW_KEY_LEN: usize = 32;

/// Schema name the conversion engine attaches its source under
pub const CONVERSION_SOURCE_SCHEMA: &str = "conversion_source";

/// Env var naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "CIPHER_SESSION_CONFIG";

pub const DEFAULT_CONFIG_FILE: &str = "cipher-session.toml";
