// src/config/mod.rs
//! Configuration system for cipher-session
//!
//! Lazy-loaded, read-only settings from TOML with built-in defaults.
//! Sessions still take their settings explicitly via `Session::open_with`.

pub use app::{load, BackupSettings, CipherSettings, Config, VerifySettings};

mod app;
mod defaults;
