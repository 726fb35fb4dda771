// src/key.rs
//! Caller-supplied key material
//!
//! The engine derives the actual cipher key; this layer only carries the
//! secret to it. Two keys are never compared byte-for-byte here; whether
//! a key is right is decided by the engine on the first page read.

use std::fmt;

use crate::aliases::{Passphrase, RawKey32, SecureRandomExt};
use crate::consts::RAW_KEY_LEN;

/// Secret used to open one storage file. Empty means plaintext mode.
pub struct KeyMaterial {
    secret: Option<Passphrase>,
}

impl KeyMaterial {
    /// Passphrase run through the engine KDF. An empty passphrase is plaintext mode.
    pub fn passphrase(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::plaintext();
        }
        Self {
            secret: Some(Passphrase::new(text)),
        }
    }

    /// 256-bit key handed to the engine in its raw-key form (no KDF)
    pub fn raw(bytes: &[u8; RAW_KEY_LEN]) -> Self {
        Self {
            secret: Some(Passphrase::new(format!("x'{}'", hex::encode_upper(bytes)))),
        }
    }

    /// Fresh random raw key
    pub fn generate() -> Self {
        let key = RawKey32::random();
        Self::raw(key.expose_secret())
    }

    pub fn plaintext() -> Self {
        Self { secret: None }
    }

    /// Opaque bytes: UTF-8 is a passphrase, otherwise exactly 32 bytes are a raw key.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        match String::from_utf8(bytes) {
            Ok(text) => Some(Self::passphrase(text)),
            Err(err) => {
                let raw: [u8; RAW_KEY_LEN] = err.into_bytes().try_into().ok()?;
                Some(Self::raw(&raw))
            }
        }
    }

    pub fn is_plaintext(&self) -> bool {
        self.secret.is_none()
    }

    /// Value for `PRAGMA key`, `PRAGMA rekey` and `ATTACH ... KEY`.
    /// Empty string for plaintext, which the engine reads as "no cipher".
    pub(crate) fn engine_value(&self) -> &str {
        self.secret
            .as_ref()
            .map_or("", |secret| secret.expose_secret().as_str())
    }
}

impl Clone for KeyMaterial {
    fn clone(&self) -> Self {
        Self {
            secret: self
                .secret
                .as_ref()
                .map(|secret| Passphrase::new(secret.expose_secret().clone())),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_plaintext() {
            f.write_str("KeyMaterial(plaintext)")
        } else {
            f.write_str("KeyMaterial(<redacted>)")
        }
    }
}
