// src/rekey.rs
//! In-place key rotation for a live session
//!
//! The engine re-encrypts every page under the new key inside one
//! transaction. This module wraps that primitive with the checks around
//! it: the current key must have read something before we start, and
//! whatever happens the session ends up usable under exactly one key.

use crate::enums::KeyCheck;
use crate::error::{CoreError, CorruptionKind, RekeyError, Result};
use crate::key::KeyMaterial;
use crate::session::Session;

/// Replace the key of `session` with `new_key`, re-encrypting its storage.
///
/// On success the session is reopened under the new key and has already
/// passed a read. On failure it is reopened under the old key and
/// re-verified before control returns; if even that fails the error is
/// `RekeyError::Unrecoverable` and the session is closed.
pub fn rekey(session: &mut Session, new_key: KeyMaterial) -> Result<()> {
    if session.key().is_plaintext() || new_key.is_plaintext() {
        return Err(RekeyError::PlaintextUnsupported.into());
    }
    if session.in_transaction() {
        return Err(RekeyError::TransactionActive.into());
    }

    // A rekey under a wrong key would re-encrypt garbage
    if let Err(err) = session.touch() {
        return Err(RekeyError::NotVerified {
            source: Box::new(err),
        }
        .into());
    }

    let old_key = session.key().clone();
    tracing::info!(path = %session.path().display(), "rekey started");

    let outcome = session
        .usable()?
        .pragma_update(None, "rekey", new_key.engine_value());

    if let Err(err) = outcome {
        tracing::warn!(path = %session.path().display(), error = %err, "engine rejected rekey");
        restore(session, old_key)?;
        return Err(RekeyError::Restored { source: err }.into());
    }

    // Prove the new key persisted: fresh handle, one read
    let confirmed = session
        .reopen(new_key)
        .and_then(|()| session.verify())
        .map(|check| check == KeyCheck::Verified)
        .unwrap_or(false);

    if !confirmed {
        tracing::warn!(path = %session.path().display(), "new key did not verify after rekey");
        restore(session, old_key)?;
        return Err(RekeyError::NewKeyUnverified.into());
    }

    tracing::info!(path = %session.path().display(), "rekey complete");
    Ok(())
}

/// Reopen under `old_key` and require one successful read
fn restore(session: &mut Session, old_key: KeyMaterial) -> Result<()> {
    let verified = session.reopen(old_key).and_then(|()| session.verify());

    let failure = match verified {
        Ok(KeyCheck::Verified) => {
            tracing::info!(path = %session.path().display(), "restored under old key");
            return Ok(());
        }
        Ok(_) => CoreError::KeyOrCorruption {
            path: session.path().to_path_buf(),
            kind: CorruptionKind::Undecodable,
        },
        Err(err) => err,
    };

    tracing::error!(path = %session.path().display(), error = %failure, "old key no longer reads");
    // best effort: the handle is useless now
    let _ = session.close();
    Err(RekeyError::Unrecoverable {
        source: Box::new(failure),
    }
    .into())
}
