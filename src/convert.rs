// src/convert.rs
//! Plaintext ⇄ encrypted conversion as one logical unit
//!
//! The destination is assembled at a temporary sibling path: attach the
//! source, bulk-export every schema object and row, detach, compare. Only
//! then is the file renamed into place. Any failure drops the temporary
//! file, so a half-exported destination is never visible.

use std::path::Path;

use tempfile::TempPath;

use crate::config::{self, CipherSettings};
use crate::consts::CONVERSION_SOURCE_SCHEMA;
use crate::enums::{Direction, KeyCheck};
use crate::error::{ConversionError, CoreError, CorruptionKind, Result};
use crate::key::KeyMaterial;
use crate::session::{with_cipher_defaults, Session};
use crate::verify;

/// Copy all of `source` into a new database at `destination_path`,
/// keyed with `destination_key` (plaintext when empty).
pub fn convert(
    source: &mut Session,
    destination_path: impl AsRef<Path>,
    destination_key: KeyMaterial,
    direction: Direction,
) -> Result<Session> {
    let settings = source.settings().clone();
    convert_with(source, destination_path, destination_key, direction, &settings)
}

/// [`convert`] with explicit cipher settings for the destination
pub fn convert_with(
    source: &mut Session,
    destination_path: impl AsRef<Path>,
    destination_key: KeyMaterial,
    direction: Direction,
    settings: &CipherSettings,
) -> Result<Session> {
    let destination_path = destination_path.as_ref();
    check_direction(source, &destination_key, direction)?;

    if destination_path.exists() {
        return Err(ConversionError::DestinationExists(destination_path.to_path_buf()).into());
    }

    if let Err(err) = source.touch() {
        return Err(ConversionError::Source {
            source: Box::new(err),
        }
        .into());
    }

    tracing::info!(
        source = %source.path().display(),
        destination = %destination_path.display(),
        %direction,
        "conversion started"
    );

    let staging = staging_path(destination_path)?;
    let mut staged = Session::open_with(&staging, destination_key.clone(), settings)
        .map_err(destination_error)?;

    if let Err(err) = populate(source, &mut staged) {
        // the TempPath removes the half-built file once the handle is gone
        let _ = staged.close();
        tracing::warn!(destination = %destination_path.display(), error = %err, "conversion aborted");
        return Err(err);
    }

    staged.close()?;
    staging
        .persist_noclobber(destination_path)
        .map_err(|e| ConversionError::Persist(e.error))?;

    match open_verified(destination_path, destination_key, settings) {
        Ok(session) => {
            tracing::info!(destination = %destination_path.display(), "conversion complete");
            Ok(session)
        }
        Err(err) => {
            let _ = std::fs::remove_file(destination_path);
            Err(err)
        }
    }
}

fn check_direction(
    source: &Session,
    destination_key: &KeyMaterial,
    direction: Direction,
) -> Result<()> {
    let requirement = match direction {
        Direction::Encrypt if source.is_encrypted() || destination_key.is_plaintext() => {
            Some("a plaintext source and a keyed destination")
        }
        Direction::Decrypt if !source.is_encrypted() || !destination_key.is_plaintext() => {
            Some("a keyed source and a plaintext destination")
        }
        _ => None,
    };

    match requirement {
        Some(requirement) => Err(ConversionError::DirectionMismatch {
            direction,
            requirement,
        }
        .into()),
        None => Ok(()),
    }
}

fn staging_path(destination: &Path) -> Result<TempPath> {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file = tempfile::Builder::new()
        .prefix(".cipher-session-convert-")
        .suffix(".db")
        .tempfile_in(parent)
        .map_err(|e| destination_error(CoreError::Io(e)))?;
    Ok(file.into_temp_path())
}

/// attach → export → detach → compare, on the staged destination handle
fn populate(source: &mut Session, staged: &mut Session) -> Result<()> {
    staged.touch().map_err(destination_error)?;

    let conn = staged.usable()?;
    let attach = format!("ATTACH DATABASE ?1 AS {CONVERSION_SOURCE_SCHEMA} KEY ?2");
    let source_path = source.path().to_string_lossy().into_owned();
    let attach_source = || {
        conn.execute(
            &attach,
            rusqlite::params![source_path, source.key().engine_value()],
        )
    };

    let attached = if source.is_encrypted() {
        with_cipher_defaults(conn, source.settings(), attach_source).and_then(|r| r)
    } else {
        attach_source()
    };
    attached.map_err(ConversionError::Attach)?;

    let exported = conn.query_row(
        "SELECT sqlcipher_export('main', ?1)",
        [CONVERSION_SOURCE_SCHEMA],
        |_| Ok(()),
    );

    let detached = conn.execute_batch(&format!("DETACH DATABASE {CONVERSION_SOURCE_SCHEMA}"));

    exported.map_err(ConversionError::Export)?;
    detached.map_err(ConversionError::Detach)?;

    let report = if config::load().verify.compare_contents_after_convert {
        verify::compare_contents(source, staged)?
    } else {
        verify::compare(source, staged)?
    };
    if !report.equal {
        return Err(ConversionError::Mismatch(report.summary()).into());
    }

    Ok(())
}

fn open_verified(path: &Path, key: KeyMaterial, settings: &CipherSettings) -> Result<Session> {
    let mut session = Session::open_with(path, key, settings)?;
    match session.verify()? {
        KeyCheck::Verified => Ok(session),
        _ => Err(CoreError::KeyOrCorruption {
            path: path.to_path_buf(),
            kind: CorruptionKind::Undecodable,
        }),
    }
}

fn destination_error(err: CoreError) -> CoreError {
    ConversionError::Destination {
        source: Box::new(err),
    }
    .into()
}
