// src/session/conn.rs
//! Engine handle setup and the first-read key probe

use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension};

use crate::config::CipherSettings;
use crate::error::{CoreError, CorruptionKind, OpenError};
use crate::key::KeyMaterial;

/// Open the storage and apply the key. Nothing is read here: the engine
/// only decodes the header on first access, so a wrong key still "opens".
pub(crate) fn open_connection(
    path: &Path,
    key: &KeyMaterial,
    settings: &CipherSettings,
) -> Result<Connection, OpenError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    let conn = Connection::open_with_flags(path, flags).map_err(OpenError::Engine)?;

    if key.is_plaintext() {
        return Ok(conn);
    }

    // PRAGMA key must precede every other statement
    conn.pragma_update(None, "key", key.engine_value())
        .map_err(OpenError::KeySetup)?;
    apply_cipher_settings(&conn, settings).map_err(OpenError::KeySetup)?;

    Ok(conn)
}

/// Pragma names for one set of cipher parameters
struct CipherPragmas {
    page_size: &'static str,
    kdf_iter: &'static str,
    hmac_algorithm: &'static str,
    kdf_algorithm: &'static str,
    plaintext_header_size: &'static str,
}

impl CipherPragmas {
    fn all(&self) -> [&'static str; 5] {
        [
            self.page_size,
            self.kdf_iter,
            self.hmac_algorithm,
            self.kdf_algorithm,
            self.plaintext_header_size,
        ]
    }
}

const SESSION_PRAGMAS: CipherPragmas = CipherPragmas {
    page_size: "cipher_page_size",
    kdf_iter: "kdf_iter",
    hmac_algorithm: "cipher_hmac_algorithm",
    kdf_algorithm: "cipher_kdf_algorithm",
    plaintext_header_size: "cipher_plaintext_header_size",
};

const DEFAULT_PRAGMAS: CipherPragmas = CipherPragmas {
    page_size: "cipher_default_page_size",
    kdf_iter: "cipher_default_kdf_iter",
    hmac_algorithm: "cipher_default_hmac_algorithm",
    kdf_algorithm: "cipher_default_kdf_algorithm",
    plaintext_header_size: "cipher_default_plaintext_header_size",
};

/// Cipher parameters for `main`; must run after the key, before any read
pub(crate) fn apply_cipher_settings(
    conn: &Connection,
    settings: &CipherSettings,
) -> rusqlite::Result<()> {
    set_cipher_pragmas(conn, &SESSION_PRAGMAS, settings)
}

/// Serializes every change to the process-wide `cipher_default_*` values
static CIPHER_DEFAULTS: Mutex<()> = Mutex::new(());

/// Run `f` with the process-wide cipher defaults set to `settings`.
///
/// `ATTACH ... KEY` reads the attached schema immediately, so an attached
/// file only decodes if these defaults match it. The previous defaults are
/// put back before the lock is released.
pub(crate) fn with_cipher_defaults<T>(
    conn: &Connection,
    settings: &CipherSettings,
    f: impl FnOnce() -> T,
) -> rusqlite::Result<T> {
    let _guard = CIPHER_DEFAULTS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let previous = read_cipher_pragmas(conn, &DEFAULT_PRAGMAS)?;
    let out = set_cipher_pragmas(conn, &DEFAULT_PRAGMAS, settings).map(|()| f());

    // restored even when only some of the new values took
    for (name, value) in previous {
        if let Err(err) = conn.pragma_update(None, name, &value) {
            tracing::warn!(pragma = name, error = %err, "could not restore cipher default");
        }
    }
    out
}

fn read_cipher_pragmas(
    conn: &Connection,
    names: &CipherPragmas,
) -> rusqlite::Result<Vec<(&'static str, Value)>> {
    let mut values = Vec::with_capacity(5);
    for name in names.all() {
        let value = conn
            .pragma_query_value(None, name, |r| r.get::<_, Value>(0))
            .optional()?;
        if let Some(value) = value {
            values.push((name, value));
        }
    }
    Ok(values)
}

fn set_cipher_pragmas(
    conn: &Connection,
    names: &CipherPragmas,
    settings: &CipherSettings,
) -> rusqlite::Result<()> {
    conn.pragma_update(None, names.page_size, settings.page_size)?;
    conn.pragma_update(None, names.kdf_iter, settings.kdf_iter)?;
    conn.pragma_update(None, names.hmac_algorithm, &settings.hmac_algorithm)?;
    conn.pragma_update(None, names.kdf_algorithm, &settings.kdf_algorithm)?;
    conn.pragma_update(
        None,
        names.plaintext_header_size,
        settings.plaintext_header_size,
    )?;
    Ok(())
}

/// Map an engine failure onto the crate taxonomy.
///
/// Undecodable pages mean a wrong key or a damaged file; parameter
/// problems are binding errors; anything else is an ordinary SQL failure.
pub(crate) fn classify(path: &Path, err: rusqlite::Error) -> CoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) =>
        {
            CoreError::KeyOrCorruption {
                path: path.to_path_buf(),
                kind: CorruptionKind::Undecodable,
            }
        }
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ParameterOutOfRange => {
            CoreError::Bind(err)
        }
        rusqlite::Error::InvalidParameterCount(..)
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::ToSqlConversionFailure(_) => CoreError::Bind(err),
        _ => CoreError::Execution(err),
    }
}

/// First touch: read the catalog, then check the file is exactly as long
/// as the header says. Trailing bytes are not caught by the engine itself.
pub(crate) fn probe(
    conn: &Connection,
    path: &Path,
    settings: &CipherSettings,
) -> Result<(), CoreError> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |r| {
        r.get::<_, i64>(0)
    })
    .map_err(|e| classify(path, e))?;

    if !settings.check_file_length {
        return Ok(());
    }

    // in-memory and URI storage have no plain file to measure
    let Ok(meta) = fs::metadata(path) else {
        return Ok(());
    };
    let actual = meta.len();
    if actual == 0 {
        return Ok(());
    }

    let journal_mode: String = conn
        .pragma_query_value(None, "journal_mode", |r| r.get(0))
        .map_err(|e| classify(path, e))?;
    if journal_mode.eq_ignore_ascii_case("wal") {
        return Ok(());
    }

    let page_count = pragma_int(conn, path, "page_count")?;
    let page_size = pragma_int(conn, path, "page_size")?;

    let expected = u64::try_from(page_count.saturating_mul(page_size)).unwrap_or(0);
    if expected != actual {
        return Err(CoreError::KeyOrCorruption {
            path: path.to_path_buf(),
            kind: CorruptionKind::LengthMismatch { expected, actual },
        });
    }

    Ok(())
}

/// Integer pragma that SQLCipher may answer as TEXT (`page_size` on a keyed
/// handle comes back as a `cipher_page_size` string)
fn pragma_int(conn: &Connection, path: &Path, name: &str) -> Result<i64, CoreError> {
    let value: Value = conn
        .pragma_query_value(None, name, |r| r.get(0))
        .map_err(|e| classify(path, e))?;
    match value {
        Value::Integer(n) => Ok(n),
        Value::Text(ref text) => text.trim().parse().map_err(|_| {
            CoreError::Execution(rusqlite::Error::InvalidColumnType(
                0,
                name.to_owned(),
                Type::Text,
            ))
        }),
        other => Err(CoreError::Execution(rusqlite::Error::InvalidColumnType(
            0,
            name.to_owned(),
            other.data_type(),
        ))),
    }
}
