// src/session/mod.rs
//! One open handle to a storage file plus the key applied to it
//!
//! A session is either fully open (engine handle live, key applied) or
//! fully closed. Opening never proves the key: the first data-touching
//! call runs a probe and moves the trust state to `Verified` or
//! `KeyMismatchOrCorrupt`. Every later call is classified against that.

mod conn;
mod cursor;

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Params, Row};

use crate::config::{self, CipherSettings};
use crate::enums::KeyCheck;
use crate::error::{BackupError, CoreError, CorruptionKind, OpenError, Result, TransactionError};
use crate::key::KeyMaterial;

pub(crate) use conn::{classify, with_cipher_defaults};
pub use cursor::{Cursor, Prepared, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum TxState {
    #[default]
    Idle,
    Active {
        failed: bool,
    },
}

/// Failure bookkeeping, kept apart from the handle so cursors can update it
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) trust: KeyCheck,
    failure: Option<CorruptionKind>,
    pub(crate) tx: TxState,
    pub(crate) poisoned: bool,
}

impl SessionState {
    /// Classify an engine error and fold it into the session state
    pub(crate) fn record(&mut self, path: &Path, err: rusqlite::Error) -> CoreError {
        let err = classify(path, err);
        if let TxState::Active { failed } = &mut self.tx {
            *failed = true;
        }
        if let CoreError::KeyOrCorruption { kind, .. } = &err {
            tracing::warn!(path = %path.display(), %kind, "key mismatch or corruption");
            self.trust = KeyCheck::KeyMismatchOrCorrupt;
            self.failure = Some(*kind);
        } else {
            tracing::debug!(path = %path.display(), error = %err, "statement failed");
        }
        err
    }

    fn reset(&mut self) {
        *self = SessionState::default();
    }
}

pub struct Session {
    path: PathBuf,
    key: KeyMaterial,
    settings: CipherSettings,
    conn: Option<Connection>,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("key", &self.key)
            .field("open", &self.conn.is_some())
            .field("state", &self.state)
            .finish()
    }
}

impl Session {
    /// Open `path` under `key` with the process-wide cipher settings
    pub fn open(path: impl AsRef<Path>, key: KeyMaterial) -> Result<Self> {
        Self::open_with(path, key, &config::load().cipher)
    }

    /// Open `path` under `key`. Succeeds for a wrong key too; see [`Session::verify`].
    pub fn open_with(
        path: impl AsRef<Path>,
        key: KeyMaterial,
        settings: &CipherSettings,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_path(&path).map_err(|source| CoreError::Open {
            path: path.clone(),
            source,
        })?;

        let conn = conn::open_connection(&path, &key, settings).map_err(|source| {
            CoreError::Open {
                path: path.clone(),
                source,
            }
        })?;

        tracing::info!(
            path = %path.display(),
            encrypted = !key.is_plaintext(),
            "session opened"
        );

        Ok(Self {
            path,
            key,
            settings: settings.clone(),
            conn: Some(conn),
            state: SessionState::default(),
        })
    }

    /// Release the engine handle. Safe to call any number of times.
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.state.reset();
        tracing::info!(path = %self.path.display(), "session closed");
        // on failure the handle comes back to us and is dropped here
        conn.close().map_err(|(_, err)| CoreError::Execution(err))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn is_encrypted(&self) -> bool {
        !self.key.is_plaintext()
    }

    pub fn trust(&self) -> KeyCheck {
        self.state.trust
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.state.tx, TxState::Active { .. })
    }

    pub fn settings(&self) -> &CipherSettings {
        &self.settings
    }

    /// Run the first-touch probe if it has not run yet.
    ///
    /// A wrong key or corrupted file is reported as
    /// `Ok(KeyCheck::KeyMismatchOrCorrupt)`; `Err` is reserved for a
    /// closed session or an I/O failure unrelated to the key.
    pub fn verify(&mut self) -> Result<KeyCheck> {
        let conn = self.usable()?;
        if self.state.trust != KeyCheck::Unverified {
            return Ok(self.state.trust);
        }

        match conn::probe(conn, &self.path, &self.settings) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "key verified");
                self.state.trust = KeyCheck::Verified;
            }
            Err(CoreError::KeyOrCorruption { kind, .. }) => {
                tracing::warn!(path = %self.path.display(), %kind, "key check failed");
                self.state.trust = KeyCheck::KeyMismatchOrCorrupt;
                self.state.failure = Some(kind);
            }
            Err(other) => return Err(other),
        }
        Ok(self.state.trust)
    }

    /// Run a non-query statement with bound parameters
    pub fn execute<P: Params>(&mut self, sql: &str, params: P) -> Result<usize> {
        tracing::debug!(path = %self.path.display(), sql, "execute");
        let result = self.touch()?.execute(sql, params);
        self.settle(result)
    }

    /// Run a parameterless script (DDL, several statements)
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        tracing::debug!(path = %self.path.display(), sql, "execute batch");
        let result = self.touch()?.execute_batch(sql);
        self.settle(result)
    }

    /// Compile `sql` for repeated binding and stepping
    pub fn prepare(&mut self, sql: &str) -> Result<Prepared<'_>> {
        self.touch()?;
        let Session {
            path, conn, state, ..
        } = self;
        let conn = conn.as_ref().ok_or_else(|| CoreError::Closed { path: path.clone() })?;
        match conn.prepare(sql) {
            Ok(stmt) => Ok(Prepared::new(stmt, path.as_path(), state)),
            Err(err) => Err(state.record(path.as_path(), err)),
        }
    }

    /// Run a query and map every row eagerly
    pub fn query_map<T, P, F>(&mut self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.touch()?;
        let result: rusqlite::Result<Vec<T>> = conn.prepare(sql).and_then(|mut stmt| {
            let rows = stmt.query_map(params, f)?;
            rows.collect()
        });
        self.settle(result)
    }

    pub fn query_row<T, P, F>(&mut self, sql: &str, params: P, f: F) -> Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let result = self.touch()?.query_row(sql, params, f);
        self.settle(result)
    }

    pub fn last_insert_rowid(&self) -> Result<i64> {
        Ok(self.usable()?.last_insert_rowid())
    }

    /// Start a transaction. Nesting is refused.
    pub fn begin(&mut self) -> Result<()> {
        if self.in_transaction() {
            return Err(TransactionError::AlreadyActive.into());
        }
        let result = self.touch()?.execute_batch("BEGIN");
        self.settle(result)?;
        self.state.tx = TxState::Active { failed: false };
        Ok(())
    }

    /// Commit, unless a statement failed inside the transaction:
    /// then everything is rolled back and `StatementFailed` is returned.
    pub fn commit(&mut self) -> Result<()> {
        let failed = match self.state.tx {
            TxState::Idle => return Err(TransactionError::NotActive.into()),
            TxState::Active { failed } => failed,
        };

        if failed {
            self.end_with_rollback();
            return Err(TransactionError::StatementFailed.into());
        }

        let conn = self.usable()?;
        if conn.is_autocommit() {
            self.state.tx = TxState::Idle;
            return Err(TransactionError::StatementFailed.into());
        }

        match conn.execute_batch("COMMIT") {
            Ok(()) => {
                self.state.tx = TxState::Idle;
                Ok(())
            }
            Err(err) => {
                self.end_with_rollback();
                Err(TransactionError::Engine(err).into())
            }
        }
    }

    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction() {
            return Err(TransactionError::NotActive.into());
        }
        let conn = self.usable()?;
        let result = if conn.is_autocommit() {
            Ok(())
        } else {
            conn.execute_batch("ROLLBACK")
        };
        self.state.tx = TxState::Idle;
        result.map_err(|err| TransactionError::Engine(err).into())
    }

    /// Begin, run `f`, commit. Rolls back if `f` or the commit fails.
    pub fn with_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        self.begin()?;
        match f(&mut *self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if self.in_transaction() {
                    self.end_with_rollback();
                }
                Err(err)
            }
        }
    }

    // ───────────────────── crate-internal plumbing ─────────────────────

    pub(crate) fn key(&self) -> &KeyMaterial {
        &self.key
    }

    /// Verified handle, or the reason it cannot be used
    pub(crate) fn touch(&mut self) -> Result<&Connection> {
        if self.verify()? == KeyCheck::KeyMismatchOrCorrupt {
            return Err(CoreError::KeyOrCorruption {
                path: self.path.clone(),
                kind: self.state.failure.unwrap_or(CorruptionKind::Undecodable),
            });
        }
        self.usable()
    }

    /// Open handle without running the probe
    pub(crate) fn usable(&self) -> Result<&Connection> {
        if self.state.poisoned {
            return Err(BackupError::DestinationDiscarded(self.path.clone()).into());
        }
        self.conn.as_ref().ok_or_else(|| CoreError::Closed {
            path: self.path.clone(),
        })
    }

    /// Handle and state borrowed apart, for the backup destination
    pub(crate) fn parts_mut(&mut self) -> Result<(&mut Connection, &mut SessionState)> {
        self.usable()?;
        let Session {
            path, conn, state, ..
        } = self;
        let conn = conn.as_mut().ok_or_else(|| CoreError::Closed { path: path.clone() })?;
        Ok((conn, state))
    }

    /// Drop the current handle and open a fresh one under `key`.
    /// On failure the session is left closed and keeps its previous key.
    pub(crate) fn reopen(&mut self, key: KeyMaterial) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                tracing::warn!(path = %self.path.display(), error = %err, "close before reopen failed");
            }
        }
        self.state.reset();

        let conn = conn::open_connection(&self.path, &key, &self.settings).map_err(|source| {
            CoreError::Open {
                path: self.path.clone(),
                source,
            }
        })?;
        self.conn = Some(conn);
        self.key = key;
        Ok(())
    }

    fn settle<T>(&mut self, result: rusqlite::Result<T>) -> Result<T> {
        result.map_err(|err| self.state.record(&self.path, err))
    }

    fn end_with_rollback(&mut self) {
        if let Some(conn) = self.conn.as_ref() {
            if !conn.is_autocommit() {
                if let Err(err) = conn.execute_batch("ROLLBACK") {
                    tracing::warn!(path = %self.path.display(), error = %err, "rollback failed");
                }
            }
        }
        tracing::warn!(path = %self.path.display(), "transaction rolled back");
        self.state.tx = TxState::Idle;
    }
}

fn check_path(path: &Path) -> std::result::Result<(), OpenError> {
    let text = path.to_string_lossy();
    if text.is_empty() {
        return Err(OpenError::InvalidPath("empty path".into()));
    }
    if text.contains('\0') {
        return Err(OpenError::InvalidPath("path contains a NUL byte".into()));
    }
    if text == ":memory:" || text.starts_with("file:") {
        return Ok(());
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            Err(OpenError::MissingParent(parent.to_path_buf()))
        }
        _ => Ok(()),
    }
}
