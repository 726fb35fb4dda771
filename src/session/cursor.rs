// src/session/cursor.rs
//! Prepared statements and forward-only cursors over a session

use std::path::Path;

use rusqlite::types::{FromSql, Value, ValueRef};
use rusqlite::{Params, Rows, Statement};

use super::SessionState;
use crate::error::{CoreError, Result};

/// One result row, detached from the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Record(Vec<Value>);

impl Record {
    pub fn get<T: FromSql>(&self, idx: usize) -> Result<T> {
        let value = self.0.get(idx).ok_or_else(|| {
            CoreError::Execution(rusqlite::Error::InvalidColumnIndex(idx))
        })?;
        T::column_result(ValueRef::from(value)).map_err(|e| {
            CoreError::Execution(rusqlite::Error::FromSqlConversionFailure(
                idx,
                value.data_type(),
                Box::new(e),
            ))
        })
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A compiled statement bound to its session.
/// Each `query` call binds fresh parameters and starts a new cursor.
pub struct Prepared<'s> {
    stmt: Statement<'s>,
    path: &'s Path,
    state: &'s mut SessionState,
}

impl<'s> Prepared<'s> {
    pub(crate) fn new(stmt: Statement<'s>, path: &'s Path, state: &'s mut SessionState) -> Self {
        Self { stmt, path, state }
    }

    /// Bind `params` and open a forward-only cursor
    pub fn query<P: Params>(&mut self, params: P) -> Result<Cursor<'_>> {
        let columns = self.stmt.column_count();
        let Prepared { stmt, path, state } = self;
        match stmt.query(params) {
            Ok(rows) => Ok(Cursor {
                rows,
                columns,
                path: *path,
                state: &mut **state,
                finished: false,
            }),
            Err(err) => Err(state.record(*path, err)),
        }
    }

    /// Bind `params` and run to completion, returning rows changed
    pub fn execute<P: Params>(&mut self, params: P) -> Result<usize> {
        match self.stmt.execute(params) {
            Ok(changed) => Ok(changed),
            Err(err) => Err(self.state.record(self.path, err)),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }
}

/// Forward-only, not restartable. Stops for good after the first error.
pub struct Cursor<'c> {
    rows: Rows<'c>,
    columns: usize,
    path: &'c Path,
    state: &'c mut SessionState,
    finished: bool,
}

impl Iterator for Cursor<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let columns = self.columns;
        let step = match self.rows.next() {
            Ok(Some(row)) => (0..columns)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map(|values| Some(Record(values))),
            Ok(None) => Ok(None),
            Err(err) => Err(err),
        };

        match step {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(self.state.record(self.path, err)))
            }
        }
    }
}
