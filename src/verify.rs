// src/verify.rs
//! Structural comparison of two sessions
//!
//! `compare` is a coarse check: same user tables, same row counts.
//! `compare_contents` adds an order-independent BLAKE3 digest per table,
//! which catches changed values as well as missing rows.

use blake3::Hasher;
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::Row;
use serde::Serialize;

use crate::error::Result;
use crate::session::Session;

const LIST_USER_TABLES: &str = r"
    SELECT name FROM sqlite_master
    WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
    ORDER BY name
";

const TABLE_EXISTS: &str = "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableComparison {
    pub name: String,
    pub rows_a: u64,
    /// `None` when the table is missing from `b`
    pub rows_b: Option<u64>,
    /// Only filled in by `compare_contents`
    pub digest_a: Option<String>,
    pub digest_b: Option<String>,
}

impl TableComparison {
    pub fn is_equal(&self) -> bool {
        self.rows_b == Some(self.rows_a) && self.digest_a == self.digest_b
    }
}

/// Result of one comparison; built fresh per call, never persisted
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub tables: Vec<TableComparison>,
    /// Tables present only in `b` (informational, does not affect `equal`)
    pub only_in_b: Vec<String>,
    pub divergences: Vec<String>,
    pub equal: bool,
    pub compared_at: DateTime<Utc>,
}

impl ComparisonReport {
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    pub fn table(&self, name: &str) -> Option<&TableComparison> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn summary(&self) -> String {
        if self.equal {
            format!("{} table(s) match", self.tables.len())
        } else {
            self.divergences.join("; ")
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Compare user tables of `a` against `b` by name and row count
pub fn compare(a: &mut Session, b: &mut Session) -> Result<ComparisonReport> {
    compare_inner(a, b, false)
}

/// Like [`compare`], plus a digest of every row's values
pub fn compare_contents(a: &mut Session, b: &mut Session) -> Result<ComparisonReport> {
    compare_inner(a, b, true)
}

pub fn list_user_tables(session: &mut Session) -> Result<Vec<String>> {
    session.query_map(LIST_USER_TABLES, [], |r| r.get(0))
}

pub fn count_rows(session: &mut Session, table: &str) -> Result<u64> {
    let sql = format!("SELECT count(*) FROM {}", quote_ident(table));
    let count: i64 = session.query_row(&sql, [], |r| r.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Hex BLAKE3 over the sorted hashes of every row, so row order is irrelevant
pub fn table_digest(session: &mut Session, table: &str) -> Result<String> {
    let sql = format!("SELECT * FROM {}", quote_ident(table));
    let mut row_hashes = session.query_map(&sql, [], hash_row)?;
    row_hashes.sort_unstable();

    let mut hasher = Hasher::new();
    for hash in &row_hashes {
        hasher.update(hash);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn compare_inner(a: &mut Session, b: &mut Session, contents: bool) -> Result<ComparisonReport> {
    let names_a = list_user_tables(a)?;
    let mut tables = Vec::with_capacity(names_a.len());
    let mut divergences = Vec::new();

    for name in &names_a {
        let rows_a = count_rows(a, name)?;
        let exists: i64 = b.query_row(TABLE_EXISTS, [name], |r| r.get(0))?;

        let mut entry = TableComparison {
            name: name.clone(),
            rows_a,
            rows_b: None,
            digest_a: None,
            digest_b: None,
        };

        if exists == 0 {
            divergences.push(format!("table {name} missing from second database"));
            tables.push(entry);
            continue;
        }

        let rows_b = count_rows(b, name)?;
        entry.rows_b = Some(rows_b);
        if rows_a != rows_b {
            divergences.push(format!("table {name} row count {rows_a} vs {rows_b}"));
        } else if contents {
            let digest_a = table_digest(a, name)?;
            let digest_b = table_digest(b, name)?;
            if digest_a != digest_b {
                divergences.push(format!("table {name} row contents differ"));
            }
            entry.digest_a = Some(digest_a);
            entry.digest_b = Some(digest_b);
        }
        tables.push(entry);
    }

    let only_in_b = list_user_tables(b)?
        .into_iter()
        .filter(|name| !names_a.contains(name))
        .collect();

    let report = ComparisonReport {
        equal: divergences.is_empty(),
        tables,
        only_in_b,
        divergences,
        compared_at: Utc::now(),
    };

    tracing::debug!(
        a = %a.path().display(),
        b = %b.path().display(),
        equal = report.equal,
        "compared sessions"
    );
    Ok(report)
}

fn hash_row(row: &Row<'_>) -> rusqlite::Result<[u8; 32]> {
    let mut hasher = Hasher::new();
    for idx in 0..row.as_ref().column_count() {
        match row.get_ref(idx)? {
            ValueRef::Null => {
                hasher.update(&[0]);
            }
            ValueRef::Integer(v) => {
                hasher.update(&[1]);
                hasher.update(&v.to_le_bytes());
            }
            ValueRef::Real(v) => {
                hasher.update(&[2]);
                hasher.update(&v.to_bits().to_le_bytes());
            }
            ValueRef::Text(bytes) => {
                hasher.update(&[3]);
                hasher.update(&(bytes.len() as u64).to_le_bytes());
                hasher.update(bytes);
            }
            ValueRef::Blob(bytes) => {
                hasher.update(&[4]);
                hasher.update(&(bytes.len() as u64).to_le_bytes());
                hasher.update(bytes);
            }
        }
    }
    Ok(*hasher.finalize().as_bytes())
}

/// Double-quoted SQL identifier; table names cannot be bound as parameters
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::quote_ident;

    #[test]
    fn identifiers_are_quoted_and_escaped() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
