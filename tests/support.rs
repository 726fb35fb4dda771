// tests/support.rs
//! Test fixtures: temp directories, fast cipher settings, a seeded users table

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use cipher_session::config::CipherSettings;
use cipher_session::{KeyMaterial, Session};
use rusqlite::params;
use tempfile::{tempdir, TempDir};

#[allow(dead_code)]
pub const ORIGINAL_KEY: &str = "123456789";
#[allow(dead_code)]
pub const WRONG_KEY: &str = "WrongPassword123";
#[allow(dead_code)]
pub const NEW_KEY: &str = "MyNewSuperSecretKey456";

pub const CREATE_USERS: &str = "CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT,
    age INTEGER
)";

/// Default cipher parameters with a cheap KDF so tests stay quick
pub fn fast_settings() -> CipherSettings {
    CipherSettings {
        kdf_iter: 4_000,
        ..CipherSettings::default()
    }
}

/// One temp directory per test; removed on drop
pub struct Fixture {
    dir: TempDir,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Open `name` with `key` (empty = plaintext) under fast settings
    pub fn open(&self, name: &str, key: &str) -> Session {
        open_at(&self.path(name), key)
    }

    /// Fresh database with the users table and `rows` rows, closed again
    pub fn seeded(&self, name: &str, key: &str, rows: usize) -> PathBuf {
        let path = self.path(name);
        let mut session = open_at(&path, key);
        session.execute_batch(CREATE_USERS).expect("create users");
        insert_users(&mut session, rows);
        session.close().expect("close seeded session");
        path
    }

    /// File names currently in the fixture directory
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .expect("read fixture dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn open_at(path: &Path, key: &str) -> Session {
    Session::open_with(path, KeyMaterial::passphrase(key), &fast_settings()).expect("open session")
}

pub fn insert_users(session: &mut Session, rows: usize) {
    session
        .with_transaction(|s| {
            for i in 0..rows {
                s.execute(
                    "INSERT INTO users (name, email, age) VALUES (?1, ?2, ?3)",
                    params![
                        format!("user{i}"),
                        format!("user{i}@example.com"),
                        20 + (i % 50) as i64
                    ],
                )?;
            }
            Ok(())
        })
        .expect("insert users");
}

#[allow(dead_code)]
pub fn count_users(session: &mut Session) -> i64 {
    session
        .query_row("SELECT count(*) FROM users", [], |r| r.get(0))
        .expect("count users")
}

/// Append garbage after the last page
#[allow(dead_code)]
pub fn append_bytes(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("open for append");
    file.write_all(bytes).expect("append bytes");
}

/// Flip `len` bytes starting at `offset`
#[allow(dead_code)]
pub fn scribble(path: &Path, offset: usize, len: usize) {
    let mut data = fs::read(path).expect("read db file");
    for b in &mut data[offset..offset + len] {
        *b ^= 0x5A;
    }
    fs::write(path, data).expect("write db file");
}
