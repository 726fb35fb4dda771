// tests/corruption_tests.rs
//! Damaged storage must surface as KeyOrCorruption on first read

use cipher_session::config::CipherSettings;
use cipher_session::error::CorruptionKind;
use cipher_session::{CoreError, KeyCheck, KeyMaterial, Session};

mod common;
mod support;
use support::{count_users, fast_settings, Fixture, ORIGINAL_KEY};

#[test]
fn trailing_bytes_on_encrypted_file() {
    common::setup();
    let fx = Fixture::new();
    let path = fx.seeded("users.db", ORIGINAL_KEY, 10);
    let clean_len = std::fs::metadata(&path).unwrap().len();

    support::append_bytes(&path, b"this does not belong to any page");

    let mut session = support::open_at(&path, ORIGINAL_KEY);
    let err = session
        .query_map("SELECT name FROM users", [], |r| r.get::<_, String>(0))
        .unwrap_err();

    match err {
        CoreError::KeyOrCorruption {
            kind: CorruptionKind::LengthMismatch { expected, actual },
            ..
        } => {
            assert_eq!(expected, clean_len);
            assert!(actual > expected);
        }
        other => panic!("expected trailing-bytes failure, got {other:?}"),
    }
    assert_eq!(session.trust(), KeyCheck::KeyMismatchOrCorrupt);
}

#[test]
fn trailing_bytes_on_plaintext_file() {
    let fx = Fixture::new();
    let path = fx.seeded("plain.db", "", 10);
    support::append_bytes(&path, &[0xEE; 512]);

    let mut session = support::open_at(&path, "");
    assert_eq!(session.verify().unwrap(), KeyCheck::KeyMismatchOrCorrupt);
    assert!(session.execute("DELETE FROM users", []).is_err());
}

#[test]
fn length_check_can_be_switched_off() {
    let fx = Fixture::new();
    let path = fx.seeded("users.db", ORIGINAL_KEY, 10);
    support::append_bytes(&path, &[0; 100]);

    let settings = CipherSettings {
        check_file_length: false,
        ..fast_settings()
    };
    let mut session =
        Session::open_with(&path, KeyMaterial::passphrase(ORIGINAL_KEY), &settings).unwrap();
    assert_eq!(count_users(&mut session), 10);
}

#[test]
fn damaged_first_page_is_undecodable() {
    let fx = Fixture::new();
    let path = fx.seeded("users.db", ORIGINAL_KEY, 10);
    support::scribble(&path, 1024, 64);

    let mut session = support::open_at(&path, ORIGINAL_KEY);
    let err = session.execute("DELETE FROM users", []).unwrap_err();
    assert!(matches!(
        err,
        CoreError::KeyOrCorruption {
            kind: CorruptionKind::Undecodable,
            ..
        }
    ));
}

#[test]
fn truncated_file_is_detected() {
    let fx = Fixture::new();
    let path = fx.seeded("users.db", ORIGINAL_KEY, 200);

    let data = std::fs::read(&path).unwrap();
    std::fs::write(&path, &data[..data.len() - 100]).unwrap();

    let mut session = support::open_at(&path, ORIGINAL_KEY);
    let result = session.query_map("SELECT * FROM users", [], |r| r.get::<_, i64>(0));
    assert!(result.unwrap_err().is_key_or_corruption());
}
