// src/config/defaults.rs
use crate::config::app::{BackupSettings, CipherSettings, VerifySettings};
use crate::consts::{
    CIPHER_HMAC_ALGORITHM, CIPHER_KDF_ALGORITHM, CIPHER_PAGE_SIZE, CIPHER_PLAINTEXT_HEADER_SIZE,
    DB_KDF_ITERATIONS, DEFAULT_BACKUP_PAGES_PER_STEP,
};

pub fn default_cipher() -> CipherSettings {
    CipherSettings {
        page_size: CIPHER_PAGE_SIZE,
        kdf_iter: DB_KDF_ITERATIONS,
        hmac_algorithm: CIPHER_HMAC_ALGORITHM.into(),
        kdf_algorithm: CIPHER_KDF_ALGORITHM.into(),
        plaintext_header_size: CIPHER_PLAINTEXT_HEADER_SIZE,
        check_file_length: true,
    }
}

pub fn default_backup() -> BackupSettings {
    BackupSettings {
        pages_per_step: DEFAULT_BACKUP_PAGES_PER_STEP,
    }
}

pub fn default_verify() -> VerifySettings {
    VerifySettings {
        compare_contents_after_convert: true,
    }
}
