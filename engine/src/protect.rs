//! Password-protected roster files.
//!
//! A roster holds every account's signing credential, so it can be kept on
//! disk encrypted:
//! 1. Argon2id derives a 32-byte key from the password and a random salt
//! 2. AES-256-GCM encrypts the roster JSON with a random nonce
//! 3. The envelope is stored as JSON, KDF parameters included
//!
//! Decryption always uses the parameters recorded in the envelope.

use std::path::Path;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::EngineError;

const VERSION: u32 = 1;
const CIPHER: &str = "aes-256-gcm";
const KDF: &str = "argon2id";
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// KiB.
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, 1 lane.
    fn default() -> Self {
        Self {
            memory: 65536,
            iterations: 3,
            parallelism: 1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtectedFile {
    pub version: u32,
    pub cipher: String,
    pub kdf: String,
    pub kdf_params: KdfParams,
    /// Hex.
    pub salt: String,
    /// Hex.
    pub nonce: String,
    /// Hex.
    pub ciphertext: String,
}

fn store_err(context: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::Store(format!("{context}: {e}"))
}

pub fn encrypt(plaintext: &[u8], password: &str) -> Result<ProtectedFile, EngineError> {
    encrypt_with_params(plaintext, password, KdfParams::default())
}

pub fn encrypt_with_params(
    plaintext: &[u8],
    password: &str,
    params: KdfParams,
) -> Result<ProtectedFile, EngineError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| store_err("AES key init failed", e))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| store_err("encryption failed", e))?;

    Ok(ProtectedFile {
        version: VERSION,
        cipher: CIPHER.to_string(),
        kdf: KDF.to_string(),
        kdf_params: params,
        salt: hex::encode(salt),
        nonce: hex::encode(nonce),
        ciphertext: hex::encode(ciphertext),
    })
}

pub fn decrypt(file: &ProtectedFile, password: &str) -> Result<Zeroizing<Vec<u8>>, EngineError> {
    if file.version != VERSION {
        return Err(EngineError::Store(format!(
            "unsupported file version: {}",
            file.version
        )));
    }
    if file.cipher != CIPHER || file.kdf != KDF {
        return Err(EngineError::Store(format!(
            "unsupported scheme: {} / {}",
            file.cipher, file.kdf
        )));
    }

    let salt = hex::decode(&file.salt).map_err(|e| store_err("invalid salt hex", e))?;
    let nonce = hex::decode(&file.nonce).map_err(|e| store_err("invalid nonce hex", e))?;
    let ciphertext = hex::decode(&file.ciphertext)
        .map_err(|e| store_err("invalid ciphertext hex", e))?;
    if nonce.len() != NONCE_LEN {
        return Err(EngineError::Store(format!(
            "invalid nonce length: expected {}, got {}",
            NONCE_LEN,
            nonce.len()
        )));
    }

    let key = derive_key(password, &salt, file.kdf_params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| store_err("AES key init failed", e))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| EngineError::Store("decryption failed: wrong password or corrupted file".into()))?;
    Ok(Zeroizing::new(plaintext))
}

pub fn save(file: &ProtectedFile, path: &Path) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(file)
        .map_err(|e| store_err("JSON serialization failed", e))?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load(path: &Path) -> Result<ProtectedFile, EngineError> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| store_err("invalid protected file", e))
}

/// Whether `bytes` look like a [`ProtectedFile`] rather than a plain roster.
pub fn is_protected(bytes: &[u8]) -> bool {
    serde_json::from_slice::<ProtectedFile>(bytes).is_ok()
}

fn derive_key(password: &str, salt: &[u8], params: KdfParams) -> Result<Zeroizing<[u8; KEY_LEN]>, EngineError> {
    let params = Params::new(params.memory, params.iterations, params.parallelism, Some(KEY_LEN))
        .map_err(|e| store_err("Argon2 params error", e))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| store_err("Argon2 hashing failed", e))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Argon2 minimums; the default parameters are too slow for unit tests.
    const LIGHT: KdfParams = KdfParams {
        memory: 8,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let file = encrypt_with_params(b"{\"Scholars\":[]}", "hunter2", LIGHT).unwrap();
        let plain = decrypt(&file, "hunter2").unwrap();
        assert_eq!(plain.as_slice(), b"{\"Scholars\":[]}");
    }

    #[test]
    fn wrong_password_fails() {
        let file = encrypt_with_params(b"secret", "right", LIGHT).unwrap();
        assert!(matches!(decrypt(&file, "wrong"), Err(EngineError::Store(_))));
    }

    #[test]
    fn envelope_fields() {
        let file = encrypt_with_params(b"x", "p", LIGHT).unwrap();
        assert_eq!(file.version, 1);
        assert_eq!(file.cipher, "aes-256-gcm");
        assert_eq!(file.kdf, "argon2id");
        assert_eq!(file.kdf_params, LIGHT);
        assert_eq!(file.salt.len(), SALT_LEN * 2);
        assert_eq!(file.nonce.len(), NONCE_LEN * 2);
    }

    #[test]
    fn salts_differ_between_encryptions() {
        let a = encrypt_with_params(b"same", "p", LIGHT).unwrap();
        let b = encrypt_with_params(b"same", "p", LIGHT).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut file = encrypt_with_params(b"payload", "p", LIGHT).unwrap();
        let mut bytes = hex::decode(&file.ciphertext).unwrap();
        bytes[0] ^= 0xff;
        file.ciphertext = hex::encode(bytes);
        assert!(decrypt(&file, "p").is_err());
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut file = encrypt_with_params(b"x", "p", LIGHT).unwrap();
        file.version = 2;
        assert!(decrypt(&file, "p").is_err());
    }

    #[test]
    fn save_load_and_detect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.enc.json");
        let file = encrypt_with_params(b"roster", "p", LIGHT).unwrap();
        save(&file, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(is_protected(&bytes));
        assert!(!is_protected(b"{\"AcademyPayoutAddress\":\"\"}"));

        let loaded = load(&path).unwrap();
        assert_eq!(decrypt(&loaded, "p").unwrap().as_slice(), b"roster");
    }
}
