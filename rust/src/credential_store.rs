// The API key is sealed with AES-256-GCM under a key derived from a built-in
// pepper, the optional configured passphrase and a per-record salt. All of
// those live on this machine, so this is obfuscation at rest only: anyone who
// can read local_storage.json and this binary can recover the key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CredentialError;

pub const LOCAL_STORAGE_FILE: &str = "local_storage.json";
pub const STORAGE_KEY: &str = "z-image-api-key";

const RECORD_VERSION: u32 = 2;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const PEPPER: &[u8] = b"image-generator-ui/credential/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub version: u32,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
    pub updated_at: String,
}

pub struct CredentialStore {
    path: PathBuf,
    passphrase: String,
}

impl CredentialStore {
    pub fn new(path: PathBuf, passphrase: impl Into<String>) -> Self {
        Self {
            path,
            passphrase: passphrase.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// An empty key removes the record.
    pub fn store(&self, plaintext: &str) -> Result<(), CredentialError> {
        if plaintext.is_empty() {
            self.clear()?;
            return Ok(());
        }

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let cipher = build_cipher(&self.passphrase, &salt)
            .map_err(CredentialError::Storage)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|err| CredentialError::Storage(format!("failed to encrypt key: {err}")))?;

        let record = StoredCredential {
            version: RECORD_VERSION,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce),
            ciphertext: STANDARD.encode(&ciphertext),
            updated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        let record_value = serde_json::to_value(&record)
            .map_err(|err| CredentialError::Storage(format!("failed to encode record: {err}")))?;

        let mut entries = self.read_entries_for_write()?;
        entries.insert(STORAGE_KEY.to_string(), record_value);
        self.write_entries(&entries)
    }

    pub fn load(&self) -> Result<String, CredentialError> {
        if !self.path.exists() {
            return Ok(String::new());
        }

        let raw = fs::read_to_string(&self.path).map_err(|err| {
            CredentialError::Storage(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))
        })?;
        let entries: Map<String, Value> = serde_json::from_str(&raw)
            .map_err(|err| CredentialError::Decryption(format!("unreadable storage: {err}")))?;

        let Some(value) = entries.get(STORAGE_KEY) else {
            return Ok(String::new());
        };
        let record: StoredCredential = serde_json::from_value(value.clone())
            .map_err(|err| CredentialError::Decryption(format!("unreadable record: {err}")))?;

        decrypt_record(&record, &self.passphrase)
    }

    pub fn clear(&self) -> Result<bool, CredentialError> {
        if !self.path.exists() {
            return Ok(false);
        }

        let mut entries = self.read_entries_for_write()?;
        let removed = entries.remove(STORAGE_KEY).is_some();
        if removed {
            self.write_entries(&entries)?;
        }
        Ok(removed)
    }

    fn read_entries_for_write(&self) -> Result<Map<String, Value>, CredentialError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let raw = fs::read_to_string(&self.path).map_err(|err| {
            CredentialError::Storage(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))
        })?;
        match serde_json::from_str::<Map<String, Value>>(&raw) {
            Ok(entries) => Ok(entries),
            Err(_) => {
                let now_tag = Local::now().format("%Y%m%d_%H%M%S").to_string();
                let backup = self
                    .path
                    .with_file_name(format!("local_storage.broken.{now_tag}.json"));
                fs::rename(&self.path, &backup).map_err(|err| {
                    CredentialError::Storage(format!(
                        "failed to back up broken storage {}: {err}",
                        self.path.display()
                    ))
                })?;
                tracing::warn!(backup = %backup.display(), "local storage was unreadable and has been backed up");
                Ok(Map::new())
            }
        }
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                CredentialError::Storage(format!(
                    "failed to create {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let payload = serde_json::to_string_pretty(entries)
            .map_err(|err| CredentialError::Storage(format!("failed to serialize storage: {err}")))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, payload).map_err(|err| {
            CredentialError::Storage(format!(
                "failed to write temp storage {}: {err}",
                tmp_path.display()
            ))
        })?;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|err| {
                CredentialError::Storage(format!(
                    "failed to remove old storage {}: {err}",
                    self.path.display()
                ))
            })?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|err| {
            CredentialError::Storage(format!(
                "failed to replace storage {}: {err}",
                self.path.display()
            ))
        })
    }
}

fn decrypt_record(record: &StoredCredential, passphrase: &str) -> Result<String, CredentialError> {
    if record.version != RECORD_VERSION {
        return Err(CredentialError::Decryption(format!(
            "unsupported record version {}",
            record.version
        )));
    }

    let salt = hex::decode(&record.salt)
        .map_err(|err| CredentialError::Decryption(format!("invalid salt: {err}")))?;
    let nonce = hex::decode(&record.nonce)
        .map_err(|err| CredentialError::Decryption(format!("invalid nonce: {err}")))?;
    if nonce.len() != NONCE_LEN {
        return Err(CredentialError::Decryption(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }
    let ciphertext = STANDARD
        .decode(&record.ciphertext)
        .map_err(|err| CredentialError::Decryption(format!("invalid ciphertext: {err}")))?;

    let cipher = build_cipher(passphrase, &salt).map_err(CredentialError::Decryption)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| CredentialError::Decryption("integrity check failed".to_string()))?;
    String::from_utf8(plaintext)
        .map_err(|err| CredentialError::Decryption(format!("key is not UTF-8: {err}")))
}

fn build_cipher(passphrase: &str, salt: &[u8]) -> Result<Aes256Gcm, String> {
    Aes256Gcm::new_from_slice(&derive_key(passphrase, salt))
        .map_err(|err| format!("invalid cipher key: {err}"))
}

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(PEPPER);
    hasher.update([0u8]);
    hasher.update(passphrase.as_bytes());
    hasher.update([0u8]);
    hasher.update(salt);
    hasher.finalize().into()
}
