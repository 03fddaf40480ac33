//! Durable token storage.
//!
//! The access and refresh tokens are written and cleared together; a store
//! never holds one without the other.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use evalboard_types::TokenPair;
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const KEY_SALT: &[u8] = b"evalboard-auth-v1";
const NONCE_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt token file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt token file: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("token file could not be decrypted")]
    Crypto,
}

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>, StorageError>;
    fn save(&self, tokens: &TokenPair) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

#[derive(Serialize, Deserialize)]
struct SealedTokens {
    nonce: String,
    ciphertext: String,
}

/// Owner-only file holding `access_token` and `refresh_token`, sealed with
/// XChaCha20-Poly1305 under a key derived from the machine id.
pub struct FileTokenStore {
    path: PathBuf,
    key: [u8; 32],
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            key: derive_key(&machine_id()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(&self.key.into())
    }

    fn write_sealed(&self, plaintext: &[u8]) -> Result<(), StorageError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher()
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| StorageError::Crypto)?;
        let sealed = SealedTokens {
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        };

        // Write-then-rename so readers never see half a pair.
        let tmpPath = self.path.with_extension("json.tmp");
        write_private(&tmpPath, serde_json::to_string_pretty(&sealed)?.as_bytes())?;
        std::fs::rename(&tmpPath, &self.path)?;
        Ok(())
    }

    fn read_sealed(&self) -> Result<Vec<u8>, StorageError> {
        let contents = std::fs::read_to_string(&self.path)?;
        let sealed: SealedTokens = serde_json::from_str(&contents)?;
        let nonce = STANDARD.decode(sealed.nonce)?;
        if nonce.len() != NONCE_LEN {
            return Err(StorageError::Crypto);
        }
        let ciphertext = STANDARD.decode(sealed.ciphertext)?;
        self.cipher()
            .decrypt(XNonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| StorageError::Crypto)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let value: serde_json::Value = serde_json::from_slice(&self.read_sealed()?)?;
        let accessToken = value.get(ACCESS_TOKEN_KEY).and_then(|v| v.as_str());
        let refreshToken = value.get(REFRESH_TOKEN_KEY).and_then(|v| v.as_str());
        match (accessToken, refreshToken) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair {
                access_token: access.to_string(),
                refresh_token: refresh.to_string(),
            })),
            _ => Ok(None),
        }
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        self.write_sealed(&serde_json::to_vec(tokens)?)
    }

    fn clear(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

fn derive_key(machineId: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(machineId.as_bytes());
    hasher.update(KEY_SALT);
    let digest = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

#[cfg(target_os = "linux")]
fn machine_id() -> String {
    std::fs::read_to_string("/etc/machine-id")
        .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "linux-default-id".to_string())
}

#[cfg(not(target_os = "linux"))]
fn machine_id() -> String {
    "evalboard-default-id".to_string()
}

fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Process-local store, used when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        Ok(self.tokens.lock().clone())
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        *self.tokens.lock() = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.tokens.lock() = None;
        Ok(())
    }
}
