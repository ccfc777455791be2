//! Encryption of values kept in the path memory store.
//!
//! [`Cipher`] is the capability the store depends on; [`SecretManager`] is
//! the age/X25519 implementation the CLI uses. Key management beyond
//! loading, generating and saving one identity is out of scope.

use std::io::{
    Read,
    Write,
};
use std::path::Path;

use age::secrecy::ExposeSecret;
use age::x25519;
use base64::Engine as _;

use crate::config;
use crate::error::{
    ComposeError,
    ComposeResult,
};

const ENCRYPTED_PREFIX: &str = "ENC[AGE:b64:";

/// Symmetric-use encryption capability injected into the path memory.
pub trait Cipher {
    /// Encrypts `plaintext` into a printable string.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::EncryptionFailed`] if encryption fails.
    fn encrypt(&self, plaintext: &str) -> ComposeResult<String>;

    /// Reverses [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::DecryptionFailed`] for foreign, corrupted or
    /// unencrypted input.
    fn decrypt(&self, ciphertext: &str) -> ComposeResult<String>;
}

/// Encrypts and decrypts values with a single age X25519 identity.
///
/// Encrypted values use the compact form `ENC[AGE:b64:...]`.
///
/// # Examples
///
/// ```rust
/// use envcompose::{Cipher, SecretManager};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = SecretManager::generate();
/// let sealed = manager.encrypt("/home/me/other/.env")?;
/// assert!(SecretManager::is_encrypted(&sealed));
/// assert_eq!(manager.decrypt(&sealed)?, "/home/me/other/.env");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SecretManager {
    identity: x25519::Identity,
}

impl SecretManager {
    /// Loads the identity from standard locations.
    ///
    /// # Key Loading Order
    ///
    /// 1. `ENVCOMPOSE_AGE_KEY` environment variable (full identity string)
    /// 2. `AGE_KEY` environment variable
    /// 3. Key file at [`config::key_path`]
    ///
    /// # Errors
    ///
    /// Returns an error if no key can be found or if the key is invalid.
    pub fn load() -> ComposeResult<Self> {
        if let Ok(data) = std::env::var("ENVCOMPOSE_AGE_KEY")
            && !data.trim().is_empty()
        {
            return Self::from_key_string(&data);
        }
        if let Ok(data) = std::env::var("AGE_KEY")
            && !data.trim().is_empty()
        {
            return Self::from_key_string(&data);
        }
        let key_path = config::key_path();
        if key_path.exists() {
            return Self::load_from_file(&key_path);
        }
        Err(ComposeError::KeyLoadFailed(format!(
            "no key found (ENVCOMPOSE_AGE_KEY, AGE_KEY, or {})",
            key_path.display()
        )))
    }

    /// Loads the identity, or generates one and saves it to
    /// [`config::key_path`] when none exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing key is invalid or a new key cannot be
    /// saved.
    pub fn load_or_generate() -> ComposeResult<Self> {
        match Self::load() {
            Ok(manager) => Ok(manager),
            Err(ComposeError::KeyLoadFailed(_)) if !config::key_path().exists() => {
                let manager = Self::generate();
                let path = config::key_path();
                manager.save_key(&path)?;
                tracing::debug!(path = %path.display(), "generated path memory key");
                Ok(manager)
            }
            Err(e) => Err(e),
        }
    }

    /// Generates a new random identity.
    pub fn generate() -> Self {
        Self {
            identity: x25519::Identity::generate(),
        }
    }

    /// Parses an `AGE-SECRET-KEY-1...` identity string.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::KeyLoadFailed`] if the string is not a valid
    /// identity.
    pub fn from_key_string(data: &str) -> ComposeResult<Self> {
        let identity = data
            .trim()
            .parse::<x25519::Identity>()
            .map_err(|e| ComposeError::KeyLoadFailed(format!("parse key: {}", e)))?;
        Ok(Self { identity })
    }

    fn load_from_file(path: &Path) -> ComposeResult<Self> {
        let key_data = std::fs::read_to_string(path)
            .map_err(|e| ComposeError::KeyLoadFailed(format!("read {}: {}", path.display(), e)))?;
        Self::from_key_string(&key_data)
    }

    /// The public recipient string (starts with `age1`).
    pub fn public_key_string(&self) -> String {
        self.identity.to_public().to_string()
    }

    /// Returns `true` if `value` is in the compact encrypted form.
    pub fn is_encrypted(value: &str) -> bool {
        value.trim().starts_with(ENCRYPTED_PREFIX)
    }

    /// Saves the private identity with owner-only permissions on Unix.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save_key(&self, path: impl AsRef<Path>) -> ComposeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ComposeError::KeySaveFailed(format!("create dir {}: {}", parent.display(), e))
            })?;
        }
        let identity_string = self.identity.to_string().expose_secret().to_string();
        std::fs::write(path, identity_string.as_bytes())
            .map_err(|e| ComposeError::KeySaveFailed(format!("write {}: {}", path.display(), e)))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)
                .map_err(|e| {
                    ComposeError::KeySaveFailed(format!("metadata {}: {}", path.display(), e))
                })?
                .permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms).map_err(|e| {
                ComposeError::KeySaveFailed(format!("chmod {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}

impl Cipher for SecretManager {
    fn encrypt(&self, plaintext: &str) -> ComposeResult<String> {
        let recipient = self.identity.to_public();
        let recipients: Vec<&dyn age::Recipient> = vec![&recipient];
        let encryptor = age::Encryptor::with_recipients(recipients.into_iter())
            .map_err(|e: age::EncryptError| ComposeError::EncryptionFailed(e.to_string()))?;

        let mut encrypted = Vec::new();
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e: std::io::Error| ComposeError::EncryptionFailed(e.to_string()))?;
        writer
            .write_all(plaintext.as_bytes())
            .map_err(|e: std::io::Error| ComposeError::EncryptionFailed(e.to_string()))?;
        writer
            .finish()
            .map_err(|e: std::io::Error| ComposeError::EncryptionFailed(e.to_string()))?;

        let b64 = base64::engine::general_purpose::STANDARD.encode(&encrypted);
        Ok(format!("{}{}]", ENCRYPTED_PREFIX, b64))
    }

    fn decrypt(&self, ciphertext: &str) -> ComposeResult<String> {
        let inner = ciphertext
            .trim()
            .strip_prefix(ENCRYPTED_PREFIX)
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| ComposeError::DecryptionFailed("value is not encrypted".to_string()))?;

        let encrypted = base64::engine::general_purpose::STANDARD
            .decode(inner)
            .map_err(|e| ComposeError::DecryptionFailed(format!("invalid base64: {}", e)))?;

        let decryptor = age::Decryptor::new(&encrypted[..])
            .map_err(|e: age::DecryptError| ComposeError::DecryptionFailed(e.to_string()))?;
        let identities: Vec<&dyn age::Identity> = vec![&self.identity];
        let mut reader = decryptor
            .decrypt(identities.into_iter())
            .map_err(|e: age::DecryptError| ComposeError::DecryptionFailed(e.to_string()))?;

        let mut decrypted = Vec::new();
        reader
            .read_to_end(&mut decrypted)
            .map_err(|e: std::io::Error| ComposeError::DecryptionFailed(e.to_string()))?;
        String::from_utf8(decrypted).map_err(|e| ComposeError::DecryptionFailed(e.to_string()))
    }
}
