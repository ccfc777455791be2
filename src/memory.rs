//! Encrypted persistence of the last external `.env` source the user copied
//! from.
//!
//! The record lives in a small key/value table. Only the path memory writes
//! to it, and the value is always stored encrypted.

use std::collections::HashMap;
use std::path::{
    Path,
    PathBuf,
};

use rusqlite::{
    Connection,
    OptionalExtension,
    params,
};

use crate::error::{
    ComposeError,
    ComposeResult,
};
use crate::manager::Cipher;

/// Logical key of the remembered path record.
pub const LAST_ENV_FILE_KEY: &str = "last_env_file_path";

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS user_data (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";

/// Backing key/value persistence.
pub trait KeyValueStore {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::StoreFailed`] if the store cannot be read.
    fn get(&self, key: &str) -> ComposeResult<Option<String>>;

    /// Inserts or replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::StoreFailed`] if the store cannot be written.
    fn upsert(&mut self, key: &str, value: &str) -> ComposeResult<()>;
}

/// [`KeyValueStore`] on a SQLite `user_data` table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::StoreFailed`] if the directory, database or
    /// schema cannot be created.
    pub fn open(path: &Path) -> ComposeResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ComposeError::StoreFailed(format!("create dir {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ComposeError::StoreFailed(format!("open {}: {}", path.display(), e)))?;
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::StoreFailed`] if SQLite cannot start.
    pub fn open_in_memory() -> ComposeResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ComposeError::StoreFailed(format!("open in-memory db: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> ComposeResult<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| ComposeError::StoreFailed(format!("apply schema: {}", e)))?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> ComposeResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM user_data WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| ComposeError::StoreFailed(format!("read {}: {}", key, e)))
    }

    fn upsert(&mut self, key: &str, value: &str) -> ComposeResult<()> {
        self.conn
            .execute(
                "INSERT INTO user_data (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(|e| ComposeError::StoreFailed(format!("write {}: {}", key, e)))?;
        Ok(())
    }
}

/// [`KeyValueStore`] held in a `HashMap`; nothing outlives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ComposeResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn upsert(&mut self, key: &str, value: &str) -> ComposeResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Result of asking for the remembered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RememberedPath {
    /// A path was stored and decrypted.
    Found(PathBuf),
    /// Nothing has been stored yet.
    NotSet,
    /// A record exists but could not be read or decrypted. Treated exactly
    /// like [`NotSet`](Self::NotSet) by callers.
    Unavailable(String),
}

impl RememberedPath {
    /// The path, if one was found.
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Self::Found(path) => Some(path),
            Self::NotSet | Self::Unavailable(_) => None,
        }
    }
}

/// Remembers the last external env source across runs.
pub trait PathMemoryStore {
    /// Stores `path` as the remembered source, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be encrypted or persisted.
    fn save(&mut self, path: &Path) -> ComposeResult<()>;

    /// Loads the remembered source. Never fails: unreadable records are
    /// reported as [`RememberedPath::Unavailable`].
    fn load(&self) -> RememberedPath;
}

/// [`PathMemoryStore`] that encrypts the path with a [`Cipher`] before
/// writing it to a [`KeyValueStore`].
///
/// # Examples
///
/// ```rust
/// use std::path::Path;
///
/// use envcompose::memory::{EncryptedPathMemory, MemoryStore, PathMemoryStore, RememberedPath};
/// use envcompose::SecretManager;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut memory = EncryptedPathMemory::new(MemoryStore::new(), SecretManager::generate());
/// assert_eq!(memory.load(), RememberedPath::NotSet);
/// memory.save(Path::new("/tmp/other/.env"))?;
/// assert_eq!(memory.load(), RememberedPath::Found("/tmp/other/.env".into()));
/// # Ok(())
/// # }
/// ```
pub struct EncryptedPathMemory<S, C> {
    store: S,
    cipher: C,
}

impl<S: KeyValueStore, C: Cipher> EncryptedPathMemory<S, C> {
    /// Combines a backing store with a cipher.
    pub fn new(store: S, cipher: C) -> Self {
        Self { store, cipher }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the memory, returning the backing store.
    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: KeyValueStore, C: Cipher> PathMemoryStore for EncryptedPathMemory<S, C> {
    fn save(&mut self, path: &Path) -> ComposeResult<()> {
        let sealed = self.cipher.encrypt(&path.to_string_lossy())?;
        self.store.upsert(LAST_ENV_FILE_KEY, &sealed)?;
        tracing::debug!("remembered env source saved");
        Ok(())
    }

    fn load(&self) -> RememberedPath {
        let sealed = match self.store.get(LAST_ENV_FILE_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => return RememberedPath::NotSet,
            Err(e) => return RememberedPath::Unavailable(e.to_string()),
        };
        match self.cipher.decrypt(&sealed) {
            Ok(path) => RememberedPath::Found(PathBuf::from(path)),
            Err(e) => {
                tracing::debug!(error = %e, "remembered env source unreadable");
                RememberedPath::Unavailable(e.to_string())
            }
        }
    }
}

impl<T: PathMemoryStore + ?Sized> PathMemoryStore for Box<T> {
    fn save(&mut self, path: &Path) -> ComposeResult<()> {
        (**self).save(path)
    }

    fn load(&self) -> RememberedPath {
        (**self).load()
    }
}

impl<T: PathMemoryStore + ?Sized> PathMemoryStore for &mut T {
    fn save(&mut self, path: &Path) -> ComposeResult<()> {
        (**self).save(path)
    }

    fn load(&self) -> RememberedPath {
        (**self).load()
    }
}
