#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]
#![warn(clippy::missing_safety_doc)]
#![doc = include_str!("../README.md")]

pub mod catalog;
pub mod compose;
pub mod config;
pub mod error;
pub mod fetch;
pub mod generate;
pub mod manager;
pub mod memory;
pub mod paths;
pub mod project;
pub mod prompt;
pub mod snapshot;
pub mod validate;
pub mod writer;

pub use crate::catalog::{
    Catalog,
    DefaultValue,
    KeySpec,
    KeyType,
    ServiceDefinition,
};
pub use crate::compose::{
    ComposeOptions,
    ComposeOutcome,
    Composer,
    ReconcileState,
};
pub use crate::error::{
    ComposeError,
    ComposeResult,
};
pub use crate::fetch::{
    ExampleFetcher,
    HttpFetcher,
};
pub use crate::generate::generate_secure_value;
pub use crate::manager::{
    Cipher,
    SecretManager,
};
pub use crate::memory::{
    EncryptedPathMemory,
    PathMemoryStore,
    RememberedPath,
    SqliteStore,
};
pub use crate::paths::EnvPaths;
pub use crate::project::ProjectEnv;
pub use crate::prompt::{
    Prompter,
    TerminalPrompter,
};
pub use crate::snapshot::{
    EnvSnapshot,
    extract_required,
    missing_keys,
};
pub use crate::validate::validate;
