//! File-level operations on one project's `.env` / `.env.example` pair.

use std::path::{
    Path,
    PathBuf,
};

use tracing::{
    debug,
    info,
};

use crate::error::{
    ComposeError,
    ComposeResult,
};
use crate::fetch::ExampleFetcher;
use crate::paths::EnvPaths;
use crate::snapshot::{
    EnvSnapshot,
    extract_required,
    missing_keys,
};
use crate::writer;

/// How `.env.example` came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleOrigin {
    /// The template shipped it.
    Template,
    /// It was downloaded from the fallback URL.
    Fetched,
}

/// A project root and the env files inside it.
///
/// Every read goes to disk; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct ProjectEnv {
    paths: EnvPaths,
}

impl ProjectEnv {
    /// Wraps the project at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            paths: EnvPaths::for_project(root),
        }
    }

    /// The project's env file paths.
    pub fn paths(&self) -> &EnvPaths {
        &self.paths
    }

    /// The working `.env` path.
    pub fn env_path(&self) -> &Path {
        &self.paths.env_path
    }

    /// Makes sure `.env.example` exists, downloading it from `fallback_url`
    /// when the template did not ship one.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::NotFound`] when the file is absent and no URL
    /// is configured, [`ComposeError::FetchFailed`] when the download fails
    /// or is empty, or a write error.
    pub fn ensure_example_exists(
        &self,
        fallback_url: Option<&str>,
        fetcher: &dyn ExampleFetcher,
    ) -> ComposeResult<ExampleOrigin> {
        let example = &self.paths.example_env_path;
        if example.is_file() {
            return Ok(ExampleOrigin::Template);
        }
        let url = fallback_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ComposeError::NotFound {
                path: example.display().to_string(),
            })?;

        info!(url = %url, "fetching .env.example");
        let content = fetcher.fetch(url)?;
        if content.trim().is_empty() {
            return Err(ComposeError::FetchFailed {
                url: url.to_string(),
                reason: "empty response body".to_string(),
            });
        }
        writer::write_atomic(example, &content)?;
        info!(path = %example.display(), ".env.example fetched and saved");
        Ok(ExampleOrigin::Fetched)
    }

    /// Makes sure `.env` exists, seeding it byte-for-byte from
    /// `.env.example`. Returns `true` if the file was created.
    ///
    /// # Errors
    ///
    /// Returns an error if `.env.example` cannot be read or `.env` cannot be
    /// written.
    pub fn ensure_env_exists(&self) -> ComposeResult<bool> {
        if self.paths.env_path.is_file() {
            return Ok(false);
        }
        let content = writer::read_env_file(&self.paths.example_env_path)?;
        writer::write_atomic(&self.paths.env_path, &content)?;
        debug!(path = %self.paths.env_path.display(), ".env created from .env.example");
        Ok(true)
    }

    /// Keys declared by `.env.example`, in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if `.env.example` cannot be read.
    pub fn required_keys(&self) -> ComposeResult<Vec<String>> {
        let content = writer::read_env_file(&self.paths.example_env_path)?;
        Ok(extract_required(&content))
    }

    /// A fresh snapshot of `.env`.
    ///
    /// # Errors
    ///
    /// Returns an error if `.env` cannot be read.
    pub fn snapshot(&self) -> ComposeResult<EnvSnapshot> {
        let content = writer::read_env_file(&self.paths.env_path)?;
        Ok(EnvSnapshot::parse(&content))
    }

    /// Required keys that `.env` leaves absent or empty, read from disk now.
    ///
    /// # Errors
    ///
    /// Returns an error if `.env` cannot be read.
    pub fn missing_keys(&self, required: &[String]) -> ComposeResult<Vec<String>> {
        Ok(missing_keys(required, &self.snapshot()?))
    }

    /// Overwrites `.env` with the source file (or `<dir>/.env`). Returns the
    /// file that was copied.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::NotFound`] if the source does not exist, or a
    /// read/write error.
    pub fn copy_from(&self, source: &Path) -> ComposeResult<PathBuf> {
        let used = writer::copy_env_file(source, &self.paths.env_path)?;
        debug!(source = %used.display(), "copied env source over .env");
        Ok(used)
    }

    /// Sets one key in `.env`.
    ///
    /// # Errors
    ///
    /// Returns an error if `.env` is missing or cannot be rewritten.
    pub fn set_value(&self, key: &str, value: &str) -> ComposeResult<()> {
        writer::upsert(&self.paths.env_path, key, value)
    }
}
