//! Canonical locations of a project's environment files.

use std::path::{
    Path,
    PathBuf,
};

/// File name of the template's declared keys.
pub const EXAMPLE_ENV_FILE: &str = ".env.example";

/// File name of the working environment file.
pub const ENV_FILE: &str = ".env";

/// Directory under `.config/` that holds bundle-specific env files.
pub const DEFAULT_BUNDLE_DIR: &str = "mrse";

/// The `.env.example` and `.env` paths for one project root.
///
/// Construction only joins paths onto the absolute root; nothing touches the
/// filesystem.
///
/// # Examples
///
/// ```rust
/// use std::path::Path;
///
/// use envcompose::EnvPaths;
///
/// let paths = EnvPaths::for_project("/work/app");
/// assert_eq!(paths.env_path, Path::new("/work/app/.env"));
/// assert_eq!(paths.example_env_path, Path::new("/work/app/.env.example"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvPaths {
    /// The project root the other paths are relative to.
    pub project_root: PathBuf,
    /// `{root}/.env.example`
    pub example_env_path: PathBuf,
    /// `{root}/.env`
    pub env_path: PathBuf,
}

impl EnvPaths {
    /// Computes the env file paths for `root`. A relative root is made
    /// absolute against the current directory, so `.` still has a name.
    pub fn for_project(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let project_root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            example_env_path: project_root.join(EXAMPLE_ENV_FILE),
            env_path: project_root.join(ENV_FILE),
            project_root,
        }
    }

    /// Path of the bundle-specific env file,
    /// `{root}/.config/{bundle_dir}/{project-name}.env`.
    ///
    /// Returns `None` when the root has no final path component to use as
    /// the project name.
    pub fn bundle_env_path(&self, bundle_dir: &str) -> Option<PathBuf> {
        let name = self.project_root.file_name()?.to_string_lossy();
        Some(
            self.project_root
                .join(".config")
                .join(bundle_dir)
                .join(format!("{}.env", name)),
        )
    }
}
