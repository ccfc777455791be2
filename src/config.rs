//! Process-wide locations and tunables.
//!
//! Everything here is resolved from environment variables at call time so
//! tests can redirect state into a temporary directory.

use std::path::PathBuf;
use std::time::Duration;

/// Timeout applied to the fallback `.env.example` request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

const APP_DIR: &str = "envcompose";

/// Directory holding the path memory database and the age key.
///
/// Resolved in this order:
/// 1. `$ENVCOMPOSE_STATE_DIR`
/// 2. `$XDG_STATE_HOME/envcompose`
/// 3. the platform state directory (`dirs::state_dir()`) + `envcompose`
/// 4. `~/.local/state/envcompose`
/// 5. `./.envcompose`
pub fn state_dir() -> PathBuf {
    if let Ok(p) = std::env::var("ENVCOMPOSE_STATE_DIR")
        && !p.is_empty()
    {
        return PathBuf::from(p);
    }
    if let Ok(p) = std::env::var("XDG_STATE_HOME")
        && !p.is_empty()
    {
        return PathBuf::from(p).join(APP_DIR);
    }
    if let Some(dir) = dirs::state_dir() {
        return dir.join(APP_DIR);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".local/state").join(APP_DIR);
    }
    PathBuf::from(".").join(format!(".{}", APP_DIR))
}

/// SQLite file backing the path memory.
pub fn store_path() -> PathBuf {
    state_dir().join("memory.db")
}

/// Age identity used to encrypt the remembered path.
pub fn key_path() -> PathBuf {
    state_dir().join("envcompose.key")
}

/// Fetch timeout, overridable with `ENVCOMPOSE_FETCH_TIMEOUT_SECS`.
pub fn fetch_timeout() -> Duration {
    std::env::var("ENVCOMPOSE_FETCH_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_FETCH_TIMEOUT)
}
