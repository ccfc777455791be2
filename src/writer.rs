//! Writing env files: single-key upserts, whole-file copies and atomic
//! replacement.
//!
//! Lines the writer does not target are returned byte-for-byte, including
//! comments, blank lines and `\r` terminators.

use std::io::Write;
use std::path::{
    Path,
    PathBuf,
};

use crate::error::{
    ComposeError,
    ComposeResult,
};
use crate::paths::ENV_FILE;
use crate::snapshot::{
    line_key,
    split_lines,
};

/// Sets `key` to `value` in env file content.
///
/// The last line assigning `key` is replaced by `KEY="value"` and earlier
/// assignments of the same key are removed, so the reader's last-wins rule
/// and the writer agree. If no line assigns `key`, one line is appended. The
/// result always ends with exactly one newline.
///
/// # Examples
///
/// ```rust
/// use envcompose::writer::upsert_content;
///
/// let out = upsert_content("# keep\nA=1\n", "B", "two");
/// assert_eq!(out, "# keep\nA=1\nB=\"two\"\n");
/// assert_eq!(upsert_content(&out, "B", "two"), out);
/// ```
pub fn upsert_content(content: &str, key: &str, value: &str) -> String {
    let mut lines = split_lines(content);
    let new_line = format!("{}=\"{}\"", key, value);

    let matches: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line_key(line) == Some(key))
        .map(|(i, _)| i)
        .collect();

    match matches.split_last() {
        Some((&last, earlier)) => {
            lines[last] = new_line;
            for &i in earlier.iter().rev() {
                lines.remove(i);
            }
        }
        None => lines.push(new_line),
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Sets `key` to `value` in the env file at `path`.
///
/// # Errors
///
/// Returns [`ComposeError::NotFound`] if the file does not exist, or a
/// read/write error if the file cannot be accessed.
pub fn upsert(path: &Path, key: &str, value: &str) -> ComposeResult<()> {
    let content = read_env_file(path)?;
    write_atomic(path, &upsert_content(&content, key, value))
}

/// Reads an env file, mapping a missing file to [`ComposeError::NotFound`].
///
/// # Errors
///
/// Returns an error if the file is missing or unreadable.
pub fn read_env_file(path: &Path) -> ComposeResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ComposeError::NotFound {
                path: path.display().to_string(),
            }
        } else {
            ComposeError::EnvFileReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        }
    })
}

/// Replaces the file at `path` with `content` via a temporary file in the
/// same directory, so readers never see a half-written file.
///
/// # Errors
///
/// Returns [`ComposeError::EnvFileWriteFailed`] if the temporary file cannot
/// be created, written or moved into place.
pub fn write_atomic(path: &Path, content: &str) -> ComposeResult<()> {
    let write_err = |reason: String| ComposeError::EnvFileWriteFailed {
        path: path.display().to_string(),
        reason,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".envcompose")
        .tempfile_in(dir)
        .map_err(|e| write_err(format!("create temp file in {}: {}", dir.display(), e)))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| write_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| write_err(e.error.to_string()))?;
    Ok(())
}

/// Resolves a user-supplied source: a directory means the `.env` inside it.
pub fn resolve_source(source: &Path) -> PathBuf {
    if source.is_dir() {
        source.join(ENV_FILE)
    } else {
        source.to_path_buf()
    }
}

/// Overwrites `dest` with the full contents of `source` and returns the file
/// that was actually read.
///
/// # Errors
///
/// Returns [`ComposeError::NotFound`] if the resolved source does not exist,
/// or a read/write error if copying fails.
pub fn copy_env_file(source: &Path, dest: &Path) -> ComposeResult<PathBuf> {
    let resolved = resolve_source(source);
    if !resolved.is_file() {
        return Err(ComposeError::NotFound {
            path: resolved.display().to_string(),
        });
    }
    let content = read_env_file(&resolved)?;
    write_atomic(dest, &content)?;
    Ok(resolved)
}
