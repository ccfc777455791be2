//! Parsing of env files into snapshots, required-key extraction, and the
//! missing-key calculation.
//!
//! Only `KEY=VALUE` lines are understood. Values may be wrapped in one layer
//! of matching `"` or `'` quotes. Blank lines and lines starting with `#` are
//! ignored for lookups but stay in [`EnvSnapshot::lines`].

use std::collections::HashSet;

use indexmap::IndexMap;

/// Parsed view of an env file: the raw lines plus the derived key map.
///
/// The map holds the last assignment for every key (later lines win), in
/// order of each key's first appearance.
///
/// # Examples
///
/// ```rust
/// use envcompose::EnvSnapshot;
///
/// let snapshot = EnvSnapshot::parse("# db\nDATABASE_URL=\"postgres://x\"\nAPI_KEY=\n");
/// assert_eq!(snapshot.get("DATABASE_URL"), Some("postgres://x"));
/// assert!(!snapshot.is_set("API_KEY"));
/// assert_eq!(snapshot.lines().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    lines: Vec<String>,
    vars: IndexMap<String, String>,
}

impl EnvSnapshot {
    /// Parses env file content. Never fails: lines without `=` are kept in
    /// [`lines`](Self::lines) but contribute nothing to the map.
    pub fn parse(content: &str) -> Self {
        let lines = split_lines(content);
        let mut vars = IndexMap::new();
        for line in &lines {
            if let Some((key, value)) = parse_assignment(line) {
                vars.insert(key.to_string(), value.to_string());
            }
        }
        Self { lines, vars }
    }

    /// The raw lines of the file, without line terminators.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The derived key/value map.
    pub fn vars(&self) -> &IndexMap<String, String> {
        &self.vars
    }

    /// Returns the value for `key`, if the file assigns one.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Returns `true` if `key` is assigned a non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Renders the map as `KEY="value"` lines, dropping comments and any
    /// non-assignment lines.
    pub fn render_vars(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.vars {
            out.push_str(&format!("{}=\"{}\"\n", key, value));
        }
        out
    }
}

/// Extracts the ordered list of keys a `.env.example` declares.
///
/// Uses the same line filtering as [`EnvSnapshot::parse`], but keeps only the
/// key token. A line without `=` counts as a bare key. Duplicates are kept.
///
/// # Examples
///
/// ```rust
/// use envcompose::extract_required;
///
/// let keys = extract_required("# auth\nAUTH_SECRET=\nDATABASE_URL=postgres://\n\n");
/// assert_eq!(keys, vec!["AUTH_SECRET", "DATABASE_URL"]);
/// ```
pub fn extract_required(example_content: &str) -> Vec<String> {
    split_lines(example_content)
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split_once('=').map_or(line, |(key, _)| key).trim())
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the required keys that are absent from `snapshot` or mapped to an
/// empty value, in `required` order and without duplicates.
pub fn missing_keys(required: &[String], snapshot: &EnvSnapshot) -> Vec<String> {
    let mut seen = HashSet::new();
    required
        .iter()
        .filter(|key| !snapshot.is_set(key))
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect()
}

/// Splits content on `\n`, dropping the empty tail left by a trailing
/// newline. `\r` stays on the line so CRLF files round-trip.
pub(crate) fn split_lines(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Returns the key token of an assignment line, or `None` for comments,
/// blanks and lines without `=`.
pub(crate) fn line_key(line: &str) -> Option<&str> {
    parse_assignment(line).map(|(key, _)| key)
}

fn parse_assignment(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, strip_quotes(value.trim())))
}

/// Strips one layer of matching `"` or `'` quotes.
pub(crate) fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_strips_matching_quotes_only() {
        let s = EnvSnapshot::parse("A=\"one\"\nB='two'\nC=\"three'\nD=plain\nE=\"\"\n");
        assert_eq!(s.get("A"), Some("one"));
        assert_eq!(s.get("B"), Some("two"));
        assert_eq!(s.get("C"), Some("\"three'"));
        assert_eq!(s.get("D"), Some("plain"));
        assert_eq!(s.get("E"), Some(""));
    }

    #[test]
    fn parse_splits_on_first_equals() {
        let s = EnvSnapshot::parse("URL=postgres://u:p@h/db?sslmode=require");
        assert_eq!(s.get("URL"), Some("postgres://u:p@h/db?sslmode=require"));
    }

    #[test]
    fn parse_keeps_malformed_lines_out_of_map() {
        let s = EnvSnapshot::parse("JUST_A_WORD\n=novalue\n  # indented comment\nOK=1");
        assert_eq!(s.vars().len(), 1);
        assert_eq!(s.lines().len(), 4);
        assert_eq!(s.lines()[0], "JUST_A_WORD");
    }

    #[test]
    fn parse_last_duplicate_wins() {
        let s = EnvSnapshot::parse("K=first\nOTHER=x\nK=second\n");
        assert_eq!(s.get("K"), Some("second"));
        let order: Vec<&String> = s.vars().keys().collect();
        assert_eq!(order, vec!["K", "OTHER"]);
    }

    #[test]
    fn split_lines_preserves_crlf_and_blank_tail() {
        assert_eq!(split_lines("A=1\r\nB=2\r\n"), vec!["A=1\r", "B=2\r"]);
        assert_eq!(split_lines("A=1\n\n"), vec!["A=1", ""]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn crlf_values_are_trimmed() {
        let s = EnvSnapshot::parse("A=\"1\"\r\n");
        assert_eq!(s.get("A"), Some("1"));
    }

    #[test]
    fn extract_required_keeps_order_and_duplicates() {
        let content = "B=\n# comment\nA=default\n\nB=again\nBARE\n";
        assert_eq!(extract_required(content), keys(&["B", "A", "B", "BARE"]));
    }

    #[test]
    fn missing_treats_empty_as_missing() {
        let required = keys(&["DATABASE_URL", "API_KEY", "PORT"]);
        let snapshot = EnvSnapshot::parse("DATABASE_URL=\nPORT=3000\n");
        assert_eq!(
            missing_keys(&required, &snapshot),
            keys(&["DATABASE_URL", "API_KEY"])
        );
    }

    #[test]
    fn missing_is_iff_absent_or_empty() {
        let required = keys(&["A", "B", "C", "D"]);
        let snapshot = EnvSnapshot::parse("A=x\nB=\"\"\nC=''\n");
        let missing = missing_keys(&required, &snapshot);
        for key in &required {
            let expected = snapshot.get(key).is_none_or(str::is_empty);
            assert_eq!(missing.contains(key), expected, "key {}", key);
        }
    }

    #[test]
    fn missing_dedupes_repeated_required_keys() {
        let required = keys(&["A", "A"]);
        assert_eq!(missing_keys(&required, &EnvSnapshot::default()), keys(&["A"]));
    }

    #[test]
    fn rendered_vars_reparse_to_same_pairs() {
        let content = "# header\nA=1\nB=\"two words\"\nC='x=y'\n\nD=\n";
        let snapshot = EnvSnapshot::parse(content);
        let reparsed = EnvSnapshot::parse(&snapshot.render_vars());
        assert_eq!(reparsed.vars(), snapshot.vars());
    }
}
