//! `.env`-style key/value configuration file.
//!
//! Lines are kept verbatim so that editing one key never disturbs comments,
//! ordering or unrelated entries. Writes go through a temporary file in the
//! same directory and are renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::BootstrapError;

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(export\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*=(.*)$").expect("valid regex")
});

/// What [`EnvFile::set`] did to the file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Upsert {
    /// The key was absent and a new line was appended.
    Appended,
    /// An existing line was rewritten with a different value.
    Replaced,
    /// The key already held the requested value.
    Unchanged,
}

/// An in-memory view of a `.env` file.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl EnvFile {
    /// Loads the file, treating a missing file as empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, BootstrapError> {
        let path = path.into();
        let lines = match fs::read_to_string(&path) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(BootstrapError::EnvFile {
                    path,
                    reason: e.to_string(),
                })
            }
        };
        Ok(Self { path, lines })
    }

    /// Raw lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns the unquoted value of the first entry for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lines
            .iter()
            .filter_map(|line| parse_entry(line))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Sets `key` to `value`.
    ///
    /// The first existing entry is rewritten in place, keeping an `export `
    /// prefix, and any later duplicates are dropped. When the key is absent, a blank separator (unless the file
    /// is empty or already ends with one), the optional comment and the entry
    /// are appended.
    pub fn set(&mut self, key: &str, value: &str, comment: Option<&str>) -> Upsert {
        let rendered = format!("{key}={}", quote(value));
        let matches: Vec<usize> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| parse_entry(line).is_some_and(|(k, _)| k == key))
            .map(|(i, _)| i)
            .collect();

        let Some((&first, rest)) = matches.split_first() else {
            if self.lines.last().is_some_and(|l| !l.trim().is_empty()) {
                self.lines.push(String::new());
            }
            if let Some(comment) = comment {
                self.lines.push(format!("# {comment}"));
            }
            self.lines.push(rendered);
            return Upsert::Appended;
        };

        let unchanged = rest.is_empty() && self.get(key).as_deref() == Some(value);
        for &index in rest.iter().rev() {
            self.lines.remove(index);
        }
        if unchanged {
            return Upsert::Unchanged;
        }
        let export = if is_exported(&self.lines[first]) { "export " } else { "" };
        self.lines[first] = format!("{export}{rendered}");
        Upsert::Replaced
    }

    /// Writes the file back, creating parent directories as needed.
    pub fn save(&self) -> Result<(), BootstrapError> {
        let to_err = |e: std::io::Error| BootstrapError::EnvFile {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(to_err)?;

        let mut content = self.lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(to_err)?;
        tmp.write_all(content.as_bytes()).map_err(to_err)?;
        tmp.persist(&self.path).map_err(|e| to_err(e.error))?;
        Ok(())
    }
}

/// Loads `path`, sets `key` and saves the result in one call.
pub fn persist_entry(
    path: &Path,
    key: &str,
    value: &str,
    comment: Option<&str>,
) -> Result<Upsert, BootstrapError> {
    let mut file = EnvFile::load(path)?;
    let outcome = file.set(key, value, comment);
    if outcome != Upsert::Unchanged || !path.exists() {
        file.save()?;
    }
    Ok(outcome)
}

fn parse_entry(line: &str) -> Option<(&str, String)> {
    let caps = ENTRY_RE.captures(line)?;
    let key = caps.get(2)?.as_str();
    let raw = caps.get(3).map_or("", |m| m.as_str()).trim();
    Some((key, unquote(raw)))
}

fn is_exported(line: &str) -> bool {
    ENTRY_RE
        .captures(line)
        .is_some_and(|caps| caps.get(1).is_some())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let inner = &raw[1..raw.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                    continue;
                }
            }
            out.push(c);
        }
        out
    } else if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.split(" #").next().unwrap_or(raw).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file_with(lines: &[&str]) -> EnvFile {
        EnvFile {
            path: PathBuf::from(".env"),
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_get_handles_quotes_and_export() {
        let file = file_with(&[
            "# comment",
            "export S3_BUCKET_NAME=bucket # inline",
            "VM_PATH=\"/a/b c/Ubuntu0.vmx\"",
            "SINGLE='x'",
        ]);
        assert_eq!(file.get("VM_PATH").as_deref(), Some("/a/b c/Ubuntu0.vmx"));
        assert_eq!(file.get("S3_BUCKET_NAME").as_deref(), Some("bucket"));
        assert_eq!(file.get("SINGLE").as_deref(), Some("x"));
        assert_eq!(file.get("MISSING"), None);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut file = file_with(&["A=1", "VM_PATH=\"/old\"", "B=2"]);
        assert_eq!(file.set("VM_PATH", "/new", Some("ignored")), Upsert::Replaced);
        assert_eq!(file.lines(), ["A=1", "VM_PATH=\"/new\"", "B=2"]);
    }

    #[test]
    fn test_set_keeps_export_prefix() {
        let mut file = file_with(&["export VM_PATH=\"/old\"", "  export  B=2"]);
        assert_eq!(file.set("VM_PATH", "/new", None), Upsert::Replaced);
        assert_eq!(file.set("B", "3", None), Upsert::Replaced);
        assert_eq!(file.lines(), ["export VM_PATH=\"/new\"", "export B=\"3\""]);
        assert_eq!(file.get("VM_PATH").as_deref(), Some("/new"));
    }

    #[test]
    fn test_set_collapses_duplicates() {
        let mut file = file_with(&["VM_PATH=\"/one\"", "X=1", "VM_PATH=\"/two\""]);
        assert_eq!(file.set("VM_PATH", "/one", None), Upsert::Replaced);
        assert_eq!(file.lines(), ["VM_PATH=\"/one\"", "X=1"]);
    }

    #[test]
    fn test_set_unchanged() {
        let mut file = file_with(&["VM_PATH=\"/same\""]);
        assert_eq!(file.set("VM_PATH", "/same", None), Upsert::Unchanged);
        assert_eq!(file.lines(), ["VM_PATH=\"/same\""]);
    }

    #[test]
    fn test_set_appends_with_separator_and_comment() {
        let mut file = file_with(&["OPENAI_API_KEY=sk"]);
        assert_eq!(file.set("VM_PATH", "/vm", Some("OSWorld VM")), Upsert::Appended);
        assert_eq!(
            file.lines(),
            ["OPENAI_API_KEY=sk", "", "# OSWorld VM", "VM_PATH=\"/vm\""]
        );
    }

    #[test]
    fn test_set_appends_to_empty_file_without_separator() {
        let mut file = file_with(&[]);
        file.set("VM_PATH", "/vm", None);
        assert_eq!(file.lines(), ["VM_PATH=\"/vm\""]);
    }

    #[test]
    fn test_key_prefix_is_not_a_match() {
        let mut file = file_with(&["VM_PATH_OLD=\"/x\""]);
        assert_eq!(file.set("VM_PATH", "/vm", None), Upsert::Appended);
        assert_eq!(file.get("VM_PATH_OLD").as_deref(), Some("/x"));
    }

    #[test]
    fn test_quoting_round_trips_special_characters() {
        let mut file = file_with(&[]);
        file.set("K", r#"C:\VMs\"quoted""#, None);
        assert_eq!(file.get("K").as_deref(), Some(r#"C:\VMs\"quoted""#));
    }

    #[test]
    fn test_persist_entry_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(".env");
        let outcome = persist_entry(&path, "VM_PATH", "/vm", Some("c")).unwrap();
        assert_eq!(outcome, Upsert::Appended);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "# c\nVM_PATH=\"/vm\"\n");
    }

    #[test]
    fn test_persist_entry_preserves_other_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "A=1\n# keep me\nB=\"two\"\n").unwrap();

        persist_entry(&path, "VM_PATH", "/vm", None).unwrap();
        persist_entry(&path, "VM_PATH", "/vm2", None).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "A=1\n# keep me\nB=\"two\"\n\nVM_PATH=\"/vm2\"\n");
    }
}
