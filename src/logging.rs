//! Optional JSONL change log. Each `get` writes one entry for the sheet and
//! each `set` writes one entry per sheet row. Only the newest entries are
//! kept.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const MAX_ENTRIES: usize = 500;

/// What happened to one sheet row, or to the sheet itself.
#[derive(Debug, Serialize)]
pub struct Change<'a> {
    pub command: &'a str,
    /// 1-based position of the row in the sheet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'a str>,
    pub destination: &'a Path,
    pub outcome: &'a str,
}

#[derive(Serialize)]
struct Entry<'a> {
    timestamp: String,
    #[serde(flatten)]
    change: &'a Change<'a>,
}

pub fn record_change(log_path: &Path, change: &Change<'_>) -> Result<()> {
    if let Some(dir) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let entry = Entry {
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into()),
        change,
    };
    let json = serde_json::to_string(&entry)?;
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_path)
        .with_context(|| format!("opening change log {}", log_path.display()))?;
    writeln!(file, "{json}")?;
    drop(file);
    trim_log(log_path)
}

fn trim_log(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading change log {}", path.display()))?;
    let count = text.lines().count();
    if count <= MAX_ENTRIES {
        return Ok(());
    }
    let kept: String = text
        .lines()
        .skip(count - MAX_ENTRIES)
        .flat_map(|line| [line, "\n"])
        .collect();
    fs::write(path, kept).with_context(|| format!("trimming change log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row_change<'a>(row: usize, source: &'a str, outcome: &'a str) -> Change<'a> {
        Change {
            command: "set",
            row: Some(row),
            source: Some(source),
            destination: Path::new("out/a.mp3"),
            outcome,
        }
    }

    #[test]
    fn appends_json_lines() {
        let temp = tempdir().expect("temp dir");
        let log = temp.path().join("logs").join("changes.jsonl");
        record_change(&log, &row_change(1, "in/a.mp3", "written")).unwrap();
        record_change(&log, &row_change(2, "in/b.mp3", "collision")).unwrap();

        let text = fs::read_to_string(&log).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["outcome"], "written");
        assert_eq!(lines[1]["source"], "in/b.mp3");
        assert_eq!(lines[1]["row"], 2);
        assert!(lines[0]["timestamp"].is_string());
    }

    #[test]
    fn sheet_entries_omit_row_fields() {
        let temp = tempdir().expect("temp dir");
        let log = temp.path().join("changes.jsonl");
        let change = Change {
            command: "get",
            row: None,
            source: None,
            destination: Path::new("tags.txt"),
            outcome: "3 rows",
        };
        record_change(&log, &change).unwrap();
        let entry: serde_json::Value =
            serde_json::from_str(fs::read_to_string(&log).unwrap().trim()).unwrap();
        assert_eq!(entry["command"], "get");
        assert!(entry.get("row").is_none());
        assert!(entry.get("source").is_none());
    }

    #[test]
    fn keeps_only_recent_entries() {
        let temp = tempdir().expect("temp dir");
        let log = temp.path().join("changes.jsonl");
        fs::write(&log, "{}\n".repeat(MAX_ENTRIES)).unwrap();
        record_change(&log, &row_change(7, "a", "copied")).unwrap();
        let text = fs::read_to_string(&log).unwrap();
        assert_eq!(text.lines().count(), MAX_ENTRIES);
        assert!(text.lines().last().unwrap().contains("copied"));
    }
}
