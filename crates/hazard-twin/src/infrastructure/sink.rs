//! Event Sinks
//!
//! JSON-lines writers behind the monitor's [`EventSink`] port:
//!
//! - [`JsonLinesSink`]: one file, one record per line, flushed per record
//! - [`AlertFiles`]: one file per actor under a directory,
//!   `<dir>/<sanitized-actor>.jsonl`
//! - [`MemorySink`]: shared in-memory buffer for tests and embedding

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::error::SinkError;
use crate::domain::monitor::{EventRecord, EventSink};

/// Replace every non-alphanumeric character with `_`
pub fn sanitize_actor(actor: &str) -> String {
    actor
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JsonLinesSink
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Append-only JSON-lines file
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating parent directories as needed
    ///
    /// # Errors
    ///
    /// `SinkError::Io` if the directory or file cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SinkError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonLinesSink {
    fn append(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer
            .write_all(b"\n")
            .and_then(|()| self.writer.flush())
            .map_err(|e| SinkError::io(&self.path, e))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(|e| SinkError::io(&self.path, e))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AlertFiles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-actor alert files, opened lazily on an actor's first alert
#[derive(Debug)]
pub struct AlertFiles {
    dir: PathBuf,
    files: HashMap<String, JsonLinesSink>,
}

impl AlertFiles {
    /// Use `dir` for alert files, creating it if needed
    ///
    /// # Errors
    ///
    /// `SinkError::Io` if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| SinkError::io(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            files: HashMap::new(),
        })
    }

    /// Alert file path for `actor`
    pub fn path_for(&self, actor: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", sanitize_actor(actor)))
    }
}

impl EventSink for AlertFiles {
    fn append(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        let key = sanitize_actor(&record.actor);
        if !self.files.contains_key(&key) {
            let sink = JsonLinesSink::open(self.path_for(&record.actor))?;
            self.files.insert(key.clone(), sink);
        }
        match self.files.get_mut(&key) {
            Some(sink) => sink.append(record),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.files.values_mut().try_for_each(|sink| sink.flush())
    }

    fn describe(&self) -> String {
        format!("{}/*.jsonl", self.dir.display())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemorySink
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Records kept in a shared buffer; clones see the same records
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemorySink {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything appended so far
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }
}

impl EventSink for MemorySink {
    fn append(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::monitor::EventKind;

    fn record(actor: &str, kind: EventKind) -> EventRecord {
        let (severity, action) = kind.classify();
        EventRecord {
            seq: 1,
            timestamp: "2024-01-01 00:00:00.000".into(),
            severity,
            event: kind,
            actor: actor.into(),
            message: "m".into(),
            action,
        }
    }

    #[test]
    fn test_sanitize_actor() {
        assert_eq!(sanitize_actor("client-vip-1"), "client_vip_1");
        assert_eq!(sanitize_actor("Cliente A"), "Cliente_A");
        assert_eq!(sanitize_actor("a/b.c"), "a_b_c");
    }

    #[test]
    fn test_json_lines_sink_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/events.jsonl");
        let mut sink = JsonLinesSink::open(&path).unwrap();
        sink.append(&record("a", EventKind::Init)).unwrap();
        sink.append(&record("b", EventKind::Work)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: EventRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.actor, "b");
        assert!(lines[0].contains("\"event\":\"INIT\""));
    }

    #[test]
    fn test_alert_files_route_by_actor() {
        let dir = tempfile::tempdir().unwrap();
        let mut alerts = AlertFiles::open(dir.path()).unwrap();
        alerts.append(&record("client-normal", EventKind::IpsBlock)).unwrap();
        alerts.append(&record("client-normal", EventKind::Interrupt)).unwrap();
        alerts.append(&record("agent 1", EventKind::Error)).unwrap();

        let normal = fs::read_to_string(dir.path().join("client_normal.jsonl")).unwrap();
        assert_eq!(normal.lines().count(), 2);
        assert!(dir.path().join("agent_1.jsonl").exists());
    }
}
