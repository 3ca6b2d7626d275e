use std::{
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "OK",
            Status::Info => "INFO",
            Status::Warn => "WARN",
            Status::Error => "ERROR",
        })
    }
}

/// One journal line: `timestamp\tSTATUS\tEVENT\tdetail`.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub status: Status,
    pub event: &'static str,
    pub detail: String,
}

impl LogEntry {
    pub fn new(status: Status, event: &'static str, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            status,
            event,
            detail: detail.into(),
        }
    }

    pub fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.status,
            self.event,
            self.detail.replace("\r\n", " | ").replace('\n', " | ")
        )
    }
}

pub trait ActionLog {
    fn record(&self, entry: LogEntry);
}

pub struct NullLog;

impl ActionLog for NullLog {
    fn record(&self, _entry: LogEntry) {}
}

// Reopened in append mode for every write; other instances may share the file.
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

impl ActionLog for FileLog {
    fn record(&self, entry: LogEntry) {
        let line = entry.line();
        debug!("{}", line.trim_end());
        if let Err(err) = self.append(&line) {
            warn!(
                "cannot write action log '{}': {}",
                self.path.to_string_lossy(),
                err
            );
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;

    use super::{ActionLog, LogEntry, Status};

    #[derive(Default)]
    pub struct MemoryLog {
        entries: RefCell<Vec<LogEntry>>,
    }

    impl MemoryLog {
        pub fn events(&self) -> Vec<(Status, &'static str, String)> {
            self.entries
                .borrow()
                .iter()
                .map(|e| (e.status, e.event, e.detail.clone()))
                .collect()
        }

        pub fn has(&self, event: &str) -> bool {
            self.entries.borrow().iter().any(|e| e.event == event)
        }
    }

    impl ActionLog for MemoryLog {
        fn record(&self, entry: LogEntry) {
            self.entries.borrow_mut().push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_is_tab_separated_and_single_line() {
        let entry = LogEntry::new(Status::Warn, "CONFIG_TEST_RESULT", "a\nb");
        let line = entry.line();
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[1], "WARN");
        assert_eq!(fields[2], "CONFIG_TEST_RESULT");
        assert_eq!(fields[3], "a | b");
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn file_log_appends_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("action.log");
        let log = FileLog::new(&path);
        log.record(LogEntry::new(Status::Info, "APP_START", "first"));
        log.record(LogEntry::new(Status::Ok, "EXECUTE", "second"));
        drop(log);

        let log = FileLog::new(&path);
        log.record(LogEntry::new(Status::Ok, "EXECUTE", "third"));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("APP_START\tfirst"));
        assert!(lines[2].ends_with("EXECUTE\tthird"));
    }

    #[test]
    fn unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let log = FileLog::new(dir.path());
        log.record(LogEntry::new(Status::Error, "EXECUTE", "lost"));
        assert!(dir.path().is_dir());
    }
}
