//! Append-only audit trail of session lifecycle events.
//!
//! One line per event:
//!
//! ```text
//! 2026-10-18T09:14:03.512775901Z,203.0.113.7,example.org,22,connection request
//! ```
//!
//! Auditing is best effort. A failed write is reported on the process log and
//! otherwise ignored; callers never see an error.
//!
//! Records are written inline on the calling task. Each is one short
//! `write_all` to a local append-only file and a session produces at most
//! four, so the mutex is held for microseconds; in exchange a record is on
//! disk, in order, by the time `record` returns.

use std::borrow::Cow;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::AuditConfig;

/// Lifecycle events written to the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// Control message decoded; written before destination policy runs.
    ConnectionRequest,
    ConnectionFailed,
    ConnectionEstablished,
    /// Relay finished; carries the combined transfer summary.
    Completed(String),
}

impl AuditEvent {
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            AuditEvent::ConnectionRequest => Cow::Borrowed("connection request"),
            AuditEvent::ConnectionFailed => Cow::Borrowed("connection failed"),
            AuditEvent::ConnectionEstablished => Cow::Borrowed("connection established"),
            AuditEvent::Completed(summary) => Cow::Borrowed(summary.as_str()),
        }
    }
}

/// One immutable audit line.
#[derive(Debug, Clone)]
pub struct AuditRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub source: &'a str,
    pub host: &'a str,
    pub port: u16,
    pub event: &'a AuditEvent,
}

impl fmt::Display for AuditRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.source,
            self.host,
            self.port,
            self.event.message()
        )
    }
}

/// Audit file handle. Appends are serialized by a single mutex.
pub struct AuditLog {
    file: Option<Mutex<File>>,
}

impl AuditLog {
    /// An audit log that drops every event.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Open (or create) `path` for appending.
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    /// Build from config. A missing or empty path disables auditing.
    pub fn from_config(config: &AuditConfig) -> io::Result<Self> {
        match &config.path {
            Some(path) if !path.as_os_str().is_empty() => Self::open(path),
            _ => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Append one event.
    pub fn record(&self, source: &str, host: &str, port: u16, event: &AuditEvent) {
        let Some(file) = &self.file else {
            return;
        };

        let mut line = AuditRecord {
            timestamp: Utc::now(),
            source,
            host,
            port,
            event,
        }
        .to_string();
        line.push('\n');

        let mut file = match file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::error!(error = %e, "Failed to write audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_line_format() {
        let timestamp = Utc.with_ymd_and_hms(2026, 10, 18, 9, 14, 3).unwrap()
            + chrono::Duration::nanoseconds(512_775_901);
        let event = AuditEvent::ConnectionRequest;
        let record = AuditRecord {
            timestamp,
            source: "203.0.113.7",
            host: "example.org",
            port: 22,
            event: &event,
        };

        assert_eq!(
            record.to_string(),
            "2026-10-18T09:14:03.512775901Z,203.0.113.7,example.org,22,connection request"
        );
    }

    #[test]
    fn appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        std::fs::write(&path, "existing line\n").unwrap();

        let log = AuditLog::open(&path).unwrap();
        log.record("203.0.113.7", "example.org", 80, &AuditEvent::ConnectionRequest);
        log.record("203.0.113.7", "example.org", 80, &AuditEvent::ConnectionEstablished);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "existing line");
        assert!(lines[1].ends_with(",203.0.113.7,example.org,80,connection request"));
        assert!(lines[2].ends_with(",connection established"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = std::sync::Arc::new(AuditLog::open(&path).unwrap());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move {
                    let source = format!("198.51.100.{}", i);
                    for _ in 0..4 {
                        log.record(&source, "example.org", 443, &AuditEvent::ConnectionRequest);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 128);
        for line in lines {
            let fields: Vec<_> = line.split(',').collect();
            assert_eq!(fields.len(), 5, "mangled line {:?}", line);
            assert!(fields[1].starts_with("198.51.100."));
            assert_eq!(&fields[2..], ["example.org", "443", "connection request"]);
        }
    }

    #[test]
    fn empty_path_disables() {
        let config = AuditConfig {
            path: Some(std::path::PathBuf::new()),
        };
        let log = AuditLog::from_config(&config).unwrap();
        assert!(!log.is_enabled());

        // No-op, must not panic.
        log.record("a", "b", 1, &AuditEvent::ConnectionFailed);
        assert!(!AuditLog::from_config(&AuditConfig { path: None }).unwrap().is_enabled());
    }
}
