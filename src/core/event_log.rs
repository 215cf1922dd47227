use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use crate::common::Result;

/// Append-only CSV of recognition events: `timestamp,count,name; name`.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    every_n_frames: u64,
}

impl EventLog {
    pub fn new(path: PathBuf, every_n_frames: u64) -> Self {
        Self { path, every_n_frames: every_n_frames.max(1) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one line on every n-th frame that carries at least one identity.
    /// Returns whether a line was written.
    pub fn record(&self, frame_count: u64, identities: &[String]) -> Result<bool> {
        if identities.is_empty() || frame_count % self.every_n_frames != 0 {
            return Ok(false);
        }
        self.append(&format_event(&timestamp(), identities))?;
        Ok(true)
    }

    fn append(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Whole log as text; a missing or unreadable file reads as empty.
    pub fn read_text(&self) -> String {
        read_text(&self.path)
    }
}

pub fn read_text(path: &Path) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::debug!("Event log {} not readable: {}", path.display(), e);
            String::new()
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn format_event(timestamp: &str, identities: &[String]) -> String {
    format!("{},{},{}", timestamp, identities.len(), identities.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_matches_csv_layout() {
        let names = vec!["Ana".to_string(), "Desconocido".to_string()];
        assert_eq!(
            format_event("2024-05-01T10:00:00", &names),
            "2024-05-01T10:00:00,2,Ana; Desconocido"
        );
    }

    #[test]
    fn records_only_on_nth_frame_with_identities() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("logs").join("events.csv"), 30);
        let names = vec!["Ana".to_string()];

        assert!(!log.record(29, &names).unwrap());
        assert!(!log.record(30, &[]).unwrap());
        assert!(log.record(30, &names).unwrap());
        assert!(log.record(60, &names).unwrap());

        let text = log.read_text();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(",1,Ana"));
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_text(&dir.path().join("absent.csv")), "");
    }
}
