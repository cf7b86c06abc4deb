use std::{fmt, path::Path};

use chrono::{Local, Utc};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{info, warn};

extern crate strip_ansi_escapes;

use crate::Result;

/// Tally of a conversion run
#[derive(Debug, Default)]
pub struct StatusBar {
    converted: usize,
    skipped: usize,
    failed: usize,
    log: Vec<String>,
}

impl fmt::Display for StatusBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Converted \x1b[32m{}\x1b[0m / Skipped \x1b[33m{}\x1b[0m / Failed \x1b[31m{}\x1b[0m",
            self.converted, self.skipped, self.failed
        )
    }
}

impl StatusBar {
    fn get_current_time() -> String {
        Utc::now().with_timezone(&Local).to_rfc3339()
    }

    fn create_log_entry(&mut self, message: &str, log_type: &str) -> String {
        // Create log entry contents for both tracing and log file
        let mut log_entry_contents = log_type.to_string();
        log_entry_contents.push_str(message);

        // Create entry for log file
        let mut log_entry = StatusBar::get_current_time();
        log_entry.push(' ');
        log_entry.push_str(&log_entry_contents);
        self.log.push(log_entry);

        log_entry_contents
    }

    pub fn converted(&self) -> usize {
        self.converted
    }
    pub fn skipped(&self) -> usize {
        self.skipped
    }
    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn register_skipped(&mut self) {
        self.skipped += 1;
    }
    pub fn register_converted(&mut self, message: &str) {
        self.converted += 1;
        let entry = self.create_log_entry(message, "\x1b[32mConverted\x1b[0m: ");
        info!("{}", entry);
    }
    pub fn register_err(&mut self, message: &str) {
        self.failed += 1;
        let entry = self.create_log_entry(message, "\x1b[31mErr\x1b[0m: ");
        warn!("{}", entry);
    }

    /// Folds the tally of another worker into this one
    pub fn merge(&mut self, other: StatusBar) {
        self.converted += other.converted;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.log.extend(other.log);
    }

    // Appends contents of self.log to a log file
    pub async fn write_log_to_file(&self, file_path: &Path) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .await?;

        let mut buffer = Vec::new();

        for log_entry in &self.log {
            buffer.extend_from_slice(&strip_ansi_escapes::strip(log_entry.as_bytes()));
            buffer.extend_from_slice(b"\n");
        }

        buffer.extend_from_slice(b"Total: ");
        buffer.extend_from_slice(&strip_ansi_escapes::strip(self.to_string().as_bytes()));
        buffer.extend_from_slice(b"     (Log generated at: ");
        buffer.extend_from_slice(StatusBar::get_current_time().as_bytes());
        buffer.extend_from_slice(b")\n\n");

        file.write_all(&buffer).await?;
        Ok(())
    }
}
