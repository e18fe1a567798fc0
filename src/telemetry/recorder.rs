//! # Snapshot Recorder
//!
//! Each line of a recording is one [`SnapshotRecord`]:
//!
//! ```json
//! {"timestamp":"2024-01-01T12:00:00Z","events":{"axis.L2_BUTTON":-1.0,"button.A_BUTTON":false}}
//! ```
//!
//! Files are named `snapshots_<YYYYMMDD_HHMMSS>_<seq>.jsonl` so that
//! lexicographic order is creation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::controller::snapshot::EventMap;
use crate::error::{Result, TeleopError};

const FILE_PREFIX: &str = "snapshots_";
const FILE_EXTENSION: &str = "jsonl";

/// One recorded snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub timestamp: DateTime<Utc>,
    pub events: EventMap,
}

/// Appends snapshots to rotating JSONL files.
#[derive(Debug)]
pub struct SnapshotRecorder {
    log_dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    total_records: u64,
    file_sequence: u64,
}

impl SnapshotRecorder {
    /// Creates a recorder writing into `log_dir`, creating it if needed.
    ///
    /// No file is opened until the first record.
    ///
    /// # Errors
    ///
    /// Returns `Recording` if either limit is zero, or `Io` if the directory
    /// cannot be created.
    pub fn new(
        log_dir: impl Into<PathBuf>,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        if max_records_per_file == 0 || max_files_to_keep == 0 {
            return Err(TeleopError::Recording(
                "max_records_per_file and max_files_to_keep must be positive".to_string(),
            ));
        }

        let log_dir = log_dir.into();
        fs::create_dir_all(&log_dir)?;

        Ok(Self {
            log_dir,
            max_records_per_file,
            max_files_to_keep,
            writer: None,
            current_path: None,
            records_in_file: 0,
            total_records: 0,
            file_sequence: 0,
        })
    }

    /// # Errors
    ///
    /// See [`SnapshotRecorder::new`].
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        Self::new(
            &config.log_dir,
            config.max_records_per_file,
            config.max_files_to_keep,
        )
    }

    /// Appends one snapshot stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` on write failures.
    pub fn record(&mut self, events: &EventMap) -> Result<()> {
        self.record_at(Utc::now(), events)
    }

    /// Appends one snapshot with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` on write failures.
    pub fn record_at(&mut self, timestamp: DateTime<Utc>, events: &EventMap) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate(timestamp)?;
        }

        let record = SnapshotRecord {
            timestamp,
            events: events.clone(),
        };
        let line = serde_json::to_string(&record)?;

        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
        }
        self.records_in_file += 1;
        self.total_records += 1;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Io` if the buffered writer cannot be flushed.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// File currently being written, if any.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    fn rotate(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        self.flush()?;

        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            timestamp.format("%Y%m%d_%H%M%S"),
            self.file_sequence,
            FILE_EXTENSION
        );
        self.file_sequence += 1;
        let path = self.log_dir.join(name);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Recording snapshots to {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    /// Deletes the oldest recordings beyond `max_files_to_keep`.
    fn prune(&self) -> Result<()> {
        let mut files = recording_files(&self.log_dir)?;
        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed old recording {}", path.display()),
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

impl Drop for SnapshotRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush snapshot recording: {}", e);
        }
    }
}

fn recording_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_recording = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(FILE_PREFIX))
            && path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION);
        if is_recording {
            files.push(path);
        }
    }
    Ok(files)
}

/// Reads every record of a JSONL recording. Blank lines are skipped.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read, or `Recording` naming the
/// 1-based line that fails to parse.
pub fn read_recording(path: impl AsRef<Path>) -> Result<Vec<SnapshotRecord>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut records = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| TeleopError::Recording(format!("line {}: {}", number + 1, e)))?;
        records.push(record);
    }

    Ok(records)
}
