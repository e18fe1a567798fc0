//! # Telemetry Module
//!
//! Records gamepad snapshots to JSONL files with rotation.
//!
//! This module handles:
//! - Formatting snapshots as JSONL (JSON Lines)
//! - Writing to rotating log files (max N records per file)
//! - Retaining only the last M files
//! - Reading recordings back for inspection

pub mod recorder;

pub use recorder::{read_recording, SnapshotRecord, SnapshotRecorder};
