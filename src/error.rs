//! # Error Types
//!
//! Custom error types for PLB Teleop using `thiserror`.

use thiserror::Error;

/// Main error type for PLB Teleop
#[derive(Debug, Error)]
pub enum TeleopError {
    /// The bound gamepad does not report the expected hardware name
    #[error("Device mismatch: expected {expected:?}, found {found:?}")]
    DeviceMismatch { expected: String, found: String },

    /// An event map does not carry exactly the canonical set of inputs
    #[error("Event schema mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Controller backend errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No gamepad at the requested index
    #[error("No gamepad found at index {0}")]
    ControllerNotFound(usize),

    /// The opened device reports a different index than requested
    #[error("Device index mismatch: requested {requested}, device reports {reported}")]
    DeviceIndexMismatch { requested: usize, reported: usize },

    /// The simulation's action space does not match what the controls produce
    #[error("Action dimension mismatch: expected {expected}, got {actual}")]
    ActionDimension { expected: usize, actual: usize },

    /// Mesh loading errors
    #[error("Mesh error at line {line}: {message}")]
    Mesh { line: usize, message: String },

    /// Frame or renderer errors
    #[error("Render error: {0}")]
    Render(String),

    /// Snapshot recording errors
    #[error("Recording error: {0}")]
    Recording(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for PLB Teleop
pub type Result<T> = std::result::Result<T, TeleopError>;
