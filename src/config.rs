//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration for a Logitech F710 on gamepad index 0.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, TeleopError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub gamepad: GamepadConfig,
    #[serde(default)]
    pub teleop: TeleopConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Gamepad configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GamepadConfig {
    #[serde(default)]
    pub device_index: usize,

    #[serde(default = "default_expected_name")]
    pub expected_name: String,

    #[serde(default = "default_deadband")]
    pub deadband: f32,

    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: f32,

    #[serde(default = "default_release_poll_ms")]
    pub release_poll_ms: u64,
}

/// Which input device drives the simulation
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Gamepad,
    Keyboard,
}

/// Teleoperation loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TeleopConfig {
    #[serde(default)]
    pub input: InputMode,

    #[serde(default = "default_rate_hz")]
    pub rate_hz: u32,

    #[serde(default = "default_position_step")]
    pub position_step: f32,

    #[serde(default = "default_rotation_step")]
    pub rotation_step: f32,
}

/// Simulation environment configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_env_name")]
    pub env_name: String,

    #[serde(default)]
    pub seed: u64,

    #[serde(default = "default_max_episode_steps")]
    pub max_episode_steps: usize,
}

/// Frame size and primitive model configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_frame_size")]
    pub width: usize,

    #[serde(default = "default_frame_size")]
    pub height: usize,

    /// OBJ file for the primitive's unit cylinder. The built-in model is
    /// used when unset.
    #[serde(default)]
    pub primitive_mesh: Option<String>,
}

/// Snapshot recording configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_expected_name() -> String { "Logitech Gamepad F710".to_string() }
fn default_deadband() -> f32 { 0.1 }
fn default_trigger_threshold() -> f32 { 0.5 }
fn default_release_poll_ms() -> u64 { 100 }

fn default_rate_hz() -> u32 { 30 }
fn default_position_step() -> f32 { 0.0025 }
fn default_rotation_step() -> f32 { 0.05 }

fn default_env_name() -> String { "CustomDough-v1".to_string() }
fn default_max_episode_steps() -> usize { 50 }

fn default_frame_size() -> usize { 512 }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            expected_name: default_expected_name(),
            deadband: default_deadband(),
            trigger_threshold: default_trigger_threshold(),
            release_poll_ms: default_release_poll_ms(),
        }
    }
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            input: InputMode::default(),
            rate_hz: default_rate_hz(),
            position_step: default_position_step(),
            rotation_step: default_rotation_step(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            env_name: default_env_name(),
            seed: 0,
            max_episode_steps: default_max_episode_steps(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_frame_size(),
            height: default_frame_size(),
            primitive_mesh: None,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_log_format(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> TeleopError {
    TeleopError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use plb_teleop::config::Config;
    ///
    /// let config = Config::load("config/teleop.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.gamepad.expected_name.is_empty() {
            return Err(invalid("expected_name cannot be empty"));
        }

        if !(0.0..=0.25).contains(&self.gamepad.deadband) {
            return Err(invalid("deadband must be between 0.0 and 0.25"));
        }

        let threshold = self.gamepad.trigger_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(invalid("trigger_threshold must be greater than 0.0 and at most 1.0"));
        }

        if self.gamepad.release_poll_ms == 0 || self.gamepad.release_poll_ms > 10000 {
            return Err(invalid("release_poll_ms must be between 1 and 10000"));
        }

        if self.teleop.rate_hz == 0 || self.teleop.rate_hz > 1000 {
            return Err(invalid("rate_hz must be between 1 and 1000"));
        }

        for (name, value) in [
            ("position_step", self.teleop.position_step),
            ("rotation_step", self.teleop.rotation_step),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(invalid(format!("{} must be a positive number", name)));
            }
        }

        if self.simulation.env_name.is_empty() {
            return Err(invalid("env_name cannot be empty"));
        }

        if self.simulation.max_episode_steps == 0 {
            return Err(invalid("max_episode_steps must be greater than 0"));
        }

        for (name, value) in [("width", self.render.width), ("height", self.render.height)] {
            if !(16..=4096).contains(&value) {
                return Err(invalid(format!("{} must be between 16 and 4096", name)));
            }
        }

        if self.render.primitive_mesh.as_deref() == Some("") {
            return Err(invalid("primitive_mesh cannot be empty when set"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }
}
