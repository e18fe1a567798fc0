//! # Controller Module
//!
//! Gamepad input handling.
//!
//! This module handles:
//! - Gamepad detection and connection via evdev
//! - Sharing one device handle between several readers
//! - Deadbanding analog axes and correcting cold-start trigger readings
//! - Producing complete event snapshots for the teleop loop

pub mod deadband;
pub mod device;
pub mod layout;
pub mod registry;
pub mod snapshot;
pub mod translator;
