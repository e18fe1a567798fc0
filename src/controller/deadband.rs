//! # Deadband Module
//!
//! Noise suppression and cold-start correction for analog axes.
//!
//! ## Deadband
//!
//! The F710 sticks have some stiction and rarely settle at exactly zero. Any
//! reading whose magnitude is below the threshold is reported as exactly
//! `0.0`; readings at or above the threshold pass through unchanged. Unlike
//! a calibration deadzone the remaining range is *not* rescaled.
//!
//! ## Trigger latch
//!
//! Trigger axes rest at `-1.0`, but the device reports `0.0` until the
//! trigger is moved for the first time. A [`TriggerLatch`] rewrites `0.0` to
//! `-1.0` until the first non-zero reading, then stays out of the way for the
//! rest of its life, even when the trigger later reads exactly `0.0`.
//!
//! A trigger that genuinely rests at `0.0` is therefore reported as `-1.0`
//! until it is first moved.
//!
//! ## Usage
//!
//! ```
//! use plb_teleop::controller::deadband::{Deadband, TriggerLatch};
//!
//! let deadband = Deadband::default();
//! assert_eq!(deadband.apply(0.05), 0.0);
//! assert_eq!(deadband.apply(0.6), 0.6);
//!
//! let mut latch = TriggerLatch::new();
//! assert_eq!(latch.correct(0.0), -1.0);
//! assert_eq!(latch.correct(0.6), 0.6);
//! assert_eq!(latch.correct(0.0), 0.0);
//! ```

/// Default deadband threshold.
pub const DEADBAND_THRESHOLD: f32 = 0.1;

/// Trigger value at or above which a trigger counts as a pressed button.
pub const TRIGGER_TO_BUTTON_THRESHOLD: f32 = 0.5;

/// Value a trigger axis reports when released.
pub const TRIGGER_RELEASED: f32 = -1.0;

/// Suppresses small analog readings to exactly zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadband {
    threshold: f32,
}

impl Default for Deadband {
    fn default() -> Self {
        Self {
            threshold: DEADBAND_THRESHOLD,
        }
    }
}

impl Deadband {
    /// Creates a deadband with the given threshold, clamped to `0.0..=0.25`.
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 0.25),
        }
    }

    /// Returns the configured threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Applies the deadband to a raw axis value.
    ///
    /// `|value| < threshold` yields `0.0`; anything else is returned as is.
    #[must_use]
    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        if value.abs() < self.threshold {
            0.0
        } else {
            value
        }
    }
}

/// Cold-start correction for one trigger axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerLatch {
    awaiting_first_motion: bool,
}

impl Default for TriggerLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerLatch {
    /// Creates an armed latch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            awaiting_first_motion: true,
        }
    }

    /// Returns true while no non-zero reading has been seen.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.awaiting_first_motion
    }

    /// Corrects one trigger reading.
    ///
    /// While armed, `0.0` is reported as [`TRIGGER_RELEASED`]. The first
    /// non-zero reading disarms the latch permanently.
    pub fn correct(&mut self, value: f32) -> f32 {
        if self.awaiting_first_motion {
            if value == 0.0 {
                return TRIGGER_RELEASED;
            }
            self.awaiting_first_motion = false;
        }
        value
    }
}

/// Maps a corrected trigger value to a virtual button state.
#[must_use]
#[inline]
pub fn trigger_pressed(value: f32, threshold: f32) -> bool {
    value >= threshold
}
