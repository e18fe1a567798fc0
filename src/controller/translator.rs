//! # Input Translator Module
//!
//! Turns raw gamepad state into deadbanded, fully populated
//! [`EventSnapshot`]s.
//!
//! Each call to [`InputTranslator::poll`]:
//!
//! 1. Pumps the shared device.
//! 2. Reads every analog axis through the [`Deadband`].
//! 3. Reads the d-pad and physical buttons as is.
//! 4. Applies the per-trigger [`TriggerLatch`] cold-start correction.
//! 5. Derives the virtual L2/R2 buttons from the corrected triggers.
//!
//! ## Usage
//!
//! ```no_run
//! use plb_teleop::controller::device::EvdevBackend;
//! use plb_teleop::controller::layout::GAMEPAD_NAME;
//! use plb_teleop::controller::registry::GamepadRegistry;
//! use plb_teleop::controller::translator::InputTranslator;
//!
//! let mut registry = GamepadRegistry::new(EvdevBackend);
//! let mut translator = InputTranslator::new(registry.bind(0)?, GAMEPAD_NAME)?;
//!
//! let snapshot = translator.poll()?;
//! println!("Right stick Y: {}", snapshot.right_stick_y);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use tracing::{debug, trace};

use super::deadband::{trigger_pressed, Deadband, TriggerLatch, TRIGGER_TO_BUTTON_THRESHOLD};
use super::layout::{JoystickAxis, JoystickButton, JoystickHat};
use super::registry::SharedGamepad;
use super::snapshot::{are_any_buttons_pressed, EventSnapshot};
use crate::config::GamepadConfig;
use crate::error::{Result, TeleopError};

/// Polls one shared gamepad and produces [`EventSnapshot`]s.
///
/// Several translators may share the same device handle. Each keeps its own
/// trigger latches.
pub struct InputTranslator {
    device: SharedGamepad,
    deadband: Deadband,
    trigger_threshold: f32,
    latch_l2: TriggerLatch,
    latch_r2: TriggerLatch,
}

impl std::fmt::Debug for InputTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputTranslator")
            .field("deadband", &self.deadband)
            .field("trigger_threshold", &self.trigger_threshold)
            .field("latch_l2", &self.latch_l2)
            .field("latch_r2", &self.latch_r2)
            .finish_non_exhaustive()
    }
}

impl InputTranslator {
    /// Creates a translator with the default deadband and trigger threshold.
    ///
    /// # Errors
    ///
    /// Returns `DeviceMismatch` if the device does not report `expected_name`.
    pub fn new(device: SharedGamepad, expected_name: &str) -> Result<Self> {
        Self::with_settings(
            device,
            expected_name,
            Deadband::default(),
            TRIGGER_TO_BUTTON_THRESHOLD,
        )
    }

    /// Creates a translator from the `[gamepad]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns `DeviceMismatch` if the device does not report the configured
    /// name.
    pub fn from_config(device: SharedGamepad, config: &GamepadConfig) -> Result<Self> {
        Self::with_settings(
            device,
            &config.expected_name,
            Deadband::new(config.deadband),
            config.trigger_threshold,
        )
    }

    fn with_settings(
        device: SharedGamepad,
        expected_name: &str,
        deadband: Deadband,
        trigger_threshold: f32,
    ) -> Result<Self> {
        let found = device.borrow().name();
        if found != expected_name {
            return Err(TeleopError::DeviceMismatch {
                expected: expected_name.to_string(),
                found,
            });
        }

        debug!(
            "Input translator bound to {:?} (deadband {}, trigger threshold {})",
            found,
            deadband.threshold(),
            trigger_threshold
        );

        Ok(Self {
            device,
            deadband,
            trigger_threshold,
            latch_l2: TriggerLatch::new(),
            latch_r2: TriggerLatch::new(),
        })
    }

    /// Polls the device and returns a complete snapshot.
    ///
    /// # Errors
    ///
    /// Device errors from pumping propagate unmodified.
    pub fn poll(&mut self) -> Result<EventSnapshot> {
        let mut device = self.device.borrow_mut();
        device.pump()?;

        let mut snapshot = EventSnapshot::rest();

        for axis in JoystickAxis::ALL {
            snapshot.set_axis(axis, self.deadband.apply(device.axis(axis.index())));
        }

        for hat in JoystickHat::ALL {
            let (hat_index, sub_index) = hat.index();
            let (x, y) = device.hat(hat_index);
            snapshot.set_hat(hat, if sub_index == 0 { x } else { y });
        }

        for button in JoystickButton::ALL.into_iter().filter(|b| !b.is_virtual()) {
            snapshot.set_button(button, device.button(button.index()));
        }
        drop(device);

        // Triggers read 0.0 until first moved even though they rest at -1.0
        snapshot.trigger_l2 = self.latch_l2.correct(snapshot.trigger_l2);
        snapshot.trigger_r2 = self.latch_r2.correct(snapshot.trigger_r2);

        snapshot.btn_l2 = trigger_pressed(snapshot.trigger_l2, self.trigger_threshold);
        snapshot.btn_r2 = trigger_pressed(snapshot.trigger_r2, self.trigger_threshold);

        trace!("Polled snapshot: {:?}", snapshot);
        Ok(snapshot)
    }

    /// Returns true when nothing on the gamepad is away from rest.
    ///
    /// # Errors
    ///
    /// Device errors from polling propagate unmodified.
    pub fn can_reset(&mut self) -> Result<bool> {
        let snapshot = self.poll()?;
        Ok(!are_any_buttons_pressed(&snapshot.to_event_map())?)
    }

    /// Returns true while the trigger has not reported a non-zero value.
    #[must_use]
    pub fn is_trigger_latched(&self, trigger: JoystickAxis) -> bool {
        match trigger {
            JoystickAxis::TriggerL2 => self.latch_l2.is_armed(),
            JoystickAxis::TriggerR2 => self.latch_r2.is_armed(),
            _ => false,
        }
    }
}
