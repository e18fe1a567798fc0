//! # Event Snapshot Module
//!
//! A fully populated record of every gamepad input at the moment of one poll.
//!
//! [`EventSnapshot`] has one field per named input, so a snapshot can never be
//! missing a key. For comparison, logging and recording it can be flattened
//! into an [`EventMap`], keyed by [`InputKey`]. Maps coming from outside the
//! process (for example a recording on disk) are checked against the canonical
//! key set before they are compared.
//!
//! ## Usage
//!
//! ```
//! use plb_teleop::controller::snapshot::{are_any_buttons_pressed, EventSnapshot};
//!
//! let mut snapshot = EventSnapshot::rest();
//! assert!(!are_any_buttons_pressed(&snapshot.to_event_map())?);
//!
//! snapshot.btn_start = true;
//! assert!(are_any_buttons_pressed(&snapshot.to_event_map())?);
//! # Ok::<(), plb_teleop::error::TeleopError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::layout::{InputKey, JoystickAxis, JoystickButton, JoystickHat};
use crate::error::{Result, TeleopError};

/// D-Pad released.
pub const HAT_RELEASED: i8 = 0;

/// Value of a single input inside an [`EventMap`].
///
/// Axes and hats are both stored as numbers so that a hat at `0` and an axis
/// at `0.0` compare the same way they read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Pressed(bool),
    Level(f64),
}

/// Dynamically keyed view of a snapshot.
pub type EventMap = BTreeMap<InputKey, InputValue>;

/// Complete state of the gamepad after one poll.
///
/// Axis values are deadbanded and in `-1.0..=1.0`; trigger axes rest at
/// `-1.0`. Hat values are `-1`, `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventSnapshot {
    // Analog sticks
    /// Left stick X axis. -1.0 = full left, 1.0 = full right.
    pub left_stick_x: f32,
    /// Left stick Y axis. -1.0 = full up, 1.0 = full down.
    pub left_stick_y: f32,
    /// Right stick X axis. -1.0 = full left, 1.0 = full right.
    pub right_stick_x: f32,
    /// Right stick Y axis. -1.0 = full up, 1.0 = full down.
    pub right_stick_y: f32,

    // Triggers
    /// L2 trigger. -1.0 = released, 1.0 = fully pressed.
    pub trigger_l2: f32,
    /// R2 trigger. -1.0 = released, 1.0 = fully pressed.
    pub trigger_r2: f32,

    // D-Pad
    /// D-Pad X axis. -1 = left, 0 = center, 1 = right.
    pub dpad_x: i8,
    /// D-Pad Y axis. -1 = down, 0 = center, 1 = up.
    pub dpad_y: i8,

    // Face buttons
    pub btn_a: bool,
    pub btn_b: bool,
    pub btn_x: bool,
    pub btn_y: bool,

    // Shoulder buttons
    pub btn_l1: bool,
    pub btn_r1: bool,

    // System buttons
    pub btn_select: bool,
    pub btn_start: bool,

    // Stick clicks
    pub btn_l3: bool,
    pub btn_r3: bool,

    // Virtual buttons derived from the trigger axes
    /// L2 trigger past the press threshold.
    pub btn_l2: bool,
    /// R2 trigger past the press threshold.
    pub btn_r2: bool,
}

impl Default for EventSnapshot {
    fn default() -> Self {
        Self::rest()
    }
}

impl EventSnapshot {
    /// Canonical untouched state: sticks and d-pad centered, triggers at
    /// -1.0, every button released.
    #[must_use]
    pub fn rest() -> Self {
        Self {
            left_stick_x: 0.0,
            left_stick_y: 0.0,
            right_stick_x: 0.0,
            right_stick_y: 0.0,
            trigger_l2: JoystickAxis::TriggerL2.rest_value(),
            trigger_r2: JoystickAxis::TriggerR2.rest_value(),
            dpad_x: HAT_RELEASED,
            dpad_y: HAT_RELEASED,
            btn_a: false,
            btn_b: false,
            btn_x: false,
            btn_y: false,
            btn_l1: false,
            btn_r1: false,
            btn_select: false,
            btn_start: false,
            btn_l3: false,
            btn_r3: false,
            btn_l2: false,
            btn_r2: false,
        }
    }

    /// Reads an axis value.
    #[must_use]
    pub fn axis(&self, axis: JoystickAxis) -> f32 {
        match axis {
            JoystickAxis::LeftStickX => self.left_stick_x,
            JoystickAxis::LeftStickY => self.left_stick_y,
            JoystickAxis::TriggerL2 => self.trigger_l2,
            JoystickAxis::RightStickX => self.right_stick_x,
            JoystickAxis::RightStickY => self.right_stick_y,
            JoystickAxis::TriggerR2 => self.trigger_r2,
        }
    }

    pub fn set_axis(&mut self, axis: JoystickAxis, value: f32) {
        match axis {
            JoystickAxis::LeftStickX => self.left_stick_x = value,
            JoystickAxis::LeftStickY => self.left_stick_y = value,
            JoystickAxis::TriggerL2 => self.trigger_l2 = value,
            JoystickAxis::RightStickX => self.right_stick_x = value,
            JoystickAxis::RightStickY => self.right_stick_y = value,
            JoystickAxis::TriggerR2 => self.trigger_r2 = value,
        }
    }

    /// Reads a d-pad sub-axis.
    #[must_use]
    pub fn hat(&self, hat: JoystickHat) -> i8 {
        match hat {
            JoystickHat::LeftRight => self.dpad_x,
            JoystickHat::UpDown => self.dpad_y,
        }
    }

    pub fn set_hat(&mut self, hat: JoystickHat, value: i8) {
        match hat {
            JoystickHat::LeftRight => self.dpad_x = value,
            JoystickHat::UpDown => self.dpad_y = value,
        }
    }

    /// Reads a physical or virtual button.
    #[must_use]
    pub fn button(&self, button: JoystickButton) -> bool {
        match button {
            JoystickButton::A => self.btn_a,
            JoystickButton::B => self.btn_b,
            JoystickButton::X => self.btn_x,
            JoystickButton::Y => self.btn_y,
            JoystickButton::L1 => self.btn_l1,
            JoystickButton::R1 => self.btn_r1,
            JoystickButton::Select => self.btn_select,
            JoystickButton::Start => self.btn_start,
            JoystickButton::LeftStick => self.btn_l3,
            JoystickButton::RightStick => self.btn_r3,
            JoystickButton::L2 => self.btn_l2,
            JoystickButton::R2 => self.btn_r2,
        }
    }

    pub fn set_button(&mut self, button: JoystickButton, pressed: bool) {
        match button {
            JoystickButton::A => self.btn_a = pressed,
            JoystickButton::B => self.btn_b = pressed,
            JoystickButton::X => self.btn_x = pressed,
            JoystickButton::Y => self.btn_y = pressed,
            JoystickButton::L1 => self.btn_l1 = pressed,
            JoystickButton::R1 => self.btn_r1 = pressed,
            JoystickButton::Select => self.btn_select = pressed,
            JoystickButton::Start => self.btn_start = pressed,
            JoystickButton::LeftStick => self.btn_l3 = pressed,
            JoystickButton::RightStick => self.btn_r3 = pressed,
            JoystickButton::L2 => self.btn_l2 = pressed,
            JoystickButton::R2 => self.btn_r2 = pressed,
        }
    }

    /// Reads any input as an [`InputValue`].
    #[must_use]
    pub fn value(&self, key: InputKey) -> InputValue {
        match key {
            InputKey::Axis(axis) => InputValue::Level(f64::from(self.axis(axis))),
            InputKey::Hat(hat) => InputValue::Level(f64::from(self.hat(hat))),
            InputKey::Button(button) => InputValue::Pressed(self.button(button)),
        }
    }

    /// Returns true if every input equals its rest value.
    #[must_use]
    pub fn is_at_rest(&self) -> bool {
        *self == Self::rest()
    }

    /// Flattens the snapshot into a map covering every declared input.
    #[must_use]
    pub fn to_event_map(&self) -> EventMap {
        InputKey::all()
            .into_iter()
            .map(|key| (key, self.value(key)))
            .collect()
    }

    /// Rebuilds a snapshot from a map, which must cover exactly the
    /// declared inputs with values of the right kind.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` if keys are missing or unexpected, and
    /// `Recording` if a value has the wrong kind for its key, an axis lies
    /// outside `[-1, 1]`, or a hat is not one of -1, 0 and 1.
    pub fn from_event_map(events: &EventMap) -> Result<Self> {
        check_schema(events)?;

        let mut snapshot = Self::rest();
        for (&key, &value) in events {
            match (key, value) {
                (InputKey::Axis(axis), InputValue::Level(level)) => {
                    if !(-1.0..=1.0).contains(&level) {
                        return Err(out_of_range(key, level));
                    }
                    snapshot.set_axis(axis, level as f32);
                }
                (InputKey::Hat(hat), InputValue::Level(level)) => {
                    let direction = match level {
                        l if l == -1.0 => -1,
                        l if l == 0.0 => 0,
                        l if l == 1.0 => 1,
                        _ => return Err(out_of_range(key, level)),
                    };
                    snapshot.set_hat(hat, direction);
                }
                (InputKey::Button(button), InputValue::Pressed(pressed)) => {
                    snapshot.set_button(button, pressed);
                }
                (key, value) => {
                    return Err(TeleopError::Recording(format!(
                        "{} has a value of the wrong kind: {:?}",
                        key, value
                    )));
                }
            }
        }

        Ok(snapshot)
    }
}

fn out_of_range(key: InputKey, level: f64) -> TeleopError {
    TeleopError::Recording(format!("{} has an out-of-range value: {}", key, level))
}

/// Verifies `events` carries exactly the canonical key set.
fn check_schema(events: &EventMap) -> Result<()> {
    let expected: BTreeSet<InputKey> = InputKey::all().into_iter().collect();
    let actual: BTreeSet<InputKey> = events.keys().copied().collect();

    if expected == actual {
        return Ok(());
    }

    Err(TeleopError::SchemaMismatch {
        missing: expected.difference(&actual).map(ToString::to_string).collect(),
        unexpected: actual.difference(&expected).map(ToString::to_string).collect(),
    })
}

/// Checks whether any input in `events` is away from its rest value.
///
/// # Errors
///
/// Returns `SchemaMismatch` if `events` does not carry exactly the canonical
/// set of inputs. This indicates a programming error or a corrupt recording.
pub fn are_any_buttons_pressed(events: &EventMap) -> Result<bool> {
    check_schema(events)?;
    Ok(*events != EventSnapshot::rest().to_event_map())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_snapshot() {
        let rest = EventSnapshot::rest();
        assert_eq!(rest.trigger_l2, -1.0);
        assert_eq!(rest.trigger_r2, -1.0);
        assert_eq!(rest.left_stick_x, 0.0);
        assert_eq!(rest.dpad_y, HAT_RELEASED);
        for button in JoystickButton::ALL {
            assert!(!rest.button(button));
        }
        assert!(rest.is_at_rest());
        assert_eq!(EventSnapshot::default(), rest);
    }

    #[test]
    fn test_event_map_is_complete() {
        let map = EventSnapshot::rest().to_event_map();
        assert_eq!(map.len(), InputKey::all().len());
        for key in InputKey::all() {
            assert!(map.contains_key(&key), "{} missing", key);
        }
    }

    #[test]
    fn test_rest_not_pressed() {
        let map = EventSnapshot::rest().to_event_map();
        assert!(!are_any_buttons_pressed(&map).unwrap());
    }

    #[test]
    fn test_any_single_button_perturbation_is_pressed() {
        for button in JoystickButton::ALL {
            let mut snapshot = EventSnapshot::rest();
            snapshot.set_button(button, true);
            assert!(
                are_any_buttons_pressed(&snapshot.to_event_map()).unwrap(),
                "Button {:?} should register",
                button
            );
        }
    }

    #[test]
    fn test_any_single_axis_perturbation_is_pressed() {
        for axis in JoystickAxis::ALL {
            let mut snapshot = EventSnapshot::rest();
            snapshot.set_axis(axis, 0.5);
            assert!(
                are_any_buttons_pressed(&snapshot.to_event_map()).unwrap(),
                "Axis {:?} should register",
                axis
            );
        }
    }

    #[test]
    fn test_any_single_hat_perturbation_is_pressed() {
        for hat in JoystickHat::ALL {
            for value in [-1, 1] {
                let mut snapshot = EventSnapshot::rest();
                snapshot.set_hat(hat, value);
                assert!(are_any_buttons_pressed(&snapshot.to_event_map()).unwrap());
            }
        }
    }

    #[test]
    fn test_trigger_at_zero_is_not_rest() {
        // A trigger reading 0.0 is halfway pressed, not released.
        let mut snapshot = EventSnapshot::rest();
        snapshot.trigger_r2 = 0.0;
        assert!(are_any_buttons_pressed(&snapshot.to_event_map()).unwrap());
    }

    #[test]
    fn test_missing_button_key_is_schema_mismatch() {
        let mut map = EventSnapshot::rest().to_event_map();
        map.remove(&InputKey::Button(JoystickButton::Start));

        match are_any_buttons_pressed(&map) {
            Err(TeleopError::SchemaMismatch { missing, unexpected }) => {
                assert_eq!(missing, vec!["button.START_BUTTON".to_string()]);
                assert!(unexpected.is_empty());
            }
            other => panic!("Expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_map_is_schema_mismatch() {
        let map = EventMap::new();
        assert!(matches!(
            are_any_buttons_pressed(&map),
            Err(TeleopError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_accessors_round_trip_through_setters() {
        let mut snapshot = EventSnapshot::rest();
        snapshot.set_axis(JoystickAxis::RightStickY, -0.75);
        snapshot.set_hat(JoystickHat::LeftRight, 1);
        snapshot.set_button(JoystickButton::LeftStick, true);

        assert_eq!(snapshot.right_stick_y, -0.75);
        assert_eq!(snapshot.dpad_x, 1);
        assert!(snapshot.btn_l3);
        assert!(!snapshot.is_at_rest());
    }

    #[test]
    fn test_from_event_map_restores_snapshot() {
        let mut snapshot = EventSnapshot::rest();
        snapshot.left_stick_y = 0.25;
        snapshot.dpad_y = -1;
        snapshot.btn_r1 = true;

        let restored = EventSnapshot::from_event_map(&snapshot.to_event_map()).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_from_event_map_rejects_wrong_value_kind() {
        let mut map = EventSnapshot::rest().to_event_map();
        map.insert(InputKey::Button(JoystickButton::A), InputValue::Level(1.0));
        assert!(matches!(
            EventSnapshot::from_event_map(&map),
            Err(TeleopError::Recording(_))
        ));
    }

    #[test]
    fn test_from_event_map_rejects_fractional_hat() {
        for level in [0.7, 5.0, -2.0, f64::NAN] {
            let mut map = EventSnapshot::rest().to_event_map();
            map.insert(InputKey::Hat(JoystickHat::UpDown), InputValue::Level(level));
            assert!(
                matches!(EventSnapshot::from_event_map(&map), Err(TeleopError::Recording(_))),
                "hat value {} should be rejected",
                level
            );
        }
    }

    #[test]
    fn test_from_event_map_keeps_hat_directions() {
        for direction in [-1i8, 0, 1] {
            let mut map = EventSnapshot::rest().to_event_map();
            map.insert(
                InputKey::Hat(JoystickHat::LeftRight),
                InputValue::Level(f64::from(direction)),
            );
            let snapshot = EventSnapshot::from_event_map(&map).unwrap();
            assert_eq!(snapshot.hat(JoystickHat::LeftRight), direction);
        }
    }

    #[test]
    fn test_from_event_map_rejects_axis_out_of_range() {
        for level in [1.5, -1.01, f64::NAN, f64::INFINITY] {
            let mut map = EventSnapshot::rest().to_event_map();
            map.insert(InputKey::Axis(JoystickAxis::LeftStickX), InputValue::Level(level));
            assert!(
                matches!(EventSnapshot::from_event_map(&map), Err(TeleopError::Recording(_))),
                "axis value {} should be rejected",
                level
            );
        }
    }

    #[test]
    fn test_event_map_json_keys() {
        let json = serde_json::to_string(&EventSnapshot::rest().to_event_map()).unwrap();
        assert!(json.contains("\"axis.L2_BUTTON\":-1.0"));
        assert!(json.contains("\"button.L2_BUTTON\":false"));
        assert!(json.contains("\"hat.UP_DOWN\":0.0"));
    }
}
