//! # Gamepad Layout Module
//!
//! Logical input indices of the Logitech F710 in XInput mode.
//!
//! ## Axes
//!
//! | Axis | Index | Range |
//! |------|-------|-------|
//! | Left Stick X | 0 | Left: -1, Right: 1 |
//! | Left Stick Y | 1 | Up: -1, Down: 1 |
//! | L2 Trigger | 2 | Release: -1, Press: 1 |
//! | Right Stick X | 3 | Left: -1, Right: 1 |
//! | Right Stick Y | 4 | Up: -1, Down: 1 |
//! | R2 Trigger | 5 | Release: -1, Press: 1 |
//!
//! ## Hat (D-Pad)
//!
//! A single hat (index 0) with two sub-axes: left-right (0) and up-down (1).
//! Left and down are -1, right and up are 1.
//!
//! ## Buttons
//!
//! | Button | Index | PlayStation equivalent |
//! |--------|-------|------------------------|
//! | A | 0 | Cross |
//! | B | 1 | Circle |
//! | X | 2 | Square |
//! | Y | 3 | Triangle |
//! | L1 | 4 | L1 |
//! | R1 | 5 | R1 |
//! | Select | 6 | Share |
//! | Start | 7 | Options |
//! | Left stick click | 9 | L3 |
//! | Right stick click | 10 | R3 |
//! | L2 (virtual) | 100 | thresholded L2 trigger |
//! | R2 (virtual) | 101 | thresholded R2 trigger |
//!
//! Changing gamepads may change these mappings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware name reported by the supported gamepad.
pub const GAMEPAD_NAME: &str = "Logitech Gamepad F710";

/// First button index used for buttons synthesized from trigger axes.
const VIRTUAL_BUTTON_BASE: u8 = 100;

/// Analog axes, keyed by their logical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoystickAxis {
    LeftStickX,
    LeftStickY,
    TriggerL2,
    RightStickX,
    RightStickY,
    TriggerR2,
}

impl JoystickAxis {
    /// All axes in index order.
    pub const ALL: [JoystickAxis; 6] = [
        JoystickAxis::LeftStickX,
        JoystickAxis::LeftStickY,
        JoystickAxis::TriggerL2,
        JoystickAxis::RightStickX,
        JoystickAxis::RightStickY,
        JoystickAxis::TriggerR2,
    ];

    /// Trigger axes, which rest at -1.0 rather than 0.0.
    pub const TRIGGERS: [JoystickAxis; 2] = [JoystickAxis::TriggerL2, JoystickAxis::TriggerR2];

    /// Logical axis index on the device.
    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            JoystickAxis::LeftStickX => 0,
            JoystickAxis::LeftStickY => 1,
            JoystickAxis::TriggerL2 => 2,
            JoystickAxis::RightStickX => 3,
            JoystickAxis::RightStickY => 4,
            JoystickAxis::TriggerR2 => 5,
        }
    }

    /// Returns true for the L2/R2 trigger axes.
    #[must_use]
    pub fn is_trigger(self) -> bool {
        matches!(self, JoystickAxis::TriggerL2 | JoystickAxis::TriggerR2)
    }

    /// Value reported when the input is untouched.
    #[must_use]
    pub fn rest_value(self) -> f32 {
        if self.is_trigger() {
            -1.0
        } else {
            0.0
        }
    }

    /// Stable name used in event maps and recordings.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            JoystickAxis::LeftStickX => "LEFTJOY_LEFT_RIGHT",
            JoystickAxis::LeftStickY => "LEFTJOY_UP_DOWN",
            JoystickAxis::TriggerL2 => "L2_BUTTON",
            JoystickAxis::RightStickX => "RIGHTJOY_LEFT_RIGHT",
            JoystickAxis::RightStickY => "RIGHTJOY_UP_DOWN",
            JoystickAxis::TriggerR2 => "R2_BUTTON",
        }
    }

    /// Looks up an axis by its stable name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.name() == name)
    }
}

/// D-Pad sub-axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoystickHat {
    LeftRight,
    UpDown,
}

impl JoystickHat {
    /// All hat sub-axes.
    pub const ALL: [JoystickHat; 2] = [JoystickHat::LeftRight, JoystickHat::UpDown];

    /// Returns `(hat index, sub-index)`.
    #[must_use]
    pub fn index(self) -> (u8, usize) {
        match self {
            JoystickHat::LeftRight => (0, 0),
            JoystickHat::UpDown => (0, 1),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            JoystickHat::LeftRight => "LEFT_RIGHT",
            JoystickHat::UpDown => "UP_DOWN",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|hat| hat.name() == name)
    }
}

/// Physical and virtual buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoystickButton {
    A,
    B,
    X,
    Y,
    L1,
    R1,
    Select,
    Start,
    LeftStick,
    RightStick,
    L2,
    R2,
}

impl JoystickButton {
    /// All buttons, physical first.
    pub const ALL: [JoystickButton; 12] = [
        JoystickButton::A,
        JoystickButton::B,
        JoystickButton::X,
        JoystickButton::Y,
        JoystickButton::L1,
        JoystickButton::R1,
        JoystickButton::Select,
        JoystickButton::Start,
        JoystickButton::LeftStick,
        JoystickButton::RightStick,
        JoystickButton::L2,
        JoystickButton::R2,
    ];

    /// Logical button index. Virtual buttons start at 100.
    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            JoystickButton::A => 0,
            JoystickButton::B => 1,
            JoystickButton::X => 2,
            JoystickButton::Y => 3,
            JoystickButton::L1 => 4,
            JoystickButton::R1 => 5,
            JoystickButton::Select => 6,
            JoystickButton::Start => 7,
            JoystickButton::LeftStick => 9,
            JoystickButton::RightStick => 10,
            JoystickButton::L2 => VIRTUAL_BUTTON_BASE,
            JoystickButton::R2 => VIRTUAL_BUTTON_BASE + 1,
        }
    }

    /// Virtual buttons are derived from trigger axes, not read from hardware.
    #[must_use]
    pub fn is_virtual(self) -> bool {
        self.index() >= VIRTUAL_BUTTON_BASE
    }

    /// Trigger axis a virtual button is derived from.
    #[must_use]
    pub fn source_trigger(self) -> Option<JoystickAxis> {
        match self {
            JoystickButton::L2 => Some(JoystickAxis::TriggerL2),
            JoystickButton::R2 => Some(JoystickAxis::TriggerR2),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            JoystickButton::A => "A_BUTTON",
            JoystickButton::B => "B_BUTTON",
            JoystickButton::X => "X_BUTTON",
            JoystickButton::Y => "Y_BUTTON",
            JoystickButton::L1 => "L1_BUTTON",
            JoystickButton::R1 => "R1_BUTTON",
            JoystickButton::Select => "SELECT_BUTTON",
            JoystickButton::Start => "START_BUTTON",
            JoystickButton::LeftStick => "LEFTJOY_PRESSED",
            JoystickButton::RightStick => "RIGHTJOY_PRESSED",
            JoystickButton::L2 => "L2_BUTTON",
            JoystickButton::R2 => "R2_BUTTON",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|button| button.name() == name)
    }
}

/// Any named input on the gamepad.
///
/// Serialized as `"<kind>.<NAME>"`, e.g. `"axis.L2_BUTTON"` or
/// `"button.L2_BUTTON"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum InputKey {
    Axis(JoystickAxis),
    Hat(JoystickHat),
    Button(JoystickButton),
}

impl InputKey {
    /// Every declared input, in a fixed order.
    #[must_use]
    pub fn all() -> Vec<InputKey> {
        JoystickAxis::ALL
            .into_iter()
            .map(InputKey::Axis)
            .chain(JoystickHat::ALL.into_iter().map(InputKey::Hat))
            .chain(JoystickButton::ALL.into_iter().map(InputKey::Button))
            .collect()
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKey::Axis(axis) => write!(f, "axis.{}", axis.name()),
            InputKey::Hat(hat) => write!(f, "hat.{}", hat.name()),
            InputKey::Button(button) => write!(f, "button.{}", button.name()),
        }
    }
}

impl std::str::FromStr for InputKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once('.')
            .ok_or_else(|| format!("input key {:?} has no kind prefix", s))?;

        let key = match kind {
            "axis" => JoystickAxis::from_name(name).map(InputKey::Axis),
            "hat" => JoystickHat::from_name(name).map(InputKey::Hat),
            "button" => JoystickButton::from_name(name).map(InputKey::Button),
            _ => None,
        };

        key.ok_or_else(|| format!("unknown input key {:?}", s))
    }
}

impl From<InputKey> for String {
    fn from(key: InputKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for InputKey {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_indices_are_unique() {
        let mut indices: Vec<u8> = JoystickAxis::ALL.iter().map(|a| a.index()).collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_trigger_axes() {
        assert_eq!(JoystickAxis::TriggerL2.index(), 2);
        assert_eq!(JoystickAxis::TriggerR2.index(), 5);
        for axis in JoystickAxis::ALL {
            assert_eq!(axis.is_trigger(), JoystickAxis::TRIGGERS.contains(&axis));
        }
    }

    #[test]
    fn test_rest_values() {
        assert_eq!(JoystickAxis::TriggerL2.rest_value(), -1.0);
        assert_eq!(JoystickAxis::TriggerR2.rest_value(), -1.0);
        assert_eq!(JoystickAxis::LeftStickX.rest_value(), 0.0);
        assert_eq!(JoystickAxis::RightStickY.rest_value(), 0.0);
    }

    #[test]
    fn test_virtual_buttons() {
        let virtual_buttons: Vec<_> = JoystickButton::ALL
            .into_iter()
            .filter(|b| b.is_virtual())
            .collect();
        assert_eq!(virtual_buttons, vec![JoystickButton::L2, JoystickButton::R2]);
        assert_eq!(JoystickButton::L2.source_trigger(), Some(JoystickAxis::TriggerL2));
        assert_eq!(JoystickButton::R2.source_trigger(), Some(JoystickAxis::TriggerR2));
        assert_eq!(JoystickButton::A.source_trigger(), None);
    }

    #[test]
    fn test_stick_clicks_skip_index_eight() {
        assert_eq!(JoystickButton::Start.index(), 7);
        assert_eq!(JoystickButton::LeftStick.index(), 9);
        assert_eq!(JoystickButton::RightStick.index(), 10);
    }

    #[test]
    fn test_hat_indices() {
        assert_eq!(JoystickHat::LeftRight.index(), (0, 0));
        assert_eq!(JoystickHat::UpDown.index(), (0, 1));
    }

    #[test]
    fn test_all_keys_count() {
        // 6 axes + 2 hat sub-axes + 12 buttons
        assert_eq!(InputKey::all().len(), 20);
    }

    #[test]
    fn test_key_names_parse_back() {
        for key in InputKey::all() {
            let parsed: InputKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
    }

    #[test]
    fn test_axis_and_button_share_name_but_not_key() {
        let axis = InputKey::Axis(JoystickAxis::TriggerL2).to_string();
        let button = InputKey::Button(JoystickButton::L2).to_string();
        assert_eq!(axis, "axis.L2_BUTTON");
        assert_eq!(button, "button.L2_BUTTON");
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!("button.HOME_BUTTON".parse::<InputKey>().is_err());
        assert!("trigger.L2_BUTTON".parse::<InputKey>().is_err());
        assert!("A_BUTTON".parse::<InputKey>().is_err());
    }
}
