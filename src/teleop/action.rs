//! # Action Mapper Module
//!
//! Maps gamepad snapshots and keyboard presses to simulation actions.
//!
//! ## Action Layout
//!
//! | Index | Meaning | Gamepad | Keyboard |
//! |-------|---------|---------|----------|
//! | 0 | Displacement along body x | D-pad left/right | `a` / `d` |
//! | 1 | Spin about world y | Right stick up/down | `q` / `e` |
//! | 2 | Displacement along world y | D-pad up/down | `w` / `s` |
//!
//! Start (gamepad) or `r` (keyboard) requests an environment reset.

use super::render::KeyPress;
use crate::config::TeleopConfig;
use crate::controller::layout::{JoystickAxis, JoystickButton, JoystickHat};
use crate::controller::snapshot::EventSnapshot;

/// Length of the action vector.
pub const ACTION_DIM: usize = 3;

/// Default displacement per step.
pub const DEFAULT_POSITION_STEP: f32 = 0.0025;

/// Default rotation per step, in radians.
pub const DEFAULT_ROTATION_STEP: f32 = 0.05;

/// Action indices for semantic access.
pub mod action {
    /// Displacement along the primitive's body x axis
    pub const BODY_X: usize = 0;
    /// Spin about the world y axis
    pub const YAW: usize = 1;
    /// Displacement along the world y axis
    pub const WORLD_Y: usize = 2;
}

/// One tick worth of operator intent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    pub action: [f32; ACTION_DIM],
    pub reset: bool,
}

impl Command {
    /// Zero action, no reset.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }
}

/// Per-step magnitudes applied to normalized inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionScale {
    pub position_step: f32,
    pub rotation_step: f32,
}

impl Default for ActionScale {
    fn default() -> Self {
        Self {
            position_step: DEFAULT_POSITION_STEP,
            rotation_step: DEFAULT_ROTATION_STEP,
        }
    }
}

impl ActionScale {
    #[must_use]
    pub fn from_config(config: &TeleopConfig) -> Self {
        Self {
            position_step: config.position_step,
            rotation_step: config.rotation_step,
        }
    }
}

/// Maps gamepad snapshots to commands.
///
/// # Examples
///
/// ```
/// use plb_teleop::controller::snapshot::EventSnapshot;
/// use plb_teleop::teleop::action::{action, GamepadActionMapper};
///
/// let mut snapshot = EventSnapshot::rest();
/// snapshot.dpad_x = 1;
///
/// let command = GamepadActionMapper::default().map(&snapshot);
/// assert_eq!(command.action[action::BODY_X], 0.0025);
/// assert!(!command.reset);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct GamepadActionMapper {
    scale: ActionScale,
}

impl GamepadActionMapper {
    #[must_use]
    pub fn new(scale: ActionScale) -> Self {
        Self { scale }
    }

    #[must_use]
    pub fn scale(&self) -> ActionScale {
        self.scale
    }

    #[must_use]
    pub fn map(&self, snapshot: &EventSnapshot) -> Command {
        let mut command = Command::idle();

        command.action[action::BODY_X] =
            f32::from(snapshot.hat(JoystickHat::LeftRight)) * self.scale.position_step;
        command.action[action::YAW] =
            snapshot.axis(JoystickAxis::RightStickY) * self.scale.rotation_step;
        command.action[action::WORLD_Y] =
            f32::from(snapshot.hat(JoystickHat::UpDown)) * self.scale.position_step;
        command.reset = snapshot.button(JoystickButton::Start);

        command
    }
}

/// Maps single key presses to commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyboardActionMapper {
    scale: ActionScale,
}

impl KeyboardActionMapper {
    #[must_use]
    pub fn new(scale: ActionScale) -> Self {
        Self { scale }
    }

    /// Unmapped keys and no key both give an idle command.
    #[must_use]
    pub fn map(&self, key: Option<KeyPress>) -> Command {
        let mut command = Command::idle();
        let p = self.scale.position_step;
        let w = self.scale.rotation_step;

        match key {
            Some(KeyPress::Char('r')) => command.reset = true,
            Some(KeyPress::Char('a')) => command.action[action::BODY_X] = p,
            Some(KeyPress::Char('d')) => command.action[action::BODY_X] = -p,
            Some(KeyPress::Char('w')) => command.action[action::WORLD_Y] = p,
            Some(KeyPress::Char('s')) => command.action[action::WORLD_Y] = -p,
            Some(KeyPress::Char('q')) => command.action[action::YAW] = w,
            Some(KeyPress::Char('e')) => command.action[action::YAW] = -w,
            _ => {}
        }

        command
    }
}
