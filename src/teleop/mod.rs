//! # Teleop Module
//!
//! Drives a simulation environment from operator input.
//!
//! This module handles:
//! - Mapping gamepad snapshots and key presses to 3-D actions
//! - Waiting for the gamepad to be released before control starts
//! - Stepping, timing and rendering the environment each tick
//! - Recording zero-action rollouts for frame-by-frame replay

pub mod action;
pub mod env;
pub mod render;
pub mod session;

pub use action::{ActionScale, Command, GamepadActionMapper, KeyboardActionMapper, ACTION_DIM};
pub use env::{EnvState, KinematicPrimitive, RenderMode, SimulationEnv};
pub use render::{ChannelRenderer, Frame, FrameHistory, HeadlessRenderer, KeyPress, Renderer};
pub use session::{
    rollout, scrub_tick, ControlSource, GamepadControl, KeyboardControl, TeleopSession,
    TickOutcome,
};
