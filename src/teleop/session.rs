//! # Teleop Session Module
//!
//! One [`TeleopSession::tick`] runs a single control step:
//!
//! 1. Poll the renderer for a key; Escape ends the session.
//! 2. Ask the [`ControlSource`] for a [`Command`].
//! 3. Reset the environment and renderer if the command asks for it.
//! 4. Step the environment and log how long the step took.
//! 5. Render and show the resulting frame.
//!
//! The caller owns pacing. The binary drives `tick` from a tokio interval.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::action::{Command, GamepadActionMapper, KeyboardActionMapper, ACTION_DIM};
use super::env::{RenderMode, SimulationEnv};
use super::render::{FrameHistory, KeyPress, Renderer};
use crate::controller::translator::InputTranslator;
use crate::error::{Result, TeleopError};
use crate::telemetry::SnapshotRecorder;

/// Produces one command per tick.
pub trait ControlSource {
    /// `key` is the key the renderer reported this tick, if any.
    fn next_command(&mut self, key: Option<KeyPress>) -> Result<Command>;
}

/// Gamepad-driven control with optional snapshot recording.
#[derive(Debug)]
pub struct GamepadControl {
    translator: InputTranslator,
    mapper: GamepadActionMapper,
    recorder: Option<SnapshotRecorder>,
}

impl GamepadControl {
    #[must_use]
    pub fn new(translator: InputTranslator, mapper: GamepadActionMapper) -> Self {
        Self {
            translator,
            mapper,
            recorder: None,
        }
    }

    /// Records every polled snapshot.
    #[must_use]
    pub fn with_recorder(mut self, recorder: SnapshotRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    #[must_use]
    pub fn recorder(&self) -> Option<&SnapshotRecorder> {
        self.recorder.as_ref()
    }

    /// Resolves once every input on the gamepad is back at rest.
    ///
    /// `sleep(poll_interval)` is awaited after each poll that still sees
    /// input, so dropping the future between polls cancels the wait.
    /// Returns the number of polls that saw input.
    ///
    /// # Errors
    ///
    /// Device errors propagate unmodified.
    pub async fn wait_for_release<S, F>(
        &mut self,
        poll_interval: Duration,
        mut sleep: S,
    ) -> Result<usize>
    where
        S: FnMut(Duration) -> F,
        F: Future<Output = ()>,
    {
        info!("Please release any buttons...");
        let mut waits = 0;
        while !self.translator.can_reset()? {
            waits += 1;
            sleep(poll_interval).await;
        }
        info!("  Done");
        Ok(waits)
    }
}

impl ControlSource for GamepadControl {
    fn next_command(&mut self, _key: Option<KeyPress>) -> Result<Command> {
        let snapshot = self.translator.poll()?;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(&snapshot.to_event_map())?;
        }
        Ok(self.mapper.map(&snapshot))
    }
}

/// Keyboard-driven control.
#[derive(Debug, Default)]
pub struct KeyboardControl {
    mapper: KeyboardActionMapper,
}

impl KeyboardControl {
    #[must_use]
    pub fn new(mapper: KeyboardActionMapper) -> Self {
        Self { mapper }
    }
}

impl ControlSource for KeyboardControl {
    fn next_command(&mut self, key: Option<KeyPress>) -> Result<Command> {
        Ok(self.mapper.map(key))
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Continue { step_time: Duration },
    Exit,
}

/// Interactive control loop state.
#[derive(Debug)]
pub struct TeleopSession<E, R, C> {
    env: E,
    renderer: R,
    control: C,
    steps: u64,
    resets: u64,
}

impl<E, R, C> TeleopSession<E, R, C>
where
    E: SimulationEnv,
    R: Renderer,
    C: ControlSource,
{
    /// # Errors
    ///
    /// Returns `ActionDimension` if the environment does not take 3-D
    /// actions.
    pub fn new(env: E, renderer: R, control: C) -> Result<Self> {
        if env.action_dim() != ACTION_DIM {
            return Err(TeleopError::ActionDimension {
                expected: ACTION_DIM,
                actual: env.action_dim(),
            });
        }

        Ok(Self {
            env,
            renderer,
            control,
            steps: 0,
            resets: 0,
        })
    }

    /// Runs one control step.
    ///
    /// # Errors
    ///
    /// Errors from the control source, environment and renderer propagate
    /// unmodified.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let key = self.renderer.poll_key();
        if key == Some(KeyPress::Escape) {
            info!("Escape pressed, ending session");
            return Ok(TickOutcome::Exit);
        }

        let command = self.control.next_command(key)?;
        if command.reset {
            self.env.reset()?;
            self.renderer.reset();
            self.resets += 1;
            info!("Environment reset");
        }

        debug!("{:?}", command.action);

        let start = Instant::now();
        self.env.step(&command.action)?;
        let step_time = start.elapsed();
        debug!("  dt_step: {:?}", step_time);
        self.steps += 1;

        let frame = self.env.render(RenderMode::Rgb)?;
        self.renderer.show(&frame)?;

        Ok(TickOutcome::Continue { step_time })
    }

    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    #[must_use]
    pub fn resets(&self) -> u64 {
        self.resets
    }

    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[must_use]
    pub fn control(&self) -> &C {
        &self.control
    }
}

/// Runs a full episode of zero actions and keeps every rendered frame.
///
/// # Errors
///
/// Environment errors propagate unmodified.
pub fn rollout<E: SimulationEnv>(env: &mut E) -> Result<FrameHistory> {
    let steps = env.max_episode_steps();
    let action = vec![0.0; env.action_dim()];
    let mut history = FrameHistory::new();

    for idx in 0..steps {
        debug!("idx: {}", idx);
        env.step(&action)?;
        history.push(env.render(RenderMode::Rgb)?);
    }

    info!("Recorded {} frames, press a / d to move back/forward in time", history.len());
    Ok(history)
}

/// Handles one scrub poll: moves the cursor on `a`/`d` and shows the frame
/// under it. Returns false once Escape is pressed.
///
/// # Errors
///
/// Renderer errors propagate unmodified.
pub fn scrub_tick<R: Renderer>(history: &mut FrameHistory, renderer: &mut R) -> Result<bool> {
    match renderer.poll_key() {
        Some(KeyPress::Escape) => return Ok(false),
        Some(key) => {
            if history.scrub(key) {
                info!("idx: {}", history.cursor());
            }
        }
        None => {}
    }

    if let Some(frame) = history.current() {
        renderer.show(frame)?;
    }
    Ok(true)
}
