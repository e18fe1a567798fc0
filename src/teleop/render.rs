//! # Rendering Collaborator Module
//!
//! Frames, the renderer seam and frame history.
//!
//! A [`Frame`] is an `H x W x 3` RGB byte image. The [`Renderer`] trait is
//! the only thing the teleop loop knows about the display: it shows frames
//! and reports the last key pressed. Keys are used for the exit and reset
//! gestures and, in keyboard mode, for motion.

use std::collections::VecDeque;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::error::{Result, TeleopError};

/// RGB image stored row-major as `height * width * 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Creates a black frame.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Wraps raw RGB bytes.
    ///
    /// # Errors
    ///
    /// Returns `Render` if `data` is not exactly `width * height * 3` bytes.
    pub fn from_rgb(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if data.len() != width * height * 3 {
            return Err(TeleopError::Render(format!(
                "expected {} bytes for a {}x{} frame, got {}",
                width * height * 3,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn as_rgb(&self) -> &[u8] {
        &self.data
    }

    /// Returns the pixel at column `x`, row `y`, or `None` outside the frame.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Sets a pixel. Writes outside the frame are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Same image with red and blue swapped.
    #[must_use]
    pub fn to_bgr(&self) -> Self {
        let mut data = self.data.clone();
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// A key reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    Char(char),
    Escape,
}

/// Display collaborator used by the teleop loop.
pub trait Renderer {
    /// Displays one frame.
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Returns the key pressed since the last call, if any.
    fn poll_key(&mut self) -> Option<KeyPress>;

    /// Called when the environment is reset.
    fn reset(&mut self) {}
}

/// Renderer without a window: keeps the last frame and replays scripted keys.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    keys: VecDeque<KeyPress>,
    last_frame: Option<Frame>,
    frames_shown: u64,
    resets: u64,
}

impl HeadlessRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer that reports `keys` one per poll, then nothing.
    #[must_use]
    pub fn with_keys(keys: impl IntoIterator<Item = KeyPress>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    #[must_use]
    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    #[must_use]
    pub fn resets(&self) -> u64 {
        self.resets
    }
}

impl Renderer for HeadlessRenderer {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.frames_shown += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }

    fn poll_key(&mut self) -> Option<KeyPress> {
        self.keys.pop_front()
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

/// Headless renderer fed keys through a channel.
///
/// The binary forwards terminal input into the channel; each poll yields at
/// most one queued key without blocking.
#[derive(Debug)]
pub struct ChannelRenderer {
    inner: HeadlessRenderer,
    keys: UnboundedReceiver<KeyPress>,
}

impl ChannelRenderer {
    #[must_use]
    pub fn new(keys: UnboundedReceiver<KeyPress>) -> Self {
        Self {
            inner: HeadlessRenderer::new(),
            keys,
        }
    }

    #[must_use]
    pub fn frames_shown(&self) -> u64 {
        self.inner.frames_shown()
    }
}

impl Renderer for ChannelRenderer {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.inner.show(frame)
    }

    fn poll_key(&mut self) -> Option<KeyPress> {
        self.keys.try_recv().ok()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Parses one line of terminal input into key presses.
///
/// `esc` (any case) is Escape; otherwise every non-whitespace character is
/// one key, lowercased.
#[must_use]
pub fn parse_key_line(line: &str) -> Vec<KeyPress> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("esc") {
        return vec![KeyPress::Escape];
    }
    line.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| KeyPress::Char(c.to_ascii_lowercase()))
        .collect()
}

/// Recorded frames of a rollout, with a scrub cursor.
///
/// `a` moves one frame back and `d` one frame forward; the cursor is
/// clamped to the recorded range.
#[derive(Debug, Default, Clone)]
pub struct FrameHistory {
    frames: Vec<Frame>,
    cursor: usize,
}

impl FrameHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame and moves the cursor onto it.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
        self.cursor = self.frames.len() - 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Frame under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&Frame> {
        self.frames.get(self.cursor)
    }

    /// Moves the cursor for a scrub key. Returns true if it moved.
    pub fn scrub(&mut self, key: KeyPress) -> bool {
        if self.frames.is_empty() {
            return false;
        }

        let previous = self.cursor;
        match key {
            KeyPress::Char('a') => self.cursor = self.cursor.saturating_sub(1),
            KeyPress::Char('d') => self.cursor = (self.cursor + 1).min(self.frames.len() - 1),
            _ => {}
        }

        if self.cursor != previous {
            debug!("Frame cursor: {}", self.cursor);
            return true;
        }
        false
    }
}
