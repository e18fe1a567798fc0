//! # Gamepad Device Module
//!
//! Device abstraction and the Linux evdev backend.
//!
//! ## Device Detection
//!
//! Gamepads are found by scanning `/dev/input/event*` in numeric order and
//! keeping every device that exposes the gamepad button block (`BTN_SOUTH`).
//! The N-th such device is gamepad index N.
//!
//! ## Input Codes
//!
//! | Logical input | evdev code |
//! |---------------|------------|
//! | Axis 0-5 | ABS_X, ABS_Y, ABS_Z, ABS_RX, ABS_RY, ABS_RZ |
//! | Hat 0 | ABS_HAT0X, ABS_HAT0Y (Y negated: up = +1) |
//! | Buttons 0-3 | BTN_SOUTH, BTN_EAST, BTN_NORTH, BTN_WEST |
//! | Buttons 4-7 | BTN_TL, BTN_TR, BTN_SELECT, BTN_START |
//! | Buttons 8-10 | BTN_MODE, BTN_THUMBL, BTN_THUMBR |

use evdev::{AbsoluteAxisType, Device, Key};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, TeleopError};

/// Axis codes in logical index order.
const AXIS_CODES: [AbsoluteAxisType; 6] = [
    AbsoluteAxisType::ABS_X,
    AbsoluteAxisType::ABS_Y,
    AbsoluteAxisType::ABS_Z,
    AbsoluteAxisType::ABS_RX,
    AbsoluteAxisType::ABS_RY,
    AbsoluteAxisType::ABS_RZ,
];

/// Button codes in logical index order.
const BUTTON_CODES: [Key; 11] = [
    Key::BTN_SOUTH,
    Key::BTN_EAST,
    Key::BTN_NORTH,
    Key::BTN_WEST,
    Key::BTN_TL,
    Key::BTN_TR,
    Key::BTN_SELECT,
    Key::BTN_START,
    Key::BTN_MODE,
    Key::BTN_THUMBL,
    Key::BTN_THUMBR,
];

/// A joystick-style input device read by logical index.
///
/// Values are cached: they only change when [`GamepadDevice::pump`] is
/// called.
#[cfg_attr(test, mockall::automock)]
pub trait GamepadDevice {
    /// Human-readable hardware name.
    fn name(&self) -> String;

    /// Index the device was opened at.
    fn index(&self) -> usize;

    /// Refreshes the cached device state. Must be called before reading.
    fn pump(&mut self) -> Result<()>;

    /// Axis value in `-1.0..=1.0`. Unknown axes read `0.0`.
    fn axis(&self, index: u8) -> f32;

    /// Hat `(x, y)` with values in `{-1, 0, 1}`, up and right positive.
    fn hat(&self, index: u8) -> (i8, i8);

    /// Button state. Unknown buttons read released.
    fn button(&self, index: u8) -> bool;
}

/// Opens gamepads by index.
pub trait GamepadBackend {
    fn open(&mut self, index: usize) -> Result<Box<dyn GamepadDevice>>;
}

/// Summary of a detected gamepad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadInfo {
    pub index: usize,
    pub path: PathBuf,
    pub name: String,
    pub vendor: u16,
    pub product: u16,
}

/// Linux evdev gamepad.
pub struct EvdevGamepad {
    device: Device,
    index: usize,
    device_path: String,
    axes: [f32; AXIS_CODES.len()],
    hat: (i8, i8),
    buttons: [bool; BUTTON_CODES.len()],
}

impl std::fmt::Debug for EvdevGamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevGamepad")
            .field("index", &self.index)
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl EvdevGamepad {
    /// Opens the gamepad at `index` in detection order.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: fewer than `index + 1` gamepads are connected
    /// - `Controller`: `/dev/input` is missing or unreadable
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use plb_teleop::controller::device::{EvdevGamepad, GamepadDevice};
    ///
    /// let gamepad = EvdevGamepad::open(0)?;
    /// println!("Connected to {}", gamepad.name());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(index: usize) -> Result<Self> {
        let (path, device) = scan_gamepads()?
            .into_iter()
            .nth(index)
            .ok_or(TeleopError::ControllerNotFound(index))?;

        let device_path = path.to_string_lossy().to_string();
        info!(
            "Opened gamepad {} ({}) at: {}",
            index,
            device.name().unwrap_or("unknown"),
            device_path
        );

        Ok(Self {
            device,
            index,
            device_path,
            axes: [0.0; AXIS_CODES.len()],
            hat: (0, 0),
            buttons: [false; BUTTON_CODES.len()],
        })
    }

    /// Get the device path of this gamepad
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl GamepadDevice for EvdevGamepad {
    fn name(&self) -> String {
        self.device.name().unwrap_or_default().to_string()
    }

    fn index(&self) -> usize {
        self.index
    }

    fn pump(&mut self) -> Result<()> {
        let abs = self
            .device
            .get_abs_state()
            .map_err(|e| TeleopError::Controller(format!("Failed to read axes: {}", e)))?;

        for (slot, code) in self.axes.iter_mut().zip(AXIS_CODES) {
            let info = abs[code.0 as usize];
            *slot = normalize_axis(info.value, info.minimum, info.maximum);
        }

        let hat_x = abs[AbsoluteAxisType::ABS_HAT0X.0 as usize].value;
        let hat_y = abs[AbsoluteAxisType::ABS_HAT0Y.0 as usize].value;
        self.hat = (hat_x.signum() as i8, -(hat_y.signum() as i8));

        let keys = self
            .device
            .get_key_state()
            .map_err(|e| TeleopError::Controller(format!("Failed to read buttons: {}", e)))?;

        for (slot, code) in self.buttons.iter_mut().zip(BUTTON_CODES) {
            *slot = keys.contains(code);
        }

        Ok(())
    }

    fn axis(&self, index: u8) -> f32 {
        self.axes.get(index as usize).copied().unwrap_or(0.0)
    }

    fn hat(&self, index: u8) -> (i8, i8) {
        if index == 0 {
            self.hat
        } else {
            (0, 0)
        }
    }

    fn button(&self, index: u8) -> bool {
        self.buttons.get(index as usize).copied().unwrap_or(false)
    }
}

/// Backend opening [`EvdevGamepad`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvdevBackend;

impl GamepadBackend for EvdevBackend {
    fn open(&mut self, index: usize) -> Result<Box<dyn GamepadDevice>> {
        Ok(Box::new(EvdevGamepad::open(index)?))
    }
}

/// Lists connected gamepads in index order.
pub fn list_gamepads() -> Result<Vec<GamepadInfo>> {
    Ok(scan_gamepads()?
        .into_iter()
        .enumerate()
        .map(|(index, (path, device))| {
            let id = device.input_id();
            GamepadInfo {
                index,
                path,
                name: device.name().unwrap_or_default().to_string(),
                vendor: id.vendor(),
                product: id.product(),
            }
        })
        .collect())
}

/// Maps a raw absolute value from `[minimum, maximum]` to `[-1.0, 1.0]`.
#[must_use]
pub fn normalize_axis(value: i32, minimum: i32, maximum: i32) -> f32 {
    if maximum <= minimum {
        return 0.0;
    }
    let span = (i64::from(maximum) - i64::from(minimum)) as f32;
    let offset = (i64::from(value) - i64::from(minimum)) as f32;
    (2.0 * offset / span - 1.0).clamp(-1.0, 1.0)
}

/// Numeric suffix of an `eventN` file name.
fn event_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// Opens every gamepad under `/dev/input`, sorted by event number.
fn scan_gamepads() -> Result<Vec<(PathBuf, Device)>> {
    let input_dir = Path::new("/dev/input");

    if !input_dir.exists() {
        return Err(TeleopError::Controller(
            "/dev/input directory not found".to_string(),
        ));
    }

    let mut paths: Vec<(u32, PathBuf)> = std::fs::read_dir(input_dir)
        .map_err(|e| TeleopError::Controller(format!("Failed to read /dev/input: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TeleopError::Controller(format!("Failed to read directory entry: {}", e)))?
        .into_iter()
        .filter_map(|entry| {
            let path = entry.path();
            event_number(&path).map(|n| (n, path))
        })
        .collect();

    // Deterministic indices when several gamepads are connected
    paths.sort_by_key(|(n, _)| *n);

    let mut gamepads = Vec::new();
    for (_, path) in paths {
        match Device::open(&path) {
            Ok(device) => {
                let is_gamepad = device
                    .supported_keys()
                    .map_or(false, |keys| keys.contains(Key::BTN_SOUTH));

                debug!(
                    "Found input device: {} ({:?}, gamepad: {})",
                    path.display(),
                    device.name(),
                    is_gamepad
                );

                if is_gamepad {
                    gamepads.push((path, device));
                }
            }
            Err(e) => {
                // Permission denied or other errors - skip device
                debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    Ok(gamepads)
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    use crate::controller::registry::SharedGamepad;

    /// Raw device state for one pump.
    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    pub struct RawFrame {
        pub axes: [f32; 6],
        pub hat: (i8, i8),
        pub buttons: [bool; 11],
    }

    impl RawFrame {
        /// Device state right after connecting: triggers report 0.0.
        pub fn cold() -> Self {
            Self::default()
        }

        /// Released state with triggers at -1.0.
        pub fn released() -> Self {
            let mut frame = Self::default();
            frame.axes[2] = -1.0;
            frame.axes[5] = -1.0;
            frame
        }

        pub fn with_axis(mut self, index: usize, value: f32) -> Self {
            self.axes[index] = value;
            self
        }

        pub fn with_hat(mut self, x: i8, y: i8) -> Self {
            self.hat = (x, y);
            self
        }

        pub fn with_button(mut self, index: usize) -> Self {
            self.buttons[index] = true;
            self
        }
    }

    /// Gamepad replaying a script of frames, one per pump.
    ///
    /// Once the script runs out the last frame stays current.
    pub struct ScriptedGamepad {
        pub name: String,
        pub index: usize,
        pub frames: VecDeque<RawFrame>,
        pub current: RawFrame,
        pub pumps: Rc<Cell<usize>>,
        pub fail_pump: bool,
    }

    impl ScriptedGamepad {
        pub fn new(name: &str, frames: Vec<RawFrame>) -> Self {
            Self {
                name: name.to_string(),
                index: 0,
                frames: frames.into(),
                current: RawFrame::cold(),
                pumps: Rc::new(Cell::new(0)),
                fail_pump: false,
            }
        }

        pub fn f710(frames: Vec<RawFrame>) -> Self {
            Self::new("Logitech Gamepad F710", frames)
        }

        pub fn into_shared(self) -> SharedGamepad {
            let device: Box<dyn GamepadDevice> = Box::new(self);
            Rc::new(RefCell::new(device))
        }
    }

    impl GamepadDevice for ScriptedGamepad {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn index(&self) -> usize {
            self.index
        }

        fn pump(&mut self) -> Result<()> {
            if self.fail_pump {
                return Err(TeleopError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "Mock device disconnected",
                )));
            }
            self.pumps.set(self.pumps.get() + 1);
            if let Some(frame) = self.frames.pop_front() {
                self.current = frame;
            }
            Ok(())
        }

        fn axis(&self, index: u8) -> f32 {
            self.current.axes.get(index as usize).copied().unwrap_or(0.0)
        }

        fn hat(&self, index: u8) -> (i8, i8) {
            if index == 0 {
                self.current.hat
            } else {
                (0, 0)
            }
        }

        fn button(&self, index: u8) -> bool {
            self.current.buttons.get(index as usize).copied().unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_full_range() {
        assert_eq!(normalize_axis(0, 0, 255), -1.0);
        assert_eq!(normalize_axis(255, 0, 255), 1.0);
        assert_eq!(normalize_axis(-32768, -32768, 32767), -1.0);
        assert_eq!(normalize_axis(32767, -32768, 32767), 1.0);
    }

    #[test]
    fn test_normalize_center() {
        let centered = normalize_axis(0, -32768, 32767);
        assert!(centered.abs() < 0.001);
    }

    #[test]
    fn test_normalize_clamps_out_of_range() {
        assert_eq!(normalize_axis(300, 0, 255), 1.0);
        assert_eq!(normalize_axis(-10, 0, 255), -1.0);
    }

    #[test]
    fn test_normalize_degenerate_range() {
        assert_eq!(normalize_axis(5, 0, 0), 0.0);
        assert_eq!(normalize_axis(5, 10, 0), 0.0);
    }

    #[test]
    fn test_event_number() {
        assert_eq!(event_number(Path::new("/dev/input/event12")), Some(12));
        assert_eq!(event_number(Path::new("/dev/input/event0")), Some(0));
        assert_eq!(event_number(Path::new("/dev/input/js0")), None);
        assert_eq!(event_number(Path::new("/dev/input/mice")), None);
    }

    #[test]
    fn test_code_tables_cover_layout() {
        use crate::controller::layout::{JoystickAxis, JoystickButton};

        for axis in JoystickAxis::ALL {
            assert!((axis.index() as usize) < AXIS_CODES.len());
        }
        for button in JoystickButton::ALL.into_iter().filter(|b| !b.is_virtual()) {
            assert!((button.index() as usize) < BUTTON_CODES.len());
        }
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_open_with_real_hardware() {
        // This test requires a connected gamepad
        let mut gamepad = EvdevGamepad::open(0).expect("Gamepad not found");
        assert!(gamepad.device_path().starts_with("/dev/input/event"));
        assert!(!gamepad.name().is_empty());
        gamepad.pump().expect("Failed to read gamepad state");
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_list_gamepads_with_real_hardware() {
        let gamepads = list_gamepads().expect("Failed to scan /dev/input");
        assert!(!gamepads.is_empty(), "Should detect a connected gamepad");
        for (i, info) in gamepads.iter().enumerate() {
            assert_eq!(info.index, i);
        }
    }
}
