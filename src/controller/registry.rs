//! # Gamepad Registry Module
//!
//! Hands out shared device handles, at most one live binding per index.
//!
//! Pumping the same hardware queue from two independent handles would drop
//! or duplicate events, so every [`InputTranslator`](super::translator::InputTranslator)
//! for a given index shares one [`SharedGamepad`]. The registry only keeps
//! weak references: once the last handle is dropped the device is closed and
//! the next [`GamepadRegistry::bind`] opens it again.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, info};

use super::device::{GamepadBackend, GamepadDevice};
use crate::error::{Result, TeleopError};

/// Shared, single-threaded handle to an open gamepad.
pub type SharedGamepad = Rc<RefCell<Box<dyn GamepadDevice>>>;

/// Registry of open gamepads keyed by device index.
pub struct GamepadRegistry<B: GamepadBackend> {
    backend: B,
    bound: HashMap<usize, Weak<RefCell<Box<dyn GamepadDevice>>>>,
}

impl<B: GamepadBackend> GamepadRegistry<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            bound: HashMap::new(),
        }
    }

    /// Returns the live handle for `index`, opening the device if needed.
    ///
    /// # Errors
    ///
    /// - Any error from the backend while opening the device
    /// - `DeviceIndexMismatch` if the opened device reports another index
    pub fn bind(&mut self, index: usize) -> Result<SharedGamepad> {
        if let Some(handle) = self.bound.get(&index).and_then(Weak::upgrade) {
            debug!("Reusing gamepad binding for index {}", index);
            return Ok(handle);
        }

        let device = self.backend.open(index)?;
        let reported = device.index();
        if reported != index {
            return Err(TeleopError::DeviceIndexMismatch {
                requested: index,
                reported,
            });
        }

        info!("Bound gamepad {} ({})", index, device.name());
        let handle: SharedGamepad = Rc::new(RefCell::new(device));
        self.bound.insert(index, Rc::downgrade(&handle));
        Ok(handle)
    }

    /// Returns true if a live handle exists for `index`.
    #[must_use]
    pub fn is_bound(&self, index: usize) -> bool {
        self.bound
            .get(&index)
            .map_or(false, |weak| weak.strong_count() > 0)
    }

    /// Number of indices with a live handle.
    #[must_use]
    pub fn live_bindings(&self) -> usize {
        self.bound.values().filter(|weak| weak.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::device::MockGamepadDevice;

    /// Backend producing mock devices and counting opens.
    struct CountingBackend {
        opened: usize,
        reported_index: Option<usize>,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                opened: 0,
                reported_index: None,
            }
        }
    }

    impl GamepadBackend for CountingBackend {
        fn open(&mut self, index: usize) -> Result<Box<dyn GamepadDevice>> {
            self.opened += 1;
            let reported = self.reported_index.unwrap_or(index);
            let mut device = MockGamepadDevice::new();
            device.expect_index().return_const(reported);
            device
                .expect_name()
                .returning(|| "Logitech Gamepad F710".to_string());
            Ok(Box::new(device))
        }
    }

    #[test]
    fn test_bind_opens_once_while_alive() {
        let mut registry = GamepadRegistry::new(CountingBackend::new());

        let first = registry.bind(0).unwrap();
        let second = registry.bind(0).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(registry.backend.opened, 1);
        assert_eq!(registry.live_bindings(), 1);
    }

    #[test]
    fn test_bind_reopens_after_last_handle_dropped() {
        let mut registry = GamepadRegistry::new(CountingBackend::new());

        let handle = registry.bind(0).unwrap();
        assert!(registry.is_bound(0));
        drop(handle);
        assert!(!registry.is_bound(0));

        let _handle = registry.bind(0).unwrap();
        assert_eq!(registry.backend.opened, 2);
    }

    #[test]
    fn test_separate_indices_get_separate_handles() {
        let mut registry = GamepadRegistry::new(CountingBackend::new());

        let a = registry.bind(0).unwrap();
        let b = registry.bind(1).unwrap();

        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(registry.live_bindings(), 2);
    }

    #[test]
    fn test_index_mismatch_rejected() {
        let mut backend = CountingBackend::new();
        backend.reported_index = Some(3);
        let mut registry = GamepadRegistry::new(backend);

        match registry.bind(0) {
            Err(TeleopError::DeviceIndexMismatch { requested, reported }) => {
                assert_eq!(requested, 0);
                assert_eq!(reported, 3);
            }
            other => panic!("Expected DeviceIndexMismatch, got {:?}", other.map(|_| ())),
        }
        assert!(!registry.is_bound(0));
    }

    #[test]
    fn test_backend_error_propagates() {
        struct MissingBackend;

        impl GamepadBackend for MissingBackend {
            fn open(&mut self, index: usize) -> Result<Box<dyn GamepadDevice>> {
                Err(TeleopError::ControllerNotFound(index))
            }
        }

        let mut registry = GamepadRegistry::new(MissingBackend);
        assert!(matches!(
            registry.bind(2),
            Err(TeleopError::ControllerNotFound(2))
        ));
    }
}
