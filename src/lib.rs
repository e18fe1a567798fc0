//! # PLB Teleop Library
//!
//! Drive a soft-body dough simulation with a Logitech F710 gamepad or the
//! keyboard.
//!
//! This library provides gamepad input translation (deadband, trigger
//! cold-start correction, virtual trigger buttons), the teleop control loop,
//! snapshot recording and the mesh helpers used to build rendered scenes.

pub mod config;
pub mod controller;
pub mod error;
pub mod mesh;
pub mod telemetry;
pub mod teleop;
