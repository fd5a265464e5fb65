//! Calibration engine for the 4x4 EMCal test-beam prototype.
//!
//! Converts raw 16-channel ADC readings into calibrated energy estimates and
//! characterizes the detector's energy resolution across beam configurations.

pub mod common;
pub mod domain;
pub mod modules;
pub mod numerics;
