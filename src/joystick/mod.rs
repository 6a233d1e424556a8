//! Joystick input source.
//!
//! Polls a gamepad through gilrs and assembles the ordered button/axis
//! frames the control node consumes, together with a periodic
//! joystick-driver diagnostic heartbeat that feeds the liveness monitor.

pub mod collector;

pub use collector::{CollectorError, CollectorHandle, CollectorSettings};

/// Number of button slots in an emitted frame.
pub const BUTTON_COUNT: usize = 11;

/// Number of axis slots in an emitted frame.
pub const AXIS_COUNT: usize = 8;
