//! Frame types crossing the node boundary.
//!
//! Inbound frames arrive from external collaborators (joystick driver,
//! diagnostic aggregator, drive-by-wire controller feedback) as one
//! [`InputFrame`] enum over a single mpsc channel. Outbound actuation
//! commands leave as one [`CommandFrame`] enum, re-sent every publish tick.
//! Serialization of these frames onto a wire is owned by whatever transport
//! the caller attaches to the channels.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transmission gear, both as commanded and as reported by the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Gear {
    /// No gear has been commanded or reported yet.
    #[default]
    None,
    Park,
    Neutral,
    Drive,
    Reverse,
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gear::None => write!(f, "none"),
            Gear::Park => write!(f, "park"),
            Gear::Neutral => write!(f, "neutral"),
            Gear::Drive => write!(f, "drive"),
            Gear::Reverse => write!(f, "reverse"),
        }
    }
}

/// Turn-signal selection. Right wins over Left when both buttons are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TurnSignal {
    #[default]
    None,
    Left,
    Right,
}

/// One sampled joystick frame: ordered button states and axis values.
///
/// Button and axis positions are bound to meanings by the `[buttons]` and
/// `[axes]` sections of the configuration; the frame itself is layout-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoyFrame {
    pub stamp: DateTime<Local>,
    pub buttons: Vec<bool>,
    /// Axis values in `[-1, 1]`.
    pub axes: Vec<f32>,
}

impl JoyFrame {
    /// Reads a configured button index.
    ///
    /// # Panics
    ///
    /// Panics when `index` exceeds the frame bounds. A configured index the
    /// hardware never produces is a configuration/hardware mismatch that
    /// cannot be guessed around.
    pub fn button(&self, index: usize) -> bool {
        match self.buttons.get(index) {
            Some(pressed) => *pressed,
            None => panic!(
                "configured button index {} out of range for joystick frame with {} buttons",
                index,
                self.buttons.len()
            ),
        }
    }

    /// Reads a configured axis index.
    ///
    /// # Panics
    ///
    /// Panics when `index` exceeds the frame bounds, see [`JoyFrame::button`].
    pub fn axis(&self, index: usize) -> f32 {
        match self.axes.get(index) {
            Some(value) => *value,
            None => panic!(
                "configured axis index {} out of range for joystick frame with {} axes",
                index,
                self.axes.len()
            ),
        }
    }
}

/// Severity of a single diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
    Stale,
}

impl DiagnosticLevel {
    pub fn is_ok(&self) -> bool {
        matches!(self, DiagnosticLevel::Ok)
    }
}

/// One named status inside a diagnostic frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticStatus {
    pub name: String,
    pub level: DiagnosticLevel,
}

/// Batch of diagnostic reports from the driver stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticFrame {
    pub stamp: DateTime<Local>,
    pub statuses: Vec<DiagnosticStatus>,
}

/// Module-state report from a drive-by-wire controller.
///
/// The `state` text is parsed into a closed enum at the node boundary; only
/// reports whose `name` matches the configured controller identity are acted
/// on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStateFrame {
    pub name: String,
    pub state: String,
    pub info: String,
}

/// Gear feedback from the vehicle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GearFeedbackFrame {
    pub gear: Gear,
}

/// Velocity feedback from the vehicle, in m/s.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VelocityFrame {
    pub velocity_mps: f32,
}

/// Secondary input device frame (adaptive-cruise-style steering wheel
/// switches). The set+increase pair requests engagement, the set+decrease
/// pair requests disengagement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CruiseSwitchFrame {
    pub set_inc: bool,
    pub set_dec: bool,
    pub gap_inc: bool,
    pub gap_dec: bool,
}

/// Every inbound frame the control node consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InputFrame {
    Joystick(JoyFrame),
    Diagnostics(DiagnosticFrame),
    ModuleState(ModuleStateFrame),
    GearFeedback(GearFeedbackFrame),
    Velocity(VelocityFrame),
    CruiseSwitch(CruiseSwitchFrame),
}

/// Speed command toward the drive-by-wire speed module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedCommand {
    /// 1 when the speed module is configured to engage and the node is
    /// engaged, 0 otherwise.
    pub mode: u8,
    /// Target speed in m/s.
    pub speed_mps: f32,
    pub acceleration_limit: f32,
    /// Current deceleration limit, follows the brake curve while braking.
    pub deceleration_limit: f32,
}

/// Steering command toward the drive-by-wire steering module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringCommand {
    pub mode: u8,
    /// Target curvature (1/m).
    pub curvature: f32,
    pub max_curvature_rate: f32,
}

/// Gear command, re-sent every tick regardless of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GearCommand {
    pub gear: Gear,
}

/// Turn-signal command, re-sent every tick regardless of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSignalCommand {
    pub signal: TurnSignal,
    pub mode: u8,
}

/// Every outbound command the control node produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CommandFrame {
    Speed(SpeedCommand),
    Steering(SteeringCommand),
    Gear(GearCommand),
    TurnSignal(TurnSignalCommand),
}
