//! Runtime state owned by the control node.

use chrono::{DateTime, Local};

use crate::config::TeleopConfig;
use crate::control::edge::EdgeDetector;
use crate::messages::{Gear, TurnSignal};

/// Health of the drive-by-wire controller, parsed once from the module-state
/// report text at the node boundary. Internal logic only ever switches over
/// this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbwHealth {
    NotReady,
    Ready,
    Failure,
    Fatal,
}

impl DbwHealth {
    /// Maps the report text to a health state. `ready`, `engaged` and
    /// `active` all mean the controller accepts commands. Unknown strings
    /// return `None` and are ignored by the caller.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "not_ready" => Some(DbwHealth::NotReady),
            "ready" | "engaged" | "active" => Some(DbwHealth::Ready),
            "failure" => Some(DbwHealth::Failure),
            "fatal" => Some(DbwHealth::Fatal),
            _ => None,
        }
    }
}

/// All mutable state of the node. Created once at startup, passed by
/// exclusive reference to every input handler and to the publish tick; the
/// run-to-completion loop means no locking is ever needed.
#[derive(Debug)]
pub struct RuntimeState {
    /// Whether the drive-by-wire controller reports it can accept commands.
    pub dbw_ready: bool,
    /// Sticky latch: a `fatal` report was seen and engagement stays refused
    /// until the process is restarted.
    pub dbw_fatal: bool,
    /// The authoritative override flag every command generator consults.
    pub engaged: bool,
    /// Debounce latch for the engage/disengage button combo.
    pub engage_chord_held: bool,
    /// Last commanded gear; overwritten by gear buttons while engaged and by
    /// vehicle feedback at any time.
    pub current_gear: Gear,
    /// Last reported vehicle speed, m/s. Starts at 1.0 so "not yet reported"
    /// is never mistaken for "stopped" (which would allow shifting to park).
    pub current_velocity: f32,
    pub turn_signal: TurnSignal,
    /// Target speed in mph, always a multiple of the speed step within
    /// `[0, max]`.
    pub desired_speed: f32,
    pub speed_edge: EdgeDetector,
    /// The brake axis reports a rest value of 0 until first touched; until
    /// then its readings must not be treated as an intentional brake press.
    pub brake_initialized: bool,
    pub brake_active: bool,
    /// Current deceleration limit, follows the brake curve while braking.
    pub deceleration: f32,
    /// Target curvature (1/m).
    pub desired_curvature: f32,
    /// Whether the analog steering axis was active on the previous frame,
    /// so the return-to-center snap fires exactly once.
    pub steering_active_last_loop: bool,
    pub steer_btn_edge: EdgeDetector,
    /// Last joystick-driver heartbeat; `None` until the first report.
    pub last_joystick_seen: Option<DateTime<Local>>,
}

impl RuntimeState {
    pub fn new(config: &TeleopConfig) -> Self {
        Self {
            dbw_ready: false,
            dbw_fatal: false,
            engaged: false,
            engage_chord_held: false,
            current_gear: Gear::None,
            current_velocity: 1.0,
            turn_signal: TurnSignal::None,
            desired_speed: 0.0,
            speed_edge: EdgeDetector::default(),
            brake_initialized: false,
            brake_active: false,
            deceleration: config.speed.deceleration_limit,
            desired_curvature: 0.0,
            steering_active_last_loop: false,
            steer_btn_edge: EdgeDetector::default(),
            last_joystick_seen: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_known_states() {
        assert_eq!(DbwHealth::parse("not_ready"), Some(DbwHealth::NotReady));
        assert_eq!(DbwHealth::parse("ready"), Some(DbwHealth::Ready));
        assert_eq!(DbwHealth::parse("engaged"), Some(DbwHealth::Ready));
        assert_eq!(DbwHealth::parse("active"), Some(DbwHealth::Ready));
        assert_eq!(DbwHealth::parse("failure"), Some(DbwHealth::Failure));
        assert_eq!(DbwHealth::parse("fatal"), Some(DbwHealth::Fatal));
    }

    #[test]
    fn unknown_state_is_none() {
        assert_eq!(DbwHealth::parse(""), None);
        assert_eq!(DbwHealth::parse("READY"), None);
        assert_eq!(DbwHealth::parse("restarting"), None);
    }

    #[test]
    fn initial_state_is_disengaged_with_nonzero_velocity() {
        let state = RuntimeState::new(&TeleopConfig::default());
        assert!(!state.engaged);
        assert!(!state.dbw_ready);
        assert_eq!(state.current_gear, Gear::None);
        assert!(state.current_velocity > 0.1);
        assert_eq!(
            state.deceleration,
            TeleopConfig::default().speed.deceleration_limit
        );
        assert!(state.last_joystick_seen.is_none());
    }
}
