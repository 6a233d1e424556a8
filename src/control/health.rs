//! Health and liveness monitoring.
//!
//! Two inbound report streams gate engagement: diagnostic reports from the
//! joystick driver (matched by name substring, doubling as the liveness
//! heartbeat) and module-state reports from the drive-by-wire controller
//! (matched by exact configured name). The publish tick checks the heartbeat
//! age and forces disengagement when the joystick goes silent.

use chrono::{DateTime, Local};
use tracing::{error, warn};

use crate::config::TeleopConfig;
use crate::control::engagement::disengage;
use crate::control::state::{DbwHealth, RuntimeState};
use crate::messages::{DiagnosticFrame, ModuleStateFrame};

/// Substring identifying the joystick driver among diagnostic report names.
pub const JOYSTICK_DIAG_NAME: &str = "Joystick Driver";

/// Grace period granted before the first heartbeat, so the node does not
/// declare a timeout while the joystick driver is still starting up.
const STARTUP_GRACE_S: i64 = 5;

/// Processes a diagnostic frame. Any report matching the joystick driver
/// refreshes the heartbeat; a non-OK level forces disengagement and clears
/// the brake-curve memory (the one disengage path that does).
pub fn handle_diagnostics(state: &mut RuntimeState, frame: &DiagnosticFrame) {
    for status in &frame.statuses {
        if status.name.contains(JOYSTICK_DIAG_NAME) {
            state.last_joystick_seen = Some(frame.stamp);
            if !status.level.is_ok() {
                error!("JOYSTICK FAULT");
                disengage(state);
                state.brake_initialized = false;
                state.brake_active = false;
            }
        }
    }
}

/// Processes a module-state report from the drive-by-wire controller.
///
/// `failure` recovers across a disengage/re-engage cycle once the controller
/// reports ready again; `fatal` latches for the rest of the run and later
/// ready reports are refused.
pub fn handle_module_state(state: &mut RuntimeState, config: &TeleopConfig, frame: &ModuleStateFrame) {
    if frame.name != config.vel_controller_name {
        return;
    }

    match DbwHealth::parse(&frame.state) {
        Some(DbwHealth::NotReady) => {
            if state.dbw_ready && state.engaged {
                warn!("Drive by wire no longer ready, disengaging");
                disengage(state);
            }
            state.dbw_ready = false;
        }
        Some(DbwHealth::Ready) => {
            if state.dbw_fatal {
                warn!("Ignoring ready report after fatal, software must be restarted");
            } else {
                state.dbw_ready = true;
            }
        }
        Some(DbwHealth::Failure) => {
            if state.dbw_ready && state.engaged {
                error!("Joystick control DISENGAGED due to {}", frame.info);
                disengage(state);
            }
            state.dbw_ready = false;
        }
        Some(DbwHealth::Fatal) => {
            if state.dbw_ready {
                error!("Joystick control unavailable due to {}", frame.info);
                error!("Software must be stopped and restarted once the problem is fixed");
                if state.engaged {
                    disengage(state);
                }
            }
            state.dbw_ready = false;
            state.dbw_fatal = true;
        }
        None => {
            warn!("Unrecognized module state: {}", frame.state);
        }
    }
}

/// Heartbeat age check, run once per publish tick.
///
/// On the very first tick the heartbeat is seeded into the future as a
/// startup grace period. After a timeout fires, the heartbeat resets to now
/// so continued silence keeps re-triggering instead of firing once.
pub fn check_joystick_timeout(state: &mut RuntimeState, config: &TeleopConfig, now: DateTime<Local>) {
    match state.last_joystick_seen {
        None => {
            state.last_joystick_seen = Some(now + chrono::Duration::seconds(STARTUP_GRACE_S));
        }
        Some(seen) => {
            if now - seen > config.fault_timeout() {
                error!("JOYSTICK TIMEOUT");
                state.last_joystick_seen = Some(now);
                disengage(state);
            }
        }
    }
}
