//! Engagement state machine.
//!
//! One authoritative `engaged` flag with two transitions: try-to-engage
//! (guarded by drive-by-wire readiness and a park/neutral gear) and
//! disengage (unconditional). Triggered by the two-button joystick chord,
//! by a single engage button while engaged, and by the cruise-switch combos
//! of the secondary input device. Fault-driven disengagement lives in
//! [`crate::control::health`].

use tracing::{info, warn};

use crate::control::state::RuntimeState;
use crate::messages::{CruiseSwitchFrame, Gear};

/// Unconditional transition to `Disengaged`. Deliberately does not touch the
/// brake-curve memory; only a joystick diagnostic fault clears that.
pub fn disengage(state: &mut RuntimeState) {
    info!("DISENGAGED");
    state.engaged = false;
}

/// Attempts the `Disengaged -> Engaged` transition. Requires the
/// drive-by-wire controller ready and the vehicle in park or neutral; on
/// success the speed and curvature targets reset to zero so control starts
/// from rest.
pub fn try_engage(state: &mut RuntimeState) {
    if !state.dbw_ready {
        warn!("Drive by wire system not ready to engage");
    } else if state.current_gear != Gear::Park && state.current_gear != Gear::Neutral {
        warn!("Gear must be in park or neutral to engage");
    } else {
        info!("ENGAGED");
        state.desired_speed = 0.0;
        state.desired_curvature = 0.0;
        state.engaged = true;
    }
}

/// Debounced handling of the two engage buttons.
///
/// The full chord toggles the engagement state once per press-release cycle.
/// A single engage button while engaged is a safety interlock and
/// disengages. The latch is only set when something fired, so a lone button
/// held while disengaged does not swallow the chord completing a moment
/// later.
pub fn handle_engage_buttons(state: &mut RuntimeState, engage1: bool, engage2: bool) {
    if engage1 && engage2 {
        if !state.engage_chord_held {
            if state.engaged {
                disengage(state);
            } else {
                try_engage(state);
            }
            state.engage_chord_held = true;
        }
    } else if engage1 || engage2 {
        if state.engaged && !state.engage_chord_held {
            warn!("Engage button pressed while engaged, disengaging");
            disengage(state);
            state.engage_chord_held = true;
        }
    } else {
        state.engage_chord_held = false;
    }
}

/// Cruise-switch combos from the secondary input device: set+increase
/// requests engagement, set+decrease requests disengagement.
pub fn handle_cruise_switch(state: &mut RuntimeState, frame: CruiseSwitchFrame) {
    if frame.set_inc && frame.gap_inc {
        if !state.engaged {
            try_engage(state);
        }
    } else if frame.set_dec && frame.gap_dec && state.engaged {
        disengage(state);
    }
}
