//! Gear and turn-signal selection from held buttons.
//!
//! Both selectors are pure functions of what is held right now, re-evaluated
//! on every joystick frame while engaged; no debounce is needed.

use tracing::warn;

use crate::config::TeleopConfig;
use crate::control::state::RuntimeState;
use crate::messages::{Gear, JoyFrame, TurnSignal};

/// Vehicle speed above which a shift to park is refused, m/s.
const PARK_SPEED_LIMIT: f32 = 0.1;

/// Applies the held gear buttons in priority order park > neutral > drive >
/// reverse. Park is refused while the vehicle is moving.
pub fn select_gear(state: &mut RuntimeState, config: &TeleopConfig, frame: &JoyFrame) {
    let buttons = &config.buttons;
    if frame.button(buttons.park) {
        if state.current_velocity > PARK_SPEED_LIMIT {
            warn!("Must be stopped to change to park");
        } else {
            state.current_gear = Gear::Park;
        }
    } else if frame.button(buttons.neutral) {
        state.current_gear = Gear::Neutral;
    } else if frame.button(buttons.drive) {
        state.current_gear = Gear::Drive;
    } else if frame.button(buttons.reverse) {
        state.current_gear = Gear::Reverse;
    }
}

/// Applies the held turn-signal buttons; right wins over left, neither held
/// clears the signal.
pub fn select_turn_signal(state: &mut RuntimeState, config: &TeleopConfig, frame: &JoyFrame) {
    if frame.button(config.buttons.right_turn) {
        state.turn_signal = TurnSignal::Right;
    } else if frame.button(config.buttons.left_turn) {
        state.turn_signal = TurnSignal::Left;
    } else {
        state.turn_signal = TurnSignal::None;
    }
}
