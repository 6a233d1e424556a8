//! Speed command generation: step buttons plus the analog brake curve.
//!
//! Two sub-paths feed the same target. The speed axis steps the target up or
//! down once per press (three-zone edge detection), and the brake axis runs
//! a nonlinear curve with hysteresis: pressing zeroes the target and scales
//! the deceleration limit with pedal travel, releasing re-seeds the target
//! from the vehicle's actual speed. Whichever path marks an update, the
//! result goes through one shared quantize/clamp policy.

use tracing::info;

use crate::config::{TeleopConfig, MPH_TO_MPS};
use crate::control::edge::AxisZone;
use crate::control::state::RuntimeState;

/// Three-zone threshold of the step axis.
const STEP_THRESHOLD: f32 = 0.1;

/// Sign-corrected brake value at or above which the pedal counts as
/// released. The physical axis rests at full scale, so "almost full scale"
/// is the rest zone and everything below is braking.
const BRAKE_REST_THRESHOLD: f32 = 0.95;

/// Targets below this snap to exactly zero to avoid micro-creep commands.
const SPEED_DEAD_ZONE: f32 = 0.1;

/// Clamped two-point linear interpolation: maps `x` from `[x0, x1]` onto
/// `[y0, y1]`, holding the endpoints outside the input range.
fn map_range(x: f32, x0: f32, x1: f32, y0: f32, y1: f32) -> f32 {
    let x = x.clamp(x0.min(x1), x0.max(x1));
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Processes one joystick frame's speed and brake axis values. Call only
/// while engaged.
pub fn update_from_joystick(
    state: &mut RuntimeState,
    config: &TeleopConfig,
    speed_axis: f32,
    brake_axis: f32,
) {
    let tuning = &config.speed;
    let mut updated = false;

    // Step path: one step per edge into the up or down zone.
    match state
        .speed_edge
        .update(AxisZone::classify(speed_axis, STEP_THRESHOLD))
    {
        Some(AxisZone::Positive) => {
            state.desired_speed += tuning.up_sign * tuning.step_mph;
            updated = true;
        }
        Some(AxisZone::Negative) => {
            state.desired_speed -= tuning.up_sign * tuning.step_mph;
            updated = true;
        }
        _ => {}
    }

    // Brake path. The axis reports 0 until first touched; that rest value
    // must not count as a press.
    if brake_axis != 0.0 {
        state.brake_initialized = true;
    }
    if state.brake_initialized {
        let brake = brake_axis * tuning.brake_sign;
        if brake < BRAKE_REST_THRESHOLD {
            if !state.brake_active {
                state.brake_active = true;
                state.desired_speed = 0.0;
                updated = true;
            }
            state.deceleration = map_range(
                brake,
                -BRAKE_REST_THRESHOLD,
                BRAKE_REST_THRESHOLD,
                tuning.max_deceleration_limit,
                tuning.deceleration_limit,
            );
        } else if state.brake_active {
            // Release edge: pick up the vehicle's actual speed, floored to
            // the step grid so the first step after release lands cleanly.
            state.brake_active = false;
            let velocity_mph = state.current_velocity / MPH_TO_MPS;
            state.desired_speed = tuning.step_mph * (velocity_mph / tuning.step_mph).floor();
            state.deceleration = tuning.deceleration_limit;
            updated = true;
        }
    }

    if updated {
        quantize(state, config);
    }
}

/// The single numeric policy for the speed target: round to the step grid,
/// clamp to `[0, max]`, snap the dead zone to exactly zero.
fn quantize(state: &mut RuntimeState, config: &TeleopConfig) {
    let step = config.speed.step_mph;
    state.desired_speed = step * (state.desired_speed / step).round();

    if state.desired_speed > config.speed.max_mph {
        state.desired_speed = config.speed.max_mph;
    } else if state.desired_speed < SPEED_DEAD_ZONE {
        state.desired_speed = 0.0;
    }

    info!("Desired Speed: {}", state.desired_speed);
}
