//! Steering command generation.
//!
//! Strict precedence per frame: (1) the analog axis when deflected, shaped
//! by a signed power curve; (2) a one-shot snap to center on the frame the
//! axis comes to rest; (3) otherwise a stepped fallback on a secondary axis,
//! structurally the same edge-detected path as the speed steps.

use tracing::info;

use crate::config::TeleopConfig;
use crate::control::edge::AxisZone;
use crate::control::state::RuntimeState;

/// Deflection below which the analog axis counts as at rest.
const ANALOG_THRESHOLD: f32 = 0.01;

/// Three-zone threshold of the steer step axis.
const STEP_THRESHOLD: f32 = 0.1;

/// Processes one joystick frame's steering axis values. Call only while
/// engaged.
pub fn update_from_joystick(
    state: &mut RuntimeState,
    config: &TeleopConfig,
    steering_axis: f32,
    steer_btn_axis: f32,
) {
    let tuning = &config.steering;

    if steering_axis.abs() > ANALOG_THRESHOLD {
        // The exponent shapes sensitivity near center; no separate dead
        // zone is needed.
        let corrected = steering_axis * tuning.sign;
        let magnitude = corrected.abs();
        state.desired_curvature =
            magnitude.powf(tuning.exponent) * tuning.gain * corrected.signum();
        state.steering_active_last_loop = true;
        return;
    }

    if state.steering_active_last_loop {
        // Edge out of analog control: snap to center exactly once, then the
        // stepped path resumes from zero.
        state.desired_curvature = 0.0;
        state.steering_active_last_loop = false;
        return;
    }

    let mut updated = false;
    match state
        .steer_btn_edge
        .update(AxisZone::classify(steer_btn_axis, STEP_THRESHOLD))
    {
        Some(AxisZone::Positive) => {
            state.desired_curvature += tuning.btn_sign * tuning.btn_step;
            updated = true;
        }
        Some(AxisZone::Negative) => {
            state.desired_curvature -= tuning.btn_sign * tuning.btn_step;
            updated = true;
        }
        _ => {}
    }

    if updated {
        quantize(state, config);
    }
}

/// The single numeric policy for the stepped curvature: round to the step
/// grid, clamp to the analog full-scale range.
fn quantize(state: &mut RuntimeState, config: &TeleopConfig) {
    let step = config.steering.btn_step;
    state.desired_curvature = step * (state.desired_curvature / step).round();
    state.desired_curvature = state
        .desired_curvature
        .clamp(-config.steering.gain, config.steering.gain);

    info!("Desired Steering Curvature: {}", state.desired_curvature);
}
