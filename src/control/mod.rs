//! Core control logic: engagement, command generation, health monitoring.
//!
//! Every input frame mutates the single [`state::RuntimeState`] through the
//! dispatcher below; the periodic tick reads that state, applies the
//! liveness check, and shapes the four outbound commands. Handlers and tick
//! run strictly interleaved on the node task, so no locking exists anywhere
//! in this module tree.

pub mod edge;
pub mod engagement;
pub mod gear;
pub mod health;
pub mod node;
pub mod speed;
pub mod state;
pub mod steering;

pub use node::{ControlError, ControlNodeHandle};
pub use state::RuntimeState;

use chrono::{DateTime, Local};

use crate::config::{TeleopConfig, MPH_TO_MPS};
use crate::messages::{
    CommandFrame, GearCommand, InputFrame, JoyFrame, SpeedCommand, SteeringCommand, TurnSignal,
    TurnSignalCommand,
};

/// Dispatches one inbound frame to its handler.
pub fn handle_input(state: &mut RuntimeState, config: &TeleopConfig, frame: &InputFrame) {
    match frame {
        InputFrame::Joystick(joy) => handle_joystick(state, config, joy),
        InputFrame::Diagnostics(diag) => health::handle_diagnostics(state, diag),
        InputFrame::ModuleState(report) => health::handle_module_state(state, config, report),
        InputFrame::GearFeedback(feedback) => state.current_gear = feedback.gear,
        InputFrame::Velocity(velocity) => state.current_velocity = velocity.velocity_mps,
        InputFrame::CruiseSwitch(switch) => engagement::handle_cruise_switch(state, *switch),
    }
}

/// Per-frame joystick processing: engagement chord first, then the command
/// generators while engaged. While disengaged the targets are held at zero.
fn handle_joystick(state: &mut RuntimeState, config: &TeleopConfig, frame: &JoyFrame) {
    let engage1 = frame.button(config.buttons.engage1);
    let engage2 = frame.button(config.buttons.engage2);
    engagement::handle_engage_buttons(state, engage1, engage2);

    if state.engaged {
        gear::select_gear(state, config, frame);
        gear::select_turn_signal(state, config, frame);
        speed::update_from_joystick(
            state,
            config,
            frame.axis(config.axes.speed),
            frame.axis(config.axes.brake),
        );
        steering::update_from_joystick(
            state,
            config,
            frame.axis(config.axes.steering),
            frame.axis(config.axes.steer_btn),
        );
    } else {
        state.desired_speed = 0.0;
        state.desired_curvature = 0.0;
    }
}

/// One publish tick: liveness check, then the four commands shaped from the
/// current state. Pure in everything but the timeout side effect, so
/// repeated ticks without new input produce identical output.
pub fn tick(
    state: &mut RuntimeState,
    config: &TeleopConfig,
    now: DateTime<Local>,
) -> [CommandFrame; 4] {
    health::check_joystick_timeout(state, config, now);

    let speed = SpeedCommand {
        mode: (config.engage_speed_module && state.engaged) as u8,
        speed_mps: state.desired_speed * MPH_TO_MPS,
        acceleration_limit: config.speed.acceleration_limit,
        deceleration_limit: state.deceleration,
    };

    let steering = SteeringCommand {
        mode: (config.engage_steering_module && state.engaged) as u8,
        curvature: state.desired_curvature,
        max_curvature_rate: config.steering.max_curvature_rate,
    };

    let gear = GearCommand {
        gear: state.current_gear,
    };

    let turn_signal = TurnSignalCommand {
        signal: state.turn_signal,
        mode: (state.turn_signal != TurnSignal::None) as u8,
    };

    [
        CommandFrame::Speed(speed),
        CommandFrame::Steering(steering),
        CommandFrame::Gear(gear),
        CommandFrame::TurnSignal(turn_signal),
    ]
}

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::Local;

    use crate::joystick::{AXIS_COUNT, BUTTON_COUNT};
    use crate::messages::JoyFrame;

    /// Button array with the given positions held.
    pub fn pressed(indices: &[usize]) -> Vec<bool> {
        let mut buttons = vec![false; BUTTON_COUNT];
        for &index in indices {
            buttons[index] = true;
        }
        buttons
    }

    /// Axis array with the given position/value pairs set.
    pub fn axes(values: &[(usize, f32)]) -> Vec<f32> {
        let mut axes = vec![0.0; AXIS_COUNT];
        for &(index, value) in values {
            axes[index] = value;
        }
        axes
    }

    /// Frame from partial button/axis arrays, padded to the collector's
    /// layout.
    pub fn joy_frame(buttons: &[bool], axis_values: &[f32]) -> JoyFrame {
        let mut padded_buttons = buttons.to_vec();
        padded_buttons.resize(BUTTON_COUNT, false);
        let mut padded_axes = axis_values.to_vec();
        padded_axes.resize(AXIS_COUNT, 0.0);
        JoyFrame {
            stamp: Local::now(),
            buttons: padded_buttons,
            axes: padded_axes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testutil::{axes, joy_frame, pressed};
    use crate::messages::{Gear, GearFeedbackFrame, TurnSignal, VelocityFrame};

    fn engaged_state(config: &TeleopConfig) -> RuntimeState {
        let mut state = RuntimeState::new(config);
        state.dbw_ready = true;
        state.current_gear = Gear::Neutral;
        state.engaged = true;
        // Heartbeat fresh so tick tests exercise command shaping, not the
        // timeout path.
        state.last_joystick_seen = Some(Local::now() + chrono::Duration::seconds(60));
        state
    }

    #[test]
    fn feedback_frames_overwrite_state() {
        let config = TeleopConfig::default();
        let mut state = RuntimeState::new(&config);

        handle_input(
            &mut state,
            &config,
            &InputFrame::GearFeedback(GearFeedbackFrame { gear: Gear::Drive }),
        );
        assert_eq!(state.current_gear, Gear::Drive);

        handle_input(
            &mut state,
            &config,
            &InputFrame::Velocity(VelocityFrame { velocity_mps: 3.2 }),
        );
        assert_eq!(state.current_velocity, 3.2);
    }

    #[test]
    fn joystick_frame_zeroes_targets_while_disengaged() {
        let config = TeleopConfig::default();
        let mut state = RuntimeState::new(&config);
        state.desired_speed = 7.0;
        state.desired_curvature = 0.03;

        handle_input(
            &mut state,
            &config,
            &InputFrame::Joystick(joy_frame(&[], &[])),
        );
        assert_eq!(state.desired_speed, 0.0);
        assert_eq!(state.desired_curvature, 0.0);
    }

    #[test]
    fn engaged_frame_drives_all_generators() {
        let config = TeleopConfig::default();
        let mut state = engaged_state(&config);
        state.current_velocity = 0.0;

        let frame = joy_frame(
            &pressed(&[config.buttons.drive, config.buttons.right_turn]),
            &axes(&[(config.axes.speed, 1.0)]),
        );
        handle_input(&mut state, &config, &InputFrame::Joystick(frame));

        assert_eq!(state.current_gear, Gear::Drive);
        assert_eq!(state.turn_signal, TurnSignal::Right);
        assert_eq!(state.desired_speed, config.speed.step_mph);
    }

    #[test]
    fn end_to_end_step_brake_example() {
        let mut config = TeleopConfig::default();
        config.speed.step_mph = 1.0;
        config.speed.max_mph = 25.0;
        let mut state = engaged_state(&config);
        state.current_velocity = 0.0;

        let up = joy_frame(&[], &axes(&[(config.axes.speed, 1.0), (config.axes.brake, 1.0)]));
        let rest = joy_frame(&[], &axes(&[(config.axes.brake, 1.0)]));

        for _ in 0..3 {
            handle_input(&mut state, &config, &InputFrame::Joystick(up.clone()));
            handle_input(&mut state, &config, &InputFrame::Joystick(rest.clone()));
        }
        assert_eq!(state.desired_speed, 3.0);

        // Full brake press, vehicle reported at ~10 mph, then release and a
        // fourth up edge.
        handle_input(
            &mut state,
            &config,
            &InputFrame::Velocity(VelocityFrame { velocity_mps: 4.4704 }),
        );
        let brake = joy_frame(&[], &axes(&[(config.axes.brake, -1.0)]));
        handle_input(&mut state, &config, &InputFrame::Joystick(brake));
        assert_eq!(state.desired_speed, 0.0);

        handle_input(&mut state, &config, &InputFrame::Joystick(rest.clone()));
        assert_eq!(state.desired_speed, 10.0);

        handle_input(&mut state, &config, &InputFrame::Joystick(up));
        assert_eq!(state.desired_speed, 11.0);
    }

    #[test]
    fn tick_gates_modes_on_engagement() {
        let config = TeleopConfig::default();
        let mut state = engaged_state(&config);
        state.desired_speed = 5.0;

        let commands = tick(&mut state, &config, Local::now());
        match commands[0] {
            CommandFrame::Speed(cmd) => {
                assert_eq!(cmd.mode, 1);
                assert!((cmd.speed_mps - 5.0 * MPH_TO_MPS).abs() < 1e-5);
                assert_eq!(cmd.deceleration_limit, config.speed.deceleration_limit);
            }
            ref other => panic!("expected speed command first, got {:?}", other),
        }

        state.engaged = false;
        let commands = tick(&mut state, &config, Local::now());
        match (&commands[0], &commands[1]) {
            (CommandFrame::Speed(speed), CommandFrame::Steering(steering)) => {
                assert_eq!(speed.mode, 0);
                assert_eq!(steering.mode, 0);
            }
            other => panic!("unexpected command order: {:?}", other),
        }
    }

    #[test]
    fn tick_respects_module_engage_flags() {
        let mut config = TeleopConfig::default();
        config.engage_speed_module = false;
        let mut state = engaged_state(&config);

        let commands = tick(&mut state, &config, Local::now());
        match (&commands[0], &commands[1]) {
            (CommandFrame::Speed(speed), CommandFrame::Steering(steering)) => {
                assert_eq!(speed.mode, 0);
                assert_eq!(steering.mode, 1);
            }
            other => panic!("unexpected command order: {:?}", other),
        }
    }

    #[test]
    fn repeated_ticks_are_idempotent() {
        let config = TeleopConfig::default();
        let mut state = engaged_state(&config);
        state.desired_speed = 4.0;
        state.desired_curvature = 0.02;
        state.current_gear = Gear::Drive;
        state.turn_signal = TurnSignal::Left;

        let now = Local::now();
        let first = tick(&mut state, &config, now);
        let second = tick(&mut state, &config, now + chrono::Duration::milliseconds(50));
        let third = tick(&mut state, &config, now + chrono::Duration::milliseconds(100));
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn tick_forces_disengage_on_stale_heartbeat() {
        let config = TeleopConfig::default();
        let mut state = engaged_state(&config);
        let now = Local::now();
        state.last_joystick_seen = Some(now - chrono::Duration::seconds(10));

        let commands = tick(&mut state, &config, now);
        assert!(!state.engaged);
        match commands[0] {
            CommandFrame::Speed(cmd) => assert_eq!(cmd.mode, 0),
            ref other => panic!("expected speed command first, got {:?}", other),
        }
    }

    #[test]
    fn gear_and_signal_resent_every_tick() {
        let config = TeleopConfig::default();
        let mut state = engaged_state(&config);
        state.current_gear = Gear::Reverse;

        for _ in 0..3 {
            let commands = tick(&mut state, &config, Local::now());
            match commands[2] {
                CommandFrame::Gear(cmd) => assert_eq!(cmd.gear, Gear::Reverse),
                ref other => panic!("expected gear command, got {:?}", other),
            }
            match commands[3] {
                CommandFrame::TurnSignal(cmd) => assert_eq!(cmd.mode, 0),
                ref other => panic!("expected turn signal command, got {:?}", other),
            }
        }
    }
}
