//! Gamepad event collection via gilrs.
//!
//! Maintains the latest button/axis arrays in a fixed layout and emits a
//! [`JoyFrame`] whenever an event changed them, plus a diagnostic heartbeat
//! at a fixed cadence. The poll loop never awaits, so the handle runs it on
//! a blocking task and communicates only through the input channel.
//!
//! # Frame layout
//!
//! Buttons: 0 A, 1 B, 2 X, 3 Y, 4 LB, 5 RB, 6 back, 7 start, 8 guide,
//! 9 left stick, 10 right stick.
//! Axes: 0 left stick X, 1 left stick Y, 2 left trigger, 3 right stick X,
//! 4 right stick Y, 5 right trigger, 6 d-pad X (left positive), 7 d-pad Y
//! (up positive).
//!
//! Trigger axes are normalized to the rest-high convention: +1 released,
//! -1 fully pressed, and 0 until the trigger is first touched. The brake
//! handling downstream depends on exactly that shape.

use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{AXIS_COUNT, BUTTON_COUNT};
use crate::messages::{
    DiagnosticFrame, DiagnosticLevel, DiagnosticStatus, InputFrame, JoyFrame,
};

/// Name the heartbeat reports itself under; the health monitor matches on a
/// substring of this.
pub const DIAGNOSTIC_NAME: &str = "Joystick Driver Status";

/// Collector settings.
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    /// Deadzone applied to stick axes.
    pub joystick_deadzone: f32,
    /// Cadence of the diagnostic heartbeat, milliseconds.
    pub diagnostic_interval_ms: u64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.05,
            diagnostic_interval_ms: 1000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send frame: {0}")]
    FrameSendError(String),
}

/// Collector lifecycle states.
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

/// Gamepad event collector with compile-time state safety via statum.
#[machine]
pub struct JoystickCollector<S: CollectionState> {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
    settings: CollectorSettings,
    frame_sender: mpsc::Sender<InputFrame>,
    buttons: [bool; BUTTON_COUNT],
    axes: [f32; AXIS_COUNT],
    last_heartbeat: chrono::DateTime<Local>,
}

impl JoystickCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        frame_sender: mpsc::Sender<InputFrame>,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating joystick collector with settings: {:?}", settings);

        let gilrs = match Gilrs::new() {
            Ok(g) => g,
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(
            gilrs,
            None,
            settings,
            frame_sender,
            [false; BUTTON_COUNT],
            [0.0; AXIS_COUNT],
            Local::now(),
        ))
    }

    /// Selects a gamepad and transitions to the collecting state. Running
    /// without a pad is allowed; the heartbeat then reports an error level
    /// and the node stays disengaged.
    pub fn initialize(mut self) -> JoystickCollector<Collecting> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, collector reports fault until one appears");
        } else {
            for (id, gamepad) in &gamepads {
                info!("Found gamepad [{}]: {}", id, gamepad.name());
            }
            let (id, gamepad) = &gamepads[0];
            self.active_gamepad = Some(*id);
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
        }

        self.transition()
    }
}

impl JoystickCollector<Collecting> {
    /// Drains pending gilrs events; returns whether any frame field changed.
    fn drain_events(&mut self) -> bool {
        let mut changed = false;

        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected if self.active_gamepad.is_none() => {
                    info!("Gamepad connected: {:?}", id);
                    self.active_gamepad = Some(id);
                    continue;
                }
                EventType::Disconnected if self.active_gamepad == Some(id) => {
                    warn!("Active gamepad disconnected");
                    self.active_gamepad = None;
                    continue;
                }
                _ => {}
            }

            if self.active_gamepad != Some(id) {
                debug!("Skipping event from non-active gamepad: {:?}", id);
                continue;
            }

            changed |= self.apply_event(event);
        }

        changed
    }

    /// Applies one gilrs event to the frame arrays.
    fn apply_event(&mut self, event: EventType) -> bool {
        match event {
            EventType::ButtonPressed(button, _) => self.set_button(button, true),
            EventType::ButtonReleased(button, _) => self.set_button(button, false),
            EventType::ButtonChanged(Button::LeftTrigger2, value, _) => {
                self.set_axis(2, rest_high(value))
            }
            EventType::ButtonChanged(Button::RightTrigger2, value, _) => {
                self.set_axis(5, rest_high(value))
            }
            EventType::AxisChanged(axis, value, _) => {
                let deadzoned = apply_deadzone(value, self.settings.joystick_deadzone);
                match axis {
                    Axis::LeftStickX => self.set_axis(0, deadzoned),
                    Axis::LeftStickY => self.set_axis(1, deadzoned),
                    Axis::LeftZ => self.set_axis(2, rest_high(value)),
                    Axis::RightStickX => self.set_axis(3, deadzoned),
                    Axis::RightStickY => self.set_axis(4, deadzoned),
                    Axis::RightZ => self.set_axis(5, rest_high(value)),
                    // D-pad follows the left/up-positive convention.
                    Axis::DPadX => self.set_axis(6, -value),
                    Axis::DPadY => self.set_axis(7, value),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn set_button(&mut self, button: Button, pressed: bool) -> bool {
        // D-pads commonly arrive as buttons; fold them onto the step axes.
        match button {
            Button::DPadUp => return self.set_axis(7, if pressed { 1.0 } else { 0.0 }),
            Button::DPadDown => return self.set_axis(7, if pressed { -1.0 } else { 0.0 }),
            Button::DPadLeft => return self.set_axis(6, if pressed { 1.0 } else { 0.0 }),
            Button::DPadRight => return self.set_axis(6, if pressed { -1.0 } else { 0.0 }),
            _ => {}
        }

        match button_index(button) {
            Some(index) if self.buttons[index] != pressed => {
                self.buttons[index] = pressed;
                true
            }
            _ => false,
        }
    }

    fn set_axis(&mut self, index: usize, value: f32) -> bool {
        if self.axes[index] != value {
            self.axes[index] = value;
            true
        } else {
            false
        }
    }

    fn send_frame(&self) -> Result<(), CollectorError> {
        let frame = JoyFrame {
            stamp: Local::now(),
            buttons: self.buttons.to_vec(),
            axes: self.axes.to_vec(),
        };
        self.frame_sender
            .try_send(InputFrame::Joystick(frame))
            .map_err(|e| CollectorError::FrameSendError(e.to_string()))
    }

    fn send_heartbeat(&self) -> Result<(), CollectorError> {
        let level = if self.active_gamepad.is_some() {
            DiagnosticLevel::Ok
        } else {
            DiagnosticLevel::Error
        };
        let frame = DiagnosticFrame {
            stamp: Local::now(),
            statuses: vec![DiagnosticStatus {
                name: DIAGNOSTIC_NAME.to_string(),
                level,
            }],
        };
        self.frame_sender
            .try_send(InputFrame::Diagnostics(frame))
            .map_err(|e| CollectorError::FrameSendError(e.to_string()))
    }

    /// Poll loop. Runs until the input channel closes.
    pub fn run_collection_loop(mut self) {
        info!("Starting joystick collection loop");
        let heartbeat_interval =
            chrono::Duration::milliseconds(self.settings.diagnostic_interval_ms as i64);

        loop {
            if self.drain_events() {
                if let Err(e) = self.send_frame() {
                    if self.frame_sender.is_closed() {
                        info!("Input channel closed, stopping collector");
                        return;
                    }
                    warn!("Dropping joystick frame: {}", e);
                }
            }

            let now = Local::now();
            if now - self.last_heartbeat >= heartbeat_interval {
                self.last_heartbeat = now;
                if let Err(e) = self.send_heartbeat() {
                    if self.frame_sender.is_closed() {
                        info!("Input channel closed, stopping collector");
                        return;
                    }
                    warn!("Dropping diagnostic heartbeat: {}", e);
                }
            }

            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}

/// Handle that runs the collector on a blocking task.
pub struct CollectorHandle {
    task_handle: tokio::task::JoinHandle<()>,
}

impl CollectorHandle {
    /// Spawns the collector. The poll loop is synchronous, so it goes on
    /// the blocking pool rather than an async worker.
    pub fn spawn(
        settings: Option<CollectorSettings>,
        frame_sender: mpsc::Sender<InputFrame>,
    ) -> Result<Self, CollectorError> {
        let collector = JoystickCollector::create(settings, frame_sender)?;

        let task_handle = tokio::task::spawn_blocking(move || {
            collector.initialize().run_collection_loop();
        });

        info!("Joystick collector started");
        Ok(Self { task_handle })
    }

    pub fn abort(&self) {
        self.task_handle.abort();
    }
}

/// Maps a gilrs button to its frame position.
fn button_index(button: Button) -> Option<usize> {
    match button {
        Button::South => Some(0),
        Button::East => Some(1),
        Button::West => Some(2),
        Button::North => Some(3),
        Button::LeftTrigger => Some(4),
        Button::RightTrigger => Some(5),
        Button::Select => Some(6),
        Button::Start => Some(7),
        Button::Mode => Some(8),
        Button::LeftThumb => Some(9),
        Button::RightThumb => Some(10),
        _ => None,
    }
}

/// Normalizes a 0..1 trigger reading to the rest-high convention
/// (+1 released, -1 fully pressed).
fn rest_high(value: f32) -> f32 {
    1.0 - 2.0 * value.clamp(0.0, 1.0)
}

/// Rescales an axis value to the range outside the deadzone.
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_normalization_is_rest_high() {
        assert_eq!(rest_high(0.0), 1.0);
        assert_eq!(rest_high(1.0), -1.0);
        assert_eq!(rest_high(0.5), 0.0);
        // Out-of-range readings clamp instead of leaving the convention.
        assert_eq!(rest_high(1.5), -1.0);
    }

    #[test]
    fn deadzone_rescales_outside_band() {
        assert_eq!(apply_deadzone(0.02, 0.05), 0.0);
        assert_eq!(apply_deadzone(-0.04, 0.05), 0.0);
        assert_eq!(apply_deadzone(1.0, 0.05), 1.0);
        assert_eq!(apply_deadzone(-1.0, 0.05), -1.0);
        let mid = apply_deadzone(0.5, 0.05);
        assert!(mid > 0.0 && mid < 0.5);
    }

    #[test]
    fn button_layout_matches_default_bindings() {
        // The default config binds back+start as the engage chord and the
        // face buttons as gears; the layout table must agree.
        assert_eq!(button_index(Button::Select), Some(6));
        assert_eq!(button_index(Button::Start), Some(7));
        assert_eq!(button_index(Button::South), Some(0));
        assert_eq!(button_index(Button::East), Some(1));
        assert_eq!(button_index(Button::West), Some(2));
        assert_eq!(button_index(Button::North), Some(3));
        assert_eq!(button_index(Button::Unknown), None);
    }
}
