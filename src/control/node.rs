//! Control node lifecycle and event loop.
//!
//! The node owns the runtime state and runs the strict handler/tick split:
//! inbound frames mutate state in arrival order, the publish interval emits
//! the four command frames. Lifecycle is a statum machine so each phase only
//! exposes the operations valid in it.
//!
//! ```text
//! Initializing ──► Active ──► Stopped
//!                    │
//!              (shutdown signal)
//! ```

use chrono::Local;
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::TeleopConfig;
use crate::control::state::RuntimeState;
use crate::messages::{CommandFrame, InputFrame};

/// Buffer sizes of the node's channels.
const INPUT_CHANNEL_CAPACITY: usize = 256;
const COMMAND_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Node task error: {0}")]
    TaskError(String),
}

/// Lifecycle states of the control node.
#[state]
#[derive(Debug, Clone)]
pub enum NodeState {
    Initializing,
    Active,
    Stopped,
}

/// The control node with compile-time lifecycle safety via statum.
#[machine]
pub struct ControlNode<S: NodeState> {
    config: TeleopConfig,
    runtime: RuntimeState,
    input_receiver: mpsc::Receiver<InputFrame>,
    command_sender: mpsc::Sender<CommandFrame>,
}

impl ControlNode<Initializing> {
    pub fn create(
        config: TeleopConfig,
        input_receiver: mpsc::Receiver<InputFrame>,
        command_sender: mpsc::Sender<CommandFrame>,
    ) -> Self {
        info!("Initializing control node");
        let runtime = RuntimeState::new(&config);
        Self::new(config, runtime, input_receiver, command_sender)
    }

    pub fn activate(self) -> ControlNode<Active> {
        info!(
            "Activating control node, publish interval {} s",
            self.config.publish_interval_s
        );
        self.transition()
    }
}

impl ControlNode<Active> {
    /// Main loop: runs until the shutdown signal fires or a channel closes.
    ///
    /// The select is biased so pending input frames are always applied
    /// before a due tick; the tick therefore observes the newest state.
    pub async fn run_until_shutdown(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<ControlNode<Stopped>, ControlError> {
        let mut ticker =
            tokio::time::interval(Duration::from_secs_f64(self.config.publish_interval_s));

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                frame = self.input_receiver.recv() => {
                    match frame {
                        Some(frame) => super::handle_input(&mut self.runtime, &self.config, &frame),
                        None => {
                            warn!("Input channel closed, stopping control node");
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    self.publish_commands()?;
                }
            }
        }

        info!("Control node leaving active state");
        Ok(self.transition())
    }

    /// One publish tick: liveness check plus the four command frames.
    fn publish_commands(&mut self) -> Result<(), ControlError> {
        let commands = super::tick(&mut self.runtime, &self.config, Local::now());

        for command in commands {
            match self.command_sender.try_send(command) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(command)) => {
                    // The transport is falling behind; dropping a frame is
                    // fine, the next tick re-sends everything anyway.
                    warn!("Command channel full, dropping {:?}", command);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    return Err(ControlError::ChannelError(
                        "command channel closed".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl ControlNode<Stopped> {
    pub fn finish(self) {
        info!("Control node stopped");
    }
}

/// Handle for running the control node in a tokio task.
///
/// Creates the node's channels on start and supports graceful shutdown with
/// task join, mirroring the other handles in this crate.
#[derive(Debug, Default)]
pub struct ControlNodeHandle {
    task_handle: Option<JoinHandle<Result<(), ControlError>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ControlNodeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the node task.
    ///
    /// # Returns
    ///
    /// * Input sender for inbound frames
    /// * Command receiver for the transport to drain
    pub fn start(
        &mut self,
        config: TeleopConfig,
    ) -> Result<(mpsc::Sender<InputFrame>, mpsc::Receiver<CommandFrame>), ControlError> {
        let (input_sender, input_receiver) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (command_sender, command_receiver) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let node = ControlNode::create(config, input_receiver, command_sender).activate();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let task_handle = tokio::spawn(async move {
            match node.run_until_shutdown(shutdown_rx).await {
                Ok(stopped) => {
                    stopped.finish();
                    Ok(())
                }
                Err(e) => {
                    error!("Control node terminated with error: {}", e);
                    Err(e)
                }
            }
        });
        self.task_handle = Some(task_handle);

        info!("Control node started");
        Ok((input_sender, command_receiver))
    }

    /// Gracefully shuts down the node and waits for task completion.
    pub async fn shutdown(&mut self) -> Result<(), ControlError> {
        debug!("Sending shutdown signal to control node");

        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                warn!("Control node task already terminated");
            }
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => {
                    debug!("Control node task completed");
                    result
                }
                Err(e) => {
                    error!("Control node task panicked: {}", e);
                    Err(ControlError::TaskError(format!(
                        "control node task panicked: {}",
                        e
                    )))
                }
            }
        } else {
            debug!("Control node already shut down");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testutil::{joy_frame, pressed};
    use crate::messages::{Gear, GearFeedbackFrame, ModuleStateFrame, SpeedCommand};
    use tokio::time::timeout;

    async fn expect_speed_mode(
        commands: &mut mpsc::Receiver<CommandFrame>,
        mode: u8,
    ) -> SpeedCommand {
        let deadline = Duration::from_secs(2);
        let wait = timeout(deadline, async {
            loop {
                match commands.recv().await {
                    Some(CommandFrame::Speed(cmd)) if cmd.mode == mode => return cmd,
                    Some(_) => continue,
                    None => panic!("command channel closed"),
                }
            }
        });
        match wait.await {
            Ok(cmd) => cmd,
            Err(_) => panic!("no speed command with mode {} within {:?}", mode, deadline),
        }
    }

    #[tokio::test]
    async fn node_engages_and_publishes_commands() {
        let mut config = TeleopConfig::default();
        config.publish_interval_s = 0.01;

        let mut handle = ControlNodeHandle::new();
        let (input, mut commands) = handle.start(config.clone()).unwrap();

        // Disengaged at startup.
        expect_speed_mode(&mut commands, 0).await;

        input
            .send(InputFrame::ModuleState(ModuleStateFrame {
                name: config.vel_controller_name.clone(),
                state: "ready".to_string(),
                info: String::new(),
            }))
            .await
            .unwrap();
        input
            .send(InputFrame::GearFeedback(GearFeedbackFrame {
                gear: Gear::Park,
            }))
            .await
            .unwrap();
        input
            .send(InputFrame::Joystick(joy_frame(
                &pressed(&[config.buttons.engage1, config.buttons.engage2]),
                &[],
            )))
            .await
            .unwrap();

        let cmd = expect_speed_mode(&mut commands, 1).await;
        assert_eq!(cmd.speed_mps, 0.0);
        assert_eq!(cmd.deceleration_limit, config.speed.deceleration_limit);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_without_start_is_a_noop() {
        let mut handle = ControlNodeHandle::new();
        assert!(handle.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn closing_input_channel_stops_the_node() {
        let mut config = TeleopConfig::default();
        config.publish_interval_s = 0.01;

        let mut handle = ControlNodeHandle::new();
        let (input, commands) = handle.start(config).unwrap();
        drop(input);
        // Keep the command side open so the loop exits via the input branch.
        let _commands = commands;

        assert!(handle.shutdown().await.is_ok());
    }
}
