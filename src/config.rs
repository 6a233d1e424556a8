//! Configuration loading and validation.
//!
//! All tuning of the node lives in one TOML file: button/axis bindings,
//! signs, steps, limits, gains, timeouts. The file is loaded once at startup,
//! validated field by field, and frozen; a failed load is a fatal startup
//! error and the control loop is never entered. The raw file text is kept
//! alongside the parsed struct so it can be echoed on the latched status
//! channel for observability.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Mph to m/s, the conversion between the operator-facing speed unit and the
/// SI unit of the speed command.
pub const MPH_TO_MPS: f32 = 0.44704;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("config field {field} must be {constraint} (got {value})")]
    OutOfRange {
        field: &'static str,
        constraint: &'static str,
        value: f64,
    },

    #[error("config field {field} must not be empty")]
    Empty { field: &'static str },

    #[error("no config directory available to place a default config file")]
    NoConfigDir,

    #[error("failed to write default config file {path}: {source}")]
    WriteDefault {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Joystick button bindings: positions into the frame's button array.
///
/// Negative values are rejected by deserialization; values past the end of a
/// frame fail loudly at the first access.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ButtonMap {
    pub engage1: usize,
    pub engage2: usize,
    pub park: usize,
    pub neutral: usize,
    pub drive: usize,
    pub reverse: usize,
    pub left_turn: usize,
    pub right_turn: usize,
}

/// Joystick axis bindings: positions into the frame's axis array.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxisMap {
    /// Axis read as a three-zone step input for the target speed.
    pub speed: usize,
    /// Analog brake axis.
    pub brake: usize,
    /// Analog steering axis.
    pub steering: usize,
    /// Axis read as a three-zone step input for the curvature fallback.
    pub steer_btn: usize,
}

/// Speed command tuning. The target speed is held internally in mph and
/// converted to m/s at publish time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpeedTuning {
    /// Sign applied to the speed-step axis; lets an inverted axis still step
    /// upward on "up".
    pub up_sign: f32,
    /// Increment per step edge, mph. Desired speed stays a multiple of this.
    pub step_mph: f32,
    /// Upper clamp of the target speed, mph.
    pub max_mph: f32,
    pub acceleration_limit: f32,
    /// Deceleration limit while the brake is released.
    pub deceleration_limit: f32,
    /// Deceleration limit at full brake; the brake curve interpolates
    /// between this and `deceleration_limit`.
    pub max_deceleration_limit: f32,
    /// Sign applied to the raw brake axis before the rest/braking split.
    pub brake_sign: f32,
}

/// Steering command tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SteeringTuning {
    /// Sign applied to the analog steering axis.
    pub sign: f32,
    /// Curvature at full stick, also the clamp of the button-stepped path.
    pub gain: f32,
    /// Power-curve exponent shaping sensitivity near center.
    pub exponent: f32,
    pub max_curvature_rate: f32,
    /// Sign applied to the steer step axis.
    pub btn_sign: f32,
    /// Curvature increment per steer step edge.
    pub btn_step: f32,
}

/// Frozen configuration for the whole node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleopConfig {
    /// Command publish period, seconds.
    pub publish_interval_s: f64,
    /// Maximum silence on the joystick heartbeat before forced
    /// disengagement, seconds.
    pub joy_fault_timeout_s: f64,
    /// Exact name the drive-by-wire speed controller reports itself under in
    /// module-state frames.
    pub vel_controller_name: String,
    /// Whether the speed command carries mode 1 while engaged.
    pub engage_speed_module: bool,
    /// Whether the steering command carries mode 1 while engaged.
    pub engage_steering_module: bool,
    pub buttons: ButtonMap,
    pub axes: AxisMap,
    pub speed: SpeedTuning,
    pub steering: SteeringTuning,
}

impl Default for TeleopConfig {
    /// Bindings for a common Xbox-layout pad as exposed by the collector:
    /// back+start engage chord, face buttons for gears, bumpers for turn
    /// signals, d-pad for speed/curvature steps, left trigger as brake,
    /// right stick X as analog steering.
    fn default() -> Self {
        Self {
            publish_interval_s: 0.05,
            joy_fault_timeout_s: 3.0,
            vel_controller_name: "veh_controller".to_string(),
            engage_speed_module: true,
            engage_steering_module: true,
            buttons: ButtonMap {
                engage1: 6,
                engage2: 7,
                park: 3,
                neutral: 2,
                drive: 0,
                reverse: 1,
                left_turn: 4,
                right_turn: 5,
            },
            axes: AxisMap {
                speed: 7,
                brake: 2,
                steering: 3,
                steer_btn: 6,
            },
            speed: SpeedTuning {
                up_sign: 1.0,
                step_mph: 1.0,
                max_mph: 15.0,
                acceleration_limit: 2.5,
                deceleration_limit: 2.5,
                max_deceleration_limit: 4.0,
                brake_sign: 1.0,
            },
            steering: SteeringTuning {
                sign: -1.0,
                gain: 0.105,
                exponent: 2.5,
                max_curvature_rate: 0.05,
                btn_sign: -1.0,
                btn_step: 0.01,
            },
        }
    }
}

impl TeleopConfig {
    /// Validates every field constraint. Indices need no range check here:
    /// `usize` rejects negatives at parse time, and frame-bound violations
    /// fail loudly at access time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    field,
                    constraint: "> 0",
                    value,
                })
            }
        }

        positive("publish_interval_s", self.publish_interval_s)?;
        positive("joy_fault_timeout_s", self.joy_fault_timeout_s)?;

        if self.vel_controller_name.is_empty() {
            return Err(ConfigError::Empty {
                field: "vel_controller_name",
            });
        }

        positive("speed.step_mph", self.speed.step_mph as f64)?;
        positive("speed.max_mph", self.speed.max_mph as f64)?;
        positive(
            "speed.acceleration_limit",
            self.speed.acceleration_limit as f64,
        )?;
        positive(
            "speed.deceleration_limit",
            self.speed.deceleration_limit as f64,
        )?;
        positive(
            "speed.max_deceleration_limit",
            self.speed.max_deceleration_limit as f64,
        )?;

        positive("steering.gain", self.steering.gain as f64)?;
        positive("steering.exponent", self.steering.exponent as f64)?;
        positive(
            "steering.max_curvature_rate",
            self.steering.max_curvature_rate as f64,
        )?;
        positive("steering.btn_step", self.steering.btn_step as f64)?;

        Ok(())
    }

    /// Joystick liveness timeout as a chrono duration.
    pub fn fault_timeout(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.joy_fault_timeout_s * 1000.0) as i64)
    }
}

/// Loads and validates a config file, returning the parsed config together
/// with the raw file text for the latched config echo.
pub fn load(path: &Path) -> Result<(TeleopConfig, String), ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: TeleopConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    config.validate()?;
    info!("Loaded configuration from {}", path.display());
    Ok((config, raw))
}

/// Loads the config from an explicit path, or from the per-user config
/// directory, materializing a default file there on first run.
pub fn load_or_init(explicit: Option<PathBuf>) -> Result<(TeleopConfig, String), ConfigError> {
    let path = match explicit {
        Some(path) => path,
        None => {
            let dir = dirs::config_dir()
                .ok_or(ConfigError::NoConfigDir)?
                .join("dbw-teleop");
            let path = dir.join("config.toml");
            if !path.exists() {
                fs::create_dir_all(&dir).map_err(|source| ConfigError::WriteDefault {
                    path: dir.clone(),
                    source,
                })?;
                let default_text = toml::to_string_pretty(&TeleopConfig::default())
                    .expect("default config serializes");
                fs::write(&path, default_text).map_err(|source| ConfigError::WriteDefault {
                    path: path.clone(),
                    source,
                })?;
                info!("Wrote default configuration to {}", path.display());
            }
            path
        }
    };

    load(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TeleopConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_step() {
        let mut config = TeleopConfig::default();
        config.speed.step_mph = 0.0;
        match config.validate() {
            Err(ConfigError::OutOfRange { field, .. }) => assert_eq!(field, "speed.step_mph"),
            other => panic!("expected out-of-range error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_negative_timeout() {
        let mut config = TeleopConfig::default();
        config.joy_fault_timeout_s = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_controller_name() {
        let mut config = TeleopConfig::default();
        config.vel_controller_name.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Empty {
                field: "vel_controller_name"
            })
        ));
    }

    #[test]
    fn default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&TeleopConfig::default()).unwrap();
        let parsed: TeleopConfig = toml::from_str(&text).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.buttons.engage1, 6);
        assert_eq!(parsed.axes.steer_btn, 6);
    }

    #[test]
    fn rejects_negative_index() {
        let mut text = toml::to_string_pretty(&TeleopConfig::default()).unwrap();
        text = text.replace("engage1 = 6", "engage1 = -1");
        assert!(toml::from_str::<TeleopConfig>(&text).is_err());
    }
}
