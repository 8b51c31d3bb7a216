//! # Rig and Session Configuration
//!
//! Every tunable that depends on the physical machine lives here: the needle
//! motor gearing, the hoop belt geometry, the speed ramp and the serial link.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [rig]
//! ticks_per_stitch = 11600
//! ticks_per_revolution = 3200
//! distance_per_revolution = 320
//!
//! [speed]
//! max_speed = 100
//! min_jump_speed = 60
//! ramp_step = 5
//!
//! [serial]
//! port = "/dev/ttyACM0"
//! baud = 115200
//!
//! [session]
//! response_timeout_ms = 5000
//! enable_settle_ms = 1000
//! zero_step_policy = "skip_phase"
//! ```
//!
//! Every section and field is optional; missing values fall back to the
//! defaults of the reference rig.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the rig, the speed ramp, the serial link and the session.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub rig: RigConfig,
    #[serde(default)]
    pub speed: SpeedProfile,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rig.validate()?;
        self.speed.validate()?;
        Ok(())
    }
}

/// Mechanical constants of the machine.
///
/// The reference rig: 200 full steps per motor revolution with 16 microsteps,
/// a 16 tooth pulley on the needle motor driving a 58 tooth pulley on the
/// sewing machine (200 * 16 * 58 / 16 = 11600 ticks per stitch), and hoop belts
/// moving 20 file units per tooth over a 16 tooth pulley.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RigConfig {
    /// Needle motor ticks for one full stitch rotation.
    #[serde(default = "default_ticks_per_stitch")]
    pub ticks_per_stitch: u32,
    /// Microstep ticks per revolution of any of the three steppers.
    #[serde(default = "default_ticks_per_revolution")]
    pub ticks_per_revolution: u32,
    /// Hoop travel per hoop stepper revolution, in file units.
    #[serde(default = "default_distance_per_revolution")]
    pub distance_per_revolution: u32,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            ticks_per_stitch: default_ticks_per_stitch(),
            ticks_per_revolution: default_ticks_per_revolution(),
            distance_per_revolution: default_distance_per_revolution(),
        }
    }
}

impl RigConfig {
    /// Part of the stitch rotation during which the hoop may move: the quarter
    /// starting with the needle at its highest position.
    pub fn ticks_hoop_moving(&self) -> u32 {
        self.ticks_per_stitch / 4
    }

    /// The rest of the rotation, including any remainder of the quarter split.
    /// Both phases add up to exactly one stitch.
    pub fn ticks_hoop_not_moving(&self) -> u32 {
        (self.ticks_per_stitch / 4) * 3 + self.ticks_per_stitch % 4
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_stitch == 0 {
            return Err(ConfigError::Invalid("rig.ticks_per_stitch must be > 0".to_string()));
        }
        if self.ticks_per_revolution == 0 {
            return Err(ConfigError::Invalid("rig.ticks_per_revolution must be > 0".to_string()));
        }
        if self.distance_per_revolution == 0 {
            return Err(ConfigError::Invalid("rig.distance_per_revolution must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Speed ramp bounds in stitches per minute.
///
/// `max_speed` is the fastest the needle motor runs reliably, found by trial
/// on the rig. Jump stitches run at `min_jump_speed` and neighbours ramp
/// towards it by `ramp_step` per stitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpeedProfile {
    #[serde(default = "default_max_speed")]
    pub max_speed: u32,
    #[serde(default = "default_min_jump_speed")]
    pub min_jump_speed: u32,
    #[serde(default = "default_ramp_step")]
    pub ramp_step: u32,
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            min_jump_speed: default_min_jump_speed(),
            ramp_step: default_ramp_step(),
        }
    }
}

impl SpeedProfile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_jump_speed == 0 {
            return Err(ConfigError::Invalid("speed.min_jump_speed must be > 0".to_string()));
        }
        if self.min_jump_speed > self.max_speed {
            return Err(ConfigError::Invalid(format!(
                "speed.min_jump_speed ({}) must not exceed speed.max_speed ({})",
                self.min_jump_speed, self.max_speed
            )));
        }
        if self.ramp_step == 0 {
            return Err(ConfigError::Invalid("speed.ramp_step must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Serial link to the controller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    #[serde(default)]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "".to_string(),
            baud: default_baud(),
        }
    }
}

/// What the session does with a phase whose hoop axis cannot be timed
/// (zero steps over a non-zero time span).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroStepPolicy {
    /// Abort the session with the arithmetic error.
    Fail,
    /// Log the phase and carry on with the next one.
    #[default]
    SkipPhase,
}

/// Session driver settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Upper bound on the wait for a controller response.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Pause after enabling the drivers before the first response is read.
    #[serde(default = "default_enable_settle_ms")]
    pub enable_settle_ms: u64,
    #[serde(default)]
    pub zero_step_policy: ZeroStepPolicy,
    /// Marker that starts every wire record.
    #[serde(default = "default_magic")]
    pub magic: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout_ms(),
            enable_settle_ms: default_enable_settle_ms(),
            zero_step_policy: ZeroStepPolicy::default(),
            magic: default_magic(),
        }
    }
}

impl SessionConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn enable_settle(&self) -> Duration {
        Duration::from_millis(self.enable_settle_ms)
    }
}

fn default_ticks_per_stitch() -> u32 { 11600 }
fn default_ticks_per_revolution() -> u32 { 200 * 16 }
fn default_distance_per_revolution() -> u32 { 20 * 16 }
fn default_max_speed() -> u32 { 100 }
fn default_min_jump_speed() -> u32 { 60 }
fn default_ramp_step() -> u32 { 5 }
fn default_baud() -> u32 { 115200 }
fn default_response_timeout_ms() -> u64 { 5000 }
fn default_enable_settle_ms() -> u64 { 1000 }
fn default_magic() -> u32 { 0xDECA_FBAD }

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}
