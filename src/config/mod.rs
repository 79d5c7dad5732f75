//! Configuration management for LUMI GW
//!
//! Loads the YAML configuration file. Every section and field has a default,
//! so an empty file (or no file at all) drives a LUMI Keys block out of the box.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

use crate::sysex::SysexHeader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub sysex: SysexHeader,
    pub ripple: RippleConfig,
    pub router: RouterConfig,
    pub api: ApiConfig,
}

/// MIDI port configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Device name, also the default port pattern
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,
    /// Channel used for outbound note messages (0-15)
    #[serde(default)]
    pub channel: u8,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            input_port: None,
            output_port: None,
            channel: 0,
        }
    }
}

impl MidiConfig {
    /// Substring matched against input port names
    pub fn input_pattern(&self) -> &str {
        self.input_port.as_deref().unwrap_or(&self.device)
    }

    /// Substring matched against output port names
    pub fn output_pattern(&self) -> &str {
        self.output_port.as_deref().unwrap_or(&self.device)
    }
}

/// Ripple animation tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RippleConfig {
    /// Steps plus one; a strength of 10 lights 9 keys on each side
    #[serde(default = "default_strength")]
    pub strength: u8,
    #[serde(default = "default_ripple_velocity")]
    pub velocity: u8,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_off_delay_ms")]
    pub off_delay_ms: u64,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            strength: default_strength(),
            velocity: default_ripple_velocity(),
            step_delay_ms: default_step_delay_ms(),
            off_delay_ms: default_off_delay_ms(),
        }
    }
}

impl RippleConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn off_delay(&self) -> Duration {
        Duration::from_millis(self.off_delay_ms)
    }
}

/// Event loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Velocity used to light keys on `play` notifications
    #[serde(default = "default_play_velocity")]
    pub play_velocity: u8,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            play_velocity: default_play_velocity(),
        }
    }
}

impl RouterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// HTTP trigger endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path))?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path).await
        } else {
            warn!("Config file '{}' not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.device.is_empty() {
            anyhow::bail!("MIDI device name cannot be empty");
        }
        if self.midi.channel > 15 {
            anyhow::bail!("MIDI channel {} is invalid (must be 0-15)", self.midi.channel);
        }

        self.sysex.validate().context("Invalid sysex header")?;

        if self.ripple.strength == 0 {
            anyhow::bail!("Ripple strength must be at least 1");
        }
        if self.ripple.velocity > 127 {
            anyhow::bail!("Ripple velocity {} is invalid (must be 0-127)", self.ripple.velocity);
        }
        if self.router.play_velocity > 127 {
            anyhow::bail!("Play velocity {} is invalid (must be 0-127)", self.router.play_velocity);
        }
        if self.router.poll_interval_ms == 0 {
            anyhow::bail!("Poll interval must be at least 1 ms");
        }

        Ok(())
    }
}

// Default value functions
fn default_device() -> String { "LUMI Keys Block".to_string() }
fn default_strength() -> u8 { 10 }
fn default_ripple_velocity() -> u8 { 20 }
fn default_step_delay_ms() -> u64 { 50 }
fn default_off_delay_ms() -> u64 { 100 }
fn default_poll_interval_ms() -> u64 { 10 }
fn default_play_velocity() -> u8 { 127 }
fn default_true() -> bool { true }
fn default_api_host() -> String { "0.0.0.0".to_string() }
fn default_api_port() -> u16 { 8000 }
