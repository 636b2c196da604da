//! Configuration file support for vibe-freqkeys
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/vibe-freqkeys/config.toml`
//! - macOS: `~/Library/Application Support/vibe-freqkeys/config.toml`
//! - Windows: `%APPDATA%\vibe-freqkeys\config.toml`

use crate::controller::ControllerOptions;
use crate::error::{Error, Result};
use crate::frequency::{
    validate_base_frequency, validate_octave, KeyboardLayout, DEFAULT_BASE_FREQUENCY,
    DEFAULT_FIRST_OCTAVE, DEFAULT_SECOND_OCTAVE,
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Controller configuration
    pub controller: ControllerSettings,
    /// Input configuration
    pub input: InputSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::ConfigFile(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "vibe-freqkeys") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::ConfigFile("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config_file(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path`
    pub fn write_default_config_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = r#"# vibe-freqkeys configuration file
# https://github.com/trusch/vibelang

[controller]
# Pitch of the A key (N) in the first octave, in Hz (0 < f < 30000)
base_frequency = 440.0

# Octave of the bottom key rows (1-7)
first_octave = 1

# Octave of the number/QWERTY key rows (1-7)
second_octave = 2

# Re-register triggers as soon as they change while linked
auto_restart = false

# Keyboard layout: "us" or "german"
layout = "us"

[input]
# Keyboard input: "auto", "os" or "terminal"
backend = "auto"
"#;

        fs::write(path, content)?;
        Ok(())
    }

    /// Validate the controller settings into controller options
    pub fn to_options(&self) -> Result<ControllerOptions> {
        let settings = &self.controller;
        Ok(ControllerOptions::default()
            .with_base_frequency(validate_base_frequency(settings.base_frequency)?)
            .with_octaves(
                validate_octave(settings.first_octave)?,
                validate_octave(settings.second_octave)?,
            )
            .with_auto_restart(settings.auto_restart)
            .with_layout(settings.layout))
    }
}

/// Controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Pitch of `A` in the first octave
    pub base_frequency: f64,
    /// Octave of the lower key row (1-7)
    pub first_octave: u8,
    /// Octave of the upper key row (1-7)
    pub second_octave: u8,
    /// Reconcile trigger changes immediately while linked
    pub auto_restart: bool,
    /// Keyboard layout preset
    pub layout: KeyboardLayout,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            base_frequency: DEFAULT_BASE_FREQUENCY,
            first_octave: DEFAULT_FIRST_OCTAVE,
            second_octave: DEFAULT_SECOND_OCTAVE,
            auto_restart: false,
            layout: KeyboardLayout::Us,
        }
    }
}

/// Keyboard input backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputBackend {
    /// OS listener when available, terminal otherwise
    #[default]
    Auto,
    /// OS-level listener (rdev)
    Os,
    /// Terminal raw mode (crossterm)
    Terminal,
}

/// Input settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Which keyboard source to read
    pub backend: InputBackend,
}
