use std::path::{Path, PathBuf};

use duo_emu_core::emulator::{DEFAULT_SAMPLE_RATE, EmulatorConfig};
use duo_emu_core::vip::bus::DEFAULT_RAM_SIZE;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PacingConfig {
    /// Overrides the system's own framerate.
    pub framerate: Option<u32>,
    pub frame_skip: bool,
    pub force_initial_frame: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            framerate: None,
            frame_skip: true,
            force_initial_frame: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Converted sample batches the sink may hold before frames are dropped.
    pub queue_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            queue_frames: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VipConfig {
    pub ram_size: usize,
}

impl Default for VipConfig {
    fn default() -> Self {
        Self {
            ram_size: DEFAULT_RAM_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct CliConfig {
    pub pacing: PacingConfig,
    pub audio: AudioConfig,
    pub vip: VipConfig,
}

impl CliConfig {
    pub fn emulator_config(&self) -> EmulatorConfig {
        EmulatorConfig {
            framerate: self.pacing.framerate,
            frame_skip: self.pacing.frame_skip,
            force_initial_frame: self.pacing.force_initial_frame,
            audio_sample_rate: self.audio.sample_rate,
            vip_ram_size: self.vip.ram_size,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("duo-emu").join("config.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("duo-emu")
            .join("config.toml");
    }

    PathBuf::from("duo-emu.toml")
}

pub fn parse(text: &str, path: &Path) -> Result<CliConfig, CliError> {
    toml::from_str(text).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a config the user asked for by name. Missing or malformed files
/// are errors.
pub fn load_required(path: &Path) -> Result<CliConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, path)
}

/// Reads the default config, falling back to defaults when it is missing or
/// cannot be parsed.
pub fn load_default(path: &Path) -> CliConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => {
            debug!("No config at {}", path.display());
            return CliConfig::default();
        }
    };

    match parse(&text, path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("{e}; using defaults");
            CliConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = parse(
            "[pacing]\nframerate = 30\n\n[vip]\nram-size = 2048\n",
            Path::new("test.toml"),
        )
        .unwrap();
        assert_eq!(cfg.pacing.framerate, Some(30));
        assert!(cfg.pacing.frame_skip);
        assert_eq!(cfg.audio.sample_rate, 44_100);
        assert_eq!(cfg.vip.ram_size, 2048);

        let emu = cfg.emulator_config();
        assert_eq!(emu.framerate, Some(30));
        assert_eq!(emu.vip_ram_size, 2048);
    }

    #[test]
    fn malformed_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "pacing = 12").unwrap();
        assert_eq!(load_default(&path), CliConfig::default());
        assert!(matches!(load_required(&path), Err(CliError::Config { .. })));
    }

    #[test]
    fn missing_required_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert_eq!(load_default(&path), CliConfig::default());
        assert!(matches!(load_required(&path), Err(CliError::Io { .. })));
    }

    #[test]
    fn round_trips_through_toml() {
        let mut cfg = CliConfig::default();
        cfg.pacing.frame_skip = false;
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("frame-skip = false"));
        assert_eq!(parse(&text, Path::new("x")).unwrap(), cfg);
    }
}
