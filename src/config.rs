// Configuration
// Embedded defaults overlaid with an optional user file

use crate::sequencer::sequence::{DEFAULT_TICKS_PER_STEP, MAX_SEQUENCE_LENGTH, MAX_TICKS_PER_STEP};
use crate::sequencer::tempo::Tempo;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

const DEFAULT_SEQUENCE_COUNT: usize = 4;
const DEFAULT_SEQUENCE_LENGTH: usize = 16;
const MAX_SEQUENCE_COUNT: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    sequencer: SequencerConfig,
    #[serde(default)]
    clock: ClockConfig,
    #[serde(default)]
    midi: MidiConfig,
    #[serde(default)]
    runner: RunnerConfig,
}

#[derive(Debug, Deserialize, Default)]
struct SequencerConfig {
    sequence_count: Option<usize>,
    sequence_length: Option<usize>,
    ticks_per_step: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ClockConfig {
    bpm: Option<f64>,
    sleep_granularity_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MidiConfig {
    port: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RunnerConfig {
    run_seconds: Option<u64>,
}

/// Effective settings; every accessor falls back to a built-in default
#[derive(Debug, Default)]
pub struct Config {
    file: ConfigFile,
}

impl Config {
    /// Embedded defaults plus `~/.config/steptracker/config.toml` if present
    ///
    /// A user file that cannot be read or parsed is logged and ignored.
    pub fn load() -> Self {
        let mut config = Self::embedded();
        if let Some(path) = user_config_path() {
            if path.exists() {
                match Self::read_file(&path) {
                    Ok(user) => config.merge(user),
                    Err(e) => log::warn!(target: "config", "ignoring user config: {}", e),
                }
            }
        }
        config
    }

    /// Only the defaults compiled into the binary
    pub fn embedded() -> Self {
        match Self::parse(DEFAULT_CONFIG) {
            Ok(config) => config,
            Err(e) => {
                log::error!(target: "config", "embedded config.toml is invalid: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            file: toml::from_str(contents)?,
        })
    }

    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Overlay every key `other` sets
    pub fn merge(&mut self, other: Config) {
        let base = &mut self.file;
        let user = other.file;

        overlay(&mut base.sequencer.sequence_count, user.sequencer.sequence_count);
        overlay(&mut base.sequencer.sequence_length, user.sequencer.sequence_length);
        overlay(&mut base.sequencer.ticks_per_step, user.sequencer.ticks_per_step);
        overlay(&mut base.clock.bpm, user.clock.bpm);
        overlay(&mut base.clock.sleep_granularity_ms, user.clock.sleep_granularity_ms);
        overlay(&mut base.midi.port, user.midi.port);
        overlay(&mut base.runner.run_seconds, user.runner.run_seconds);
    }

    pub fn tempo(&self) -> Tempo {
        self.file.clock.bpm.map(Tempo::new).unwrap_or_default()
    }

    /// Clamped to 1..=64
    pub fn sequence_count(&self) -> usize {
        self.file
            .sequencer
            .sequence_count
            .unwrap_or(DEFAULT_SEQUENCE_COUNT)
            .clamp(1, MAX_SEQUENCE_COUNT)
    }

    /// Clamped to 1..=256
    pub fn sequence_length(&self) -> usize {
        self.file
            .sequencer
            .sequence_length
            .unwrap_or(DEFAULT_SEQUENCE_LENGTH)
            .clamp(1, MAX_SEQUENCE_LENGTH)
    }

    pub fn ticks_per_step(&self) -> usize {
        self.file
            .sequencer
            .ticks_per_step
            .unwrap_or(DEFAULT_TICKS_PER_STEP)
            .clamp(1, MAX_TICKS_PER_STEP)
    }

    pub fn sleep_granularity(&self) -> Duration {
        Duration::from_millis(self.file.clock.sleep_granularity_ms.unwrap_or(1).max(1))
    }

    /// Output port name filter
    pub fn midi_port(&self) -> Option<&str> {
        self.file.midi.port.as_deref()
    }

    /// How long the headless runner plays before stopping
    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.file.runner.run_seconds.unwrap_or(8))
    }
}

fn overlay<T>(base: &mut Option<T>, user: Option<T>) {
    if user.is_some() {
        *base = user;
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("steptracker").join("config.toml"))
}
