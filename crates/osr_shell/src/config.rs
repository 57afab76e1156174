use std::path::{Path, PathBuf};

use clap::Parser;
use frame_scheduler::{DEFAULT_FRAME_RATE, FramePacingMode, FrameSchedulerConfig};
use input::DoubleClickThresholds;
use render_protocol::{ArgbColor, ColorParseError};
use renderer::CompositorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_START_URL: &str = "osr://demo";

/// Shell settings. Every field has a default, so a config file may name any subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub show_update_rect: bool,
    pub external_begin_frame_enabled: bool,
    pub windowless_frame_rate: u32,
    pub background_color: ArgbColor,
    pub double_click_distance_x: i32,
    pub double_click_distance_y: i32,
    pub double_click_interval_ms: u64,
    pub start_url: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let thresholds = DoubleClickThresholds::default();
        Self {
            show_update_rect: false,
            external_begin_frame_enabled: false,
            windowless_frame_rate: DEFAULT_FRAME_RATE,
            background_color: ArgbColor::OPAQUE_WHITE,
            double_click_distance_x: thresholds.distance_x,
            double_click_distance_y: thresholds.distance_y,
            double_click_interval_ms: thresholds.interval_millis,
            start_url: DEFAULT_START_URL.to_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid background color {text:?}: {reason:?}")]
    BackgroundColor {
        text: String,
        reason: ColorParseError,
    },
}

impl ShellConfig {
    pub fn from_json_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text, path)
    }

    /// Loads the config file named on the command line, then applies flag overrides.
    pub fn from_arguments(arguments: &ShellArguments) -> Result<Self, ConfigError> {
        let mut config = match arguments.config.as_deref() {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        arguments.apply_overrides(&mut config)?;
        Ok(config)
    }

    pub fn compositor_config(&self) -> CompositorConfig {
        CompositorConfig {
            background_color: self.background_color,
            show_update_rect: self.show_update_rect,
        }
    }

    pub fn scheduler_config(&self) -> FrameSchedulerConfig {
        FrameSchedulerConfig {
            mode: if self.external_begin_frame_enabled {
                FramePacingMode::ExternalFrame
            } else {
                FramePacingMode::TimerDriven
            },
            target_frame_rate: self.windowless_frame_rate,
        }
    }

    pub fn double_click_thresholds(&self) -> DoubleClickThresholds {
        DoubleClickThresholds {
            distance_x: self.double_click_distance_x,
            distance_y: self.double_click_distance_y,
            interval_millis: self.double_click_interval_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Parser)]
#[command(author, version, about = "Off-screen rendering browser shell")]
pub struct ShellArguments {
    /// JSON config file.
    #[arg(long, value_parser)]
    pub config: Option<PathBuf>,
    /// Outline the most recent dirty rectangle.
    #[arg(long)]
    pub show_update_rect: bool,
    /// Drive frames by asking the engine for them on a timer.
    #[arg(long)]
    pub external_begin_frame: bool,
    /// Target windowless frame rate.
    #[arg(long)]
    pub frame_rate: Option<u32>,
    /// Background color as AARRGGBB hex.
    #[arg(long)]
    pub background_color: Option<String>,
    /// Page shown by the demo engine.
    #[arg(long)]
    pub url: Option<String>,
}

impl ShellArguments {
    fn apply_overrides(&self, config: &mut ShellConfig) -> Result<(), ConfigError> {
        if self.show_update_rect {
            config.show_update_rect = true;
        }
        if self.external_begin_frame {
            config.external_begin_frame_enabled = true;
        }
        if let Some(frame_rate) = self.frame_rate {
            config.windowless_frame_rate = frame_rate;
        }
        if let Some(text) = self.background_color.as_deref() {
            config.background_color =
                ArgbColor::parse_hex(text).map_err(|reason| ConfigError::BackgroundColor {
                    text: text.to_owned(),
                    reason,
                })?;
        }
        if let Some(url) = self.url.as_ref() {
            config.start_url = url.clone();
        }
        Ok(())
    }
}
