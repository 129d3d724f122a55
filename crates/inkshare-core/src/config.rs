//! Engine and tool settings.

use crate::element::{ElementStyle, SerializableColor};
use crate::history::MAX_UNDO_HISTORY;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stroke color used when nothing else is configured.
pub const DEFAULT_COLOR: &str = "#114488";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for the engine and the tools driving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum interval between shared ongoing updates.
    #[serde(default = "default_throttle_ms")]
    pub ongoing_throttle_ms: u64,
    /// Minimum interval between eraser queries.
    #[serde(default = "default_throttle_ms")]
    pub query_throttle_ms: u64,
    /// Vertex count of ellipse and padded point polygons.
    #[serde(default = "default_ellipse_segments")]
    pub ellipse_segments: usize,
    #[serde(default = "default_eraser_padding")]
    pub eraser_padding: f64,
    #[serde(default = "default_pipette_padding")]
    pub pipette_padding: f64,
    #[serde(default)]
    pub select_padding: f64,
    /// Maximum entries per undo/redo stack.
    #[serde(default = "default_max_undo_history")]
    pub max_undo_history: usize,
    #[serde(default = "default_stroke_width")]
    pub default_stroke_width: f64,
    #[serde(default = "default_color")]
    pub default_color: SerializableColor,
}

fn default_throttle_ms() -> u64 {
    20
}

fn default_ellipse_segments() -> usize {
    32
}

fn default_eraser_padding() -> f64 {
    8.0
}

fn default_pipette_padding() -> f64 {
    2.0
}

fn default_max_undo_history() -> usize {
    MAX_UNDO_HISTORY
}

fn default_stroke_width() -> f64 {
    3.0
}

fn default_color() -> SerializableColor {
    SerializableColor::from_hex(DEFAULT_COLOR).unwrap_or_else(SerializableColor::black)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ongoing_throttle_ms: default_throttle_ms(),
            query_throttle_ms: default_throttle_ms(),
            ellipse_segments: default_ellipse_segments(),
            eraser_padding: default_eraser_padding(),
            pipette_padding: default_pipette_padding(),
            select_padding: 0.0,
            max_undo_history: default_max_undo_history(),
            default_stroke_width: default_stroke_width(),
            default_color: default_color(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.ellipse_segments < 3 {
            return Err(ConfigError::Invalid {
                field: "ellipse_segments",
                reason: format!("need at least 3, got {}", self.ellipse_segments),
            });
        }
        if self.max_undo_history == 0 {
            return Err(ConfigError::Invalid {
                field: "max_undo_history",
                reason: "must be positive".to_string(),
            });
        }
        for (field, value) in [
            ("eraser_padding", self.eraser_padding),
            ("pipette_padding", self.pipette_padding),
            ("select_padding", self.select_padding),
            ("default_stroke_width", self.default_stroke_width),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a non-negative number, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Style given to newly drawn elements.
    pub fn default_style(&self) -> ElementStyle {
        ElementStyle::new(self.default_color, self.default_stroke_width)
    }
}
