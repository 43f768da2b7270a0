//! Configuration persistence for glyphcast settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Serializable color representation for config storage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl CanvasColor {
    pub const BLACK: CanvasColor = CanvasColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const WHITE: CanvasColor = CanvasColor {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    /// Convert to image crate RGBA format (0-255)
    pub fn to_rgba_u8(self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            255,
        ]
    }
}

/// Which pair of world axes the stroke is projected onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectionPlane {
    /// Drop Z (depth)
    #[default]
    Xy,
    /// Drop Y (height)
    Xz,
    /// Drop X
    Zy,
}

/// How canvas pixels are turned into the three tensor channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelMode {
    /// R, G, B as painted
    #[default]
    Rgb,
    /// Green channel copied into all three channels, as in training preprocessing
    GreenReplicated,
}

/// When the forward pass runs relative to the end of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InferenceMode {
    /// Inside the session-end call
    Inline,
    /// On the tick following session end
    #[default]
    NextTick,
    /// On the background worker thread, polled every tick
    Worker,
}

/// Application configuration persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphConfig {
    /// Path to the frozen ONNX classifier
    pub model_path: PathBuf,
    /// Canvas side length in pixels, must match the model input
    pub canvas_size: u32,
    /// Half-width of the square brush in pixels
    pub brush_radius: u32,
    /// Bias added to the bounding-box extent before dividing
    #[serde(default = "default_scale_epsilon")]
    pub scale_epsilon: f32,
    /// World axes kept when flattening the stroke
    pub projection: ProjectionPlane,
    /// Flip Y so world "up" is image "up"
    #[serde(default = "default_flip_vertical")]
    pub flip_vertical: bool,
    /// Canvas clear color
    pub background: CanvasColor,
    /// Brush color
    pub brush: CanvasColor,
    /// Tensor channel layout
    #[serde(default)]
    pub channel_mode: ChannelMode,
    /// Classifications below this probability are reported as unknown
    pub confidence_threshold: f32,
    /// Scheduling of the forward pass
    #[serde(default)]
    pub inference_mode: InferenceMode,
    /// Cooldown the host should apply after each dispatched gesture
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f32,
    /// Tick rate used by the replay scheduler
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
    /// Whether to write each raw canvas to the debug directory
    #[serde(default)]
    pub debug_dump: bool,
    /// Where debug canvases are written
    #[serde(default = "default_debug_dir")]
    pub debug_dir: PathBuf,
}

fn default_scale_epsilon() -> f32 {
    1e-5
}

fn default_flip_vertical() -> bool {
    true
}

fn default_cooldown_secs() -> f32 {
    1.5
}

fn default_tick_rate_hz() -> u32 {
    60
}

fn default_debug_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("glyphcast")
        .join("debug")
}

fn default_model_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glyphcast")
        .join("gesture_cnn.onnx")
}

impl GlyphConfig {
    /// Directory name under the platform config directory
    pub const ID: &'static str = "glyphcast";

    /// Default location of the config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::ID).join("config.json"))
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            log::warn!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:?}", err);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Usable span of stroke pixel centers along each axis
    pub fn usable_extent(&self) -> u32 {
        self.canvas_size
            .saturating_sub(self.brush_radius.saturating_mul(2))
    }

    /// Reject settings the rasterizer cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.canvas_size == 0 {
            anyhow::bail!("canvas_size must be positive");
        }
        if self.usable_extent() == 0 {
            anyhow::bail!(
                "brush_radius {} leaves no drawable area on a {}px canvas",
                self.brush_radius,
                self.canvas_size
            );
        }
        if !(self.scale_epsilon > 0.0 && self.scale_epsilon.is_finite()) {
            anyhow::bail!("scale_epsilon must be a positive finite number");
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "confidence_threshold {} is outside [0, 1]",
                self.confidence_threshold
            );
        }
        Ok(())
    }
}

impl Default for GlyphConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            // Input size of the exported classifier
            canvas_size: 216,
            brush_radius: 4,
            scale_epsilon: default_scale_epsilon(),
            projection: ProjectionPlane::Xy,
            flip_vertical: default_flip_vertical(),
            // White on black, identical in every channel
            background: CanvasColor::BLACK,
            brush: CanvasColor::WHITE,
            channel_mode: ChannelMode::Rgb,
            confidence_threshold: 0.3,
            inference_mode: InferenceMode::NextTick,
            cooldown_secs: default_cooldown_secs(),
            tick_rate_hz: default_tick_rate_hz(),
            debug_dump: false,
            debug_dir: default_debug_dir(),
        }
    }
}
