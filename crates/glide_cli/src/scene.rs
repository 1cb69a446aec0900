//! Scene file handling

use anyhow::{Context, Result};
use glide_animation::{Easing, EngineConfig, PlayMode, StopMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A playable scene (glide.toml)
#[derive(Debug, Deserialize, Serialize)]
pub struct Scene {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub mode: PlayMode,
    /// Request a stop this many seconds after playback starts
    #[serde(default)]
    pub stop_after_secs: Option<f64>,
    #[serde(default = "default_stop_mode")]
    pub stop_mode: StopMode,
    #[serde(default, rename = "property")]
    pub properties: Vec<PropertyConfig>,
}

fn default_stop_mode() -> StopMode {
    StopMode::FinishCycle
}

/// One animated property
#[derive(Debug, Deserialize, Serialize)]
pub struct PropertyConfig {
    pub name: String,
    /// Easing name or `cubic-bezier(x1, y1, x2, y2)`
    #[serde(default = "default_curve")]
    pub curve: String,
    #[serde(default)]
    pub start: f32,
    #[serde(default = "default_end")]
    pub end: f32,
}

fn default_curve() -> String {
    "linear".to_string()
}

fn default_end() -> f32 {
    1.0
}

impl PropertyConfig {
    pub fn easing(&self) -> Result<Easing> {
        self.curve
            .parse()
            .with_context(|| format!("Invalid curve for property `{}`", self.name))
    }
}

impl Scene {
    /// Load a scene from a file, or `glide.toml` inside a directory
    pub fn load(path: &Path) -> Result<Self> {
        let scene_path = if path.is_dir() {
            path.join("glide.toml")
        } else {
            path.to_path_buf()
        };

        if !scene_path.exists() {
            anyhow::bail!(
                "No scene found at {}. Run `glide init` to create one.",
                scene_path.display()
            );
        }

        let content = fs::read_to_string(&scene_path)
            .with_context(|| format!("Failed to read {}", scene_path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse {}", scene_path.display()))
    }

    /// Parse and validate scene TOML
    pub fn parse(content: &str) -> Result<Self> {
        let scene: Scene = toml::from_str(content)?;
        scene.validate()?;
        Ok(scene)
    }

    fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        if self.properties.is_empty() {
            anyhow::bail!("Scene has no [[property]] entries");
        }
        for property in &self.properties {
            property.easing()?;
        }
        if let Some(secs) = self.stop_after_secs {
            if !(secs.is_finite() && secs >= 0.0) {
                anyhow::bail!("stop_after_secs must be a non-negative number, got {secs}");
            }
        }
        Ok(())
    }

    /// Starter scene written by `glide init`
    pub fn example() -> Self {
        Self {
            engine: EngineConfig::new(1.0, 30.0),
            mode: PlayMode::ForwardReverse,
            stop_after_secs: None,
            stop_mode: default_stop_mode(),
            properties: vec![
                PropertyConfig {
                    name: "opacity".to_string(),
                    curve: "ease-in-out-cubic".to_string(),
                    start: 0.0,
                    end: 1.0,
                },
                PropertyConfig {
                    name: "offset_x".to_string(),
                    curve: "cubic-bezier(0.34, 1.56, 0.64, 1)".to_string(),
                    start: -40.0,
                    end: 0.0,
                },
            ],
        }
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize scene")
    }
}
