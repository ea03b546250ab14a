//! Viewer settings

use serde::{Deserialize, Serialize};
use shared::{LayoutMode, ViewportMode};

use crate::viewport::InteractionRates;

/// Layout defaults applied to a new window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Initial layout mode
    pub mode: LayoutMode,
    /// Stereo baseline for the pseudo-3D layout
    pub eye_spacing: f64,
    /// Field of view used when framing a scene (degrees)
    pub std_view_angle: f64,
    /// Orthographic up axis (1..6 = +X,+Y,+Z,-X,-Y,-Z)
    pub ortho_up_axis: u8,
    /// Orthographic front axis, never parallel to the up axis
    pub ortho_front_axis: u8,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Simple,
            eye_spacing: 0.25,
            std_view_angle: 40.0,
            ortho_up_axis: 3,
            ortho_front_axis: 5,
        }
    }
}

/// Image capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Largest tile rendered offscreen, further capped by the renderer
    pub max_tile_width: u32,
    pub max_tile_height: u32,
    /// Gap between panes of a multi-pane capture, in pixels
    pub pane_border: u32,
    pub antialias: u32,
    pub transparency_layers: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            max_tile_width: 2048,
            max_tile_height: 2048,
            pane_border: 2,
            antialias: 0,
            transparency_layers: 0,
        }
    }
}

/// Mouse interaction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    pub translate_rate: f64,
    pub tumble_rate: f64,
    pub zoom_rate: f64,
    /// Keep spinning after a tumble drag is released
    pub automatic_tumble: bool,
    /// Side of the pick box handed to interactive tools, in pixels
    pub pick_tolerance: f64,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        let rates = InteractionRates::default();
        Self {
            translate_rate: rates.translate,
            tumble_rate: rates.tumble,
            zoom_rate: rates.zoom,
            automatic_tumble: true,
            pick_tolerance: 5.0,
        }
    }
}

impl InteractionSettings {
    pub fn rates(&self) -> InteractionRates {
        InteractionRates {
            translate: self.translate_rate,
            tumble: self.tumble_rate,
            zoom: self.zoom_rate,
        }
    }
}

/// Viewport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    pub mode: ViewportMode,
    /// Background color RGB
    pub background_color: [u8; 3],
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            mode: ViewportMode::Relative,
            background_color: [30, 30, 35],
        }
    }
}

/// All viewer settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub layout: LayoutSettings,
    pub capture: CaptureSettings,
    pub interaction: InteractionSettings,
    pub viewport: ViewportSettings,
}

impl ViewerSettings {
    /// Parse settings JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load settings from file, or return default if not found
    pub fn load() -> Self {
        if let Some(dirs) = directories::ProjectDirs::from("org", "scene-viewer", "scene-viewer") {
            let config_path = dirs.config_dir().join("settings.json");
            if let Ok(json) = std::fs::read_to_string(&config_path) {
                match Self::from_json(&json) {
                    Ok(settings) => return settings,
                    Err(e) => tracing::warn!(path = %config_path.display(), "ignoring settings file: {e}"),
                }
            }
        }
        Self::default()
    }

    /// Save settings to file
    pub fn save(&self) {
        if let Some(dirs) = directories::ProjectDirs::from("org", "scene-viewer", "scene-viewer") {
            let config_dir = dirs.config_dir();
            if std::fs::create_dir_all(config_dir).is_ok() {
                let config_path = config_dir.join("settings.json");
                if let Ok(json) = serde_json::to_string_pretty(self) {
                    if let Err(e) = std::fs::write(&config_path, json) {
                        tracing::warn!(path = %config_path.display(), "failed to save settings: {e}");
                    }
                }
            }
        }
    }
}
