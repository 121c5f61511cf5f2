use std::fs;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use diorama_engine::clouds::CloudInstance;
use diorama_engine::noise_volume::NoiseVolumeConfig;
use diorama_engine::params::{Biome, BiomePalette, CloudParameters, TerrainShape};
use diorama_engine::terrain::mesh::TerrainGrid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SETTINGS_FILE: &str = "scene_settings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} is not a #rrggbb colour: {value:?}")]
    Color { field: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: f32,
    pub height: f32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Diorama".into(),
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Biome colours as sRGB hex strings, the way a designer picks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteHex {
    pub water_deep: String,
    pub water_surface: String,
    pub sand: String,
    pub grass: String,
    pub rock: String,
    pub snow: String,
}

impl Default for PaletteHex {
    fn default() -> Self {
        Self {
            water_deep: "#002b3d".into(),
            water_surface: "#66a8ff".into(),
            sand: "#ffe894".into(),
            grass: "#85d534".into(),
            rock: "#bfbd8d".into(),
            snow: "#ffffff".into(),
        }
    }
}

impl PaletteHex {
    fn entries(&self) -> [(Biome, &str); Biome::COUNT] {
        [
            (Biome::WaterDeep, &self.water_deep),
            (Biome::WaterSurface, &self.water_surface),
            (Biome::Sand, &self.sand),
            (Biome::Grass, &self.grass),
            (Biome::Rock, &self.rock),
            (Biome::Snow, &self.snow),
        ]
    }

    pub fn to_palette(&self) -> Result<BiomePalette, ConfigError> {
        let mut palette = BiomePalette::default();
        for (biome, hex) in self.entries() {
            palette.set(biome, parse_hex(biome.label(), hex)?);
        }
        Ok(palette)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSettings {
    pub base_color: String,
    pub threshold: f32,
    pub opacity: f32,
    pub range: f32,
    pub steps: u32,
    pub instances: Vec<CloudInstance>,
}

impl Default for CloudSettings {
    fn default() -> Self {
        let defaults = CloudParameters::default();
        Self {
            base_color: "#798aa0".into(),
            threshold: defaults.threshold,
            opacity: defaults.opacity,
            range: defaults.range,
            steps: defaults.steps,
            instances: CloudInstance::defaults().to_vec(),
        }
    }
}

impl CloudSettings {
    pub fn to_parameters(&self) -> Result<CloudParameters, ConfigError> {
        Ok(CloudParameters {
            base: parse_hex("cloud base", &self.base_color)?,
            threshold: self.threshold,
            opacity: self.opacity,
            range: self.range,
            steps: self.steps,
        }
        .clamped())
    }
}

/// Everything the viewer reads from `scene_settings.json`.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub window: WindowSettings,
    pub terrain_seed: i32,
    pub terrain_grid: TerrainGrid,
    pub terrain: TerrainShape,
    pub palette: PaletteHex,
    pub volume: NoiseVolumeConfig,
    pub clouds: CloudSettings,
    pub environment_map: String,
    pub preview_size: u32,
    pub preview_dir: PathBuf,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            window: WindowSettings::default(),
            terrain_seed: 0,
            terrain_grid: TerrainGrid::default(),
            terrain: TerrainShape::default(),
            palette: PaletteHex::default(),
            volume: NoiseVolumeConfig::default(),
            clouds: CloudSettings::default(),
            environment_map: "textures/spruit_sunrise.hdr".into(),
            preview_size: 512,
            preview_dir: PathBuf::from("previews"),
        }
    }
}

impl SceneSettings {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: SceneSettings = serde_json::from_str(text)?;
        // colours are checked up front so startup never sees a bad one
        settings.palette.to_palette()?;
        settings.clouds.to_parameters()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Missing or broken files fall back to defaults. Runs before logging is
    /// up, so the outcome is returned for [`report_settings_source`].
    pub fn load_or_default(path: &Path) -> (Self, SettingsSource) {
        let mut source = SettingsSource {
            path: path.to_path_buf(),
            found: path.exists(),
            error: None,
        };
        if !source.found {
            return (Self::default(), source);
        }
        match Self::load(path) {
            Ok(settings) => (settings, source),
            Err(e) => {
                source.error = Some(e.to_string());
                (Self::default(), source)
            }
        }
    }

    pub fn palette(&self) -> BiomePalette {
        self.palette.to_palette().unwrap_or_default()
    }

    pub fn cloud_parameters(&self) -> CloudParameters {
        self.clouds.to_parameters().unwrap_or_default()
    }
}

/// Where the scene settings came from.
#[derive(Resource, Debug, Clone)]
pub struct SettingsSource {
    pub path: PathBuf,
    pub found: bool,
    pub error: Option<String>,
}

pub fn report_settings_source(source: Res<SettingsSource>) {
    match (&source.error, source.found) {
        (Some(e), _) => warn!(
            "Failed to load scene settings from {:?}, using defaults: {e}",
            source.path
        ),
        (None, true) => info!("Loaded scene settings from {:?}", source.path),
        (None, false) => info!("{:?} not found, using default scene settings", source.path),
    }
}

fn parse_hex(field: &str, value: &str) -> Result<Vec3, ConfigError> {
    let color = Color::hex(value).map_err(|_| ConfigError::Color {
        field: field.to_string(),
        value: value.to_string(),
    })?;
    let [r, g, b, _] = color.as_linear_rgba_f32();
    Ok(Vec3::new(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_palette() {
        let palette = SceneSettings::default().palette();
        let engine = BiomePalette::default();
        for biome in Biome::ALL {
            let diff = (palette.get(biome) - engine.get(biome)).abs().max_element();
            assert!(diff < 1e-4, "{biome:?} differs by {diff}");
        }
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let settings = SceneSettings::from_json(
            r##"{ "terrain": { "strength": 4.0 }, "palette": { "sand": "#ff0000" } }"##,
        )
        .unwrap();
        assert_eq!(settings.terrain.strength, 4.0);
        assert_eq!(settings.terrain.warp_frequency, 5.0);
        assert_eq!(settings.clouds.instances.len(), 4);
        assert_eq!(settings.palette().get(Biome::Sand), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn bad_colour_is_rejected() {
        let err =
            SceneSettings::from_json(r#"{ "clouds": { "base_color": "cloudy" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Color { .. }));
    }

    #[test]
    fn cloud_settings_are_clamped() {
        let json = r#"{ "clouds": { "opacity": 3.0, "steps": 0 } }"#;
        let settings = SceneSettings::from_json(json).unwrap();
        let params = settings.cloud_parameters();
        assert_eq!(params.opacity, 1.0);
        assert_eq!(params.steps, 1);
    }
}
