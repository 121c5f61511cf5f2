use std::path::{Path, PathBuf};

use bevy::asset::io::file::FileAssetReader;
use bevy::asset::LoadState;
use bevy::prelude::*;
use bevy::render::render_resource::TextureFormat;
use diorama_engine::environment::{mean_radiance, texels_from_rgba32f};
use diorama_engine::AssetLoadError;

use crate::config::SceneSettings;

/// Tracks the equirectangular environment map until its radiance is applied.
#[derive(Resource)]
pub struct EnvironmentMap {
    pub path: PathBuf,
    pub handle: Option<Handle<Image>>,
    pub applied: bool,
}

pub fn load_environment_map(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    settings: Res<SceneSettings>,
) {
    let path = PathBuf::from(&settings.environment_map);
    let on_disk = FileAssetReader::get_base_path().join("assets").join(&path);
    let handle = if on_disk.exists() {
        info!("Loading environment map {path:?}");
        Some(asset_server.load(path.clone()))
    } else {
        error!("{}", AssetLoadError::Missing(on_disk));
        None
    };
    let applied = handle.is_none();
    commands.insert_resource(EnvironmentMap { path, handle, applied });
}

/// Ambient colour from the map's mean radiance.
fn ambient_from_image(path: &Path, image: &Image) -> Result<Vec3, AssetLoadError> {
    let format = image.texture_descriptor.format;
    if format != TextureFormat::Rgba32Float {
        return Err(AssetLoadError::UnsupportedFormat(format!("{format:?} in {path:?}")));
    }
    let size = image.texture_descriptor.size;
    let texels = texels_from_rgba32f(&image.data)?;
    mean_radiance(size.width, size.height, &texels)
}

pub fn apply_environment_lighting(
    mut env: ResMut<EnvironmentMap>,
    asset_server: Res<AssetServer>,
    images: Res<Assets<Image>>,
    mut ambient: ResMut<AmbientLight>,
    mut clear_color: ResMut<ClearColor>,
) {
    if env.applied {
        return;
    }
    let Some(handle) = env.handle.clone() else {
        return;
    };

    match asset_server.get_load_state(&handle) {
        Some(LoadState::Loaded) => {}
        Some(LoadState::Failed) => {
            error!("{}", AssetLoadError::Failed { path: env.path.clone() });
            env.applied = true;
            return;
        }
        _ => return,
    }
    env.applied = true;

    let Some(image) = images.get(&handle) else {
        return;
    };
    match ambient_from_image(&env.path, image) {
        Ok(mean) => {
            let peak = mean.max_element().max(1e-4);
            let hue = mean / peak;
            ambient.color = Color::rgb_linear(hue.x, hue.y, hue.z);
            ambient.brightness = peak.clamp(0.05, 1.0);
            let sky = mean.clamp(Vec3::ZERO, Vec3::ONE);
            clear_color.0 = Color::rgb_linear(sky.x, sky.y, sky.z);
            info!("Environment mean radiance {mean:?} applied to ambient light");
        }
        Err(e) => error!("{e}"),
    }
}
