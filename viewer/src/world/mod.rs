use std::sync::Arc;

use bevy::app::AppExit;
use bevy::pbr::NotShadowCaster;
use bevy::prelude::*;
use diorama_engine::clouds::CloudInstance;
use diorama_engine::csg::{subtract, BoxBrush};
use diorama_engine::noise_volume::{generate, NoiseVolume};
use diorama_engine::schedule::FrameScheduler;
use diorama_engine::terrain::biome::SEA_LEVEL;
use diorama_engine::terrain::TerrainField;
use diorama_engine::{SceneError, UniformParameters};

use crate::config::SceneSettings;
use crate::frame::{FrameDriver, FrameSet};
use crate::rendering::cloud_material::{
    spawn_clouds, volume_image, CloudAssets, CloudMaterial, CloudUniform,
};
use crate::rendering::mesh_builder::board_mesh;

pub mod terrain;

use terrain::{finish_terrain_rebuild, request_terrain_rebuild, spawn_terrain, TerrainState};

pub const BOARD_OUTER: Vec3 = Vec3::new(11.0, 2.0, 11.0);
pub const BOARD_HOLE: Vec3 = Vec3::new(10.0, 2.1, 10.0);
pub const WATER_SIZE: f32 = 10.0;

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, build_scene.pipe(abort_on_startup_error))
            .add_systems(
                Update,
                (request_terrain_rebuild, finish_terrain_rebuild)
                    .chain()
                    .after(FrameSet::Drive)
                    .run_if(resource_exists::<TerrainState>()),
            );
    }
}

/// Shared read-only inputs for anything that re-renders the scene off the
/// main thread.
#[derive(Resource)]
pub struct SceneSources {
    pub field: Arc<TerrainField>,
    pub volume: Arc<NoiseVolume>,
    pub instances: Vec<CloudInstance>,
}

#[derive(Component)]
pub struct Board;

#[derive(Component)]
pub struct Water;

/// One-shot construction of everything static. Any failure here ends the app.
pub fn build_scene(
    mut commands: Commands,
    settings: Res<SceneSettings>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut cloud_materials: ResMut<Assets<CloudMaterial>>,
    mut images: ResMut<Assets<Image>>,
) -> Result<(), SceneError> {
    info!("Building scene...");

    let volume = Arc::new(generate(&settings.volume)?);

    let mut board = subtract(&BoxBrush::new(BOARD_OUTER), &BoxBrush::new(BOARD_HOLE))?;
    board.clear_groups();
    commands.spawn((
        PbrBundle {
            mesh: meshes.add(board_mesh(&board)),
            material: materials.add(StandardMaterial {
                base_color: Color::WHITE,
                metallic: 0.0,
                perceptual_roughness: 0.0,
                ..default()
            }),
            ..default()
        },
        Board,
    ));

    commands.spawn((
        PbrBundle {
            mesh: meshes.add(Mesh::from(shape::Plane { size: WATER_SIZE, subdivisions: 0 })),
            material: materials.add(StandardMaterial {
                base_color: Color::WHITE,
                specular_transmission: 1.0,
                perceptual_roughness: 0.3,
                ior: 1.333,
                ..default()
            }),
            transform: Transform::from_xyz(0.0, SEA_LEVEL, 0.0),
            ..default()
        },
        NotShadowCaster,
        Water,
    ));

    let field = Arc::new(TerrainField::new(settings.terrain_seed));
    let shape = settings.terrain.clamped();
    let palette = settings.palette();
    let terrain = spawn_terrain(
        &mut commands,
        &mut meshes,
        &mut materials,
        field.clone(),
        settings.terrain_grid,
        shape,
        palette,
    );
    commands.insert_resource(terrain);

    let cloud_params = settings.cloud_parameters();
    let uniforms = UniformParameters { time: 0.0, shape, palette };
    let scheduler = FrameScheduler::new(uniforms, cloud_params);
    let cloud_material = cloud_materials.add(CloudMaterial {
        uniforms: CloudUniform::from_frame(scheduler.cloud_uniforms(), volume.size()),
        volume: images.add(volume_image(&volume)),
    });
    spawn_clouds(&mut commands, &mut meshes, &cloud_material, &settings.clouds.instances);
    commands.insert_resource(CloudAssets { material: cloud_material, resolution: volume.size() });

    commands.insert_resource(FrameDriver::new(scheduler));
    commands.insert_resource(SceneSources {
        field,
        volume,
        instances: settings.clouds.instances.clone(),
    });

    info!("Scene ready");
    Ok(())
}

pub fn abort_on_startup_error(
    In(result): In<Result<(), SceneError>>,
    mut exit: EventWriter<AppExit>,
) {
    if let Err(e) = result {
        error!("Scene construction failed: {e}");
        exit.send(AppExit);
    }
}
