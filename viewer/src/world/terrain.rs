use std::sync::Arc;

use bevy::prelude::*;
use bevy::tasks::{AsyncComputeTaskPool, Task};
use diorama_engine::params::{BiomePalette, TerrainShape};
use diorama_engine::terrain::mesh::{build_surface, SurfaceMesh, TerrainGrid};
use diorama_engine::terrain::TerrainField;
use futures_lite::future;

use crate::frame::FrameDriver;
use crate::rendering::mesh_builder::{terrain_mesh, write_colors};

/// Terrain geometry currently on screen and the parameters it was built with.
#[derive(Resource)]
pub struct TerrainState {
    pub field: Arc<TerrainField>,
    pub grid: TerrainGrid,
    pub mesh: Handle<Mesh>,
    pub surface: SurfaceMesh,
    pub built_shape: TerrainShape,
    pub built_palette: BiomePalette,
    pub building: bool,
}

/// Background rebuild after a shape change.
#[derive(Component)]
pub struct TerrainBuildTask {
    pub task: Task<SurfaceMesh>,
    pub shape: TerrainShape,
    pub palette: BiomePalette,
}

#[derive(Component)]
pub struct Terrain;

/// Builds the first surface on the calling thread; startup may block.
pub fn spawn_terrain(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    field: Arc<TerrainField>,
    grid: TerrainGrid,
    shape: TerrainShape,
    palette: BiomePalette,
) -> TerrainState {
    let started = std::time::Instant::now();
    let surface = build_surface(&field, &grid, &shape, &palette);
    info!(
        "Built terrain: {} vertices in {:.1} ms",
        surface.positions.len(),
        started.elapsed().as_secs_f64() * 1000.0
    );

    let mesh = meshes.add(terrain_mesh(&surface));
    commands.spawn((
        PbrBundle {
            mesh: mesh.clone(),
            material: materials.add(StandardMaterial {
                base_color: Color::WHITE,
                metallic: 0.0,
                perceptual_roughness: 1.0,
                ..default()
            }),
            ..default()
        },
        Terrain,
    ));

    TerrainState {
        field,
        grid,
        mesh,
        surface,
        built_shape: shape,
        built_palette: palette,
        building: false,
    }
}

/// Shape changes start a background rebuild; palette-only changes recolour
/// the stored weights in place.
pub fn request_terrain_rebuild(
    mut commands: Commands,
    mut state: ResMut<TerrainState>,
    driver: Res<FrameDriver>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    let Some(frame) = driver.last else {
        return;
    };
    let uniforms = frame.uniforms;
    if state.building {
        return;
    }

    if uniforms.shape != state.built_shape {
        let field = state.field.clone();
        let grid = state.grid;
        let shape = uniforms.shape;
        let palette = uniforms.palette;
        let task = AsyncComputeTaskPool::get()
            .spawn(async move { build_surface(&field, &grid, &shape, &palette) });
        commands.spawn(TerrainBuildTask { task, shape, palette });
        state.building = true;
        debug!("Terrain rebuild requested for {shape:?}");
    } else if uniforms.palette != state.built_palette {
        state.surface.recolor(&uniforms.palette);
        let state = &mut *state;
        if let Some(mesh) = meshes.get_mut(&state.mesh) {
            write_colors(mesh, &state.surface.colors);
        }
        state.built_palette = uniforms.palette;
    }
}

pub fn finish_terrain_rebuild(
    mut commands: Commands,
    mut tasks: Query<(Entity, &mut TerrainBuildTask)>,
    mut state: ResMut<TerrainState>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (entity, mut build) in tasks.iter_mut() {
        let Some(surface) = future::block_on(future::poll_once(&mut build.task)) else {
            continue;
        };
        if let Some(mesh) = meshes.get_mut(&state.mesh) {
            *mesh = terrain_mesh(&surface);
        }
        state.surface = surface;
        state.built_shape = build.shape;
        state.built_palette = build.palette;
        state.building = false;
        commands.entity(entity).despawn();
        info!("Terrain rebuilt");
    }
}
