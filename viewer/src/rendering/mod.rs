use bevy::pbr::{CascadeShadowConfigBuilder, DirectionalLightShadowMap};
use bevy::prelude::*;

pub mod cloud_material;
pub mod environment;
pub mod mesh_builder;

use cloud_material::CloudMaterial;
use environment::{apply_environment_lighting, load_environment_map, EnvironmentMap};

pub const SUN_POSITION: Vec3 = Vec3::new(6.25, 3.0, 4.0);
pub const SHADOW_MAP_SIZE: usize = 1024;
pub const SHADOW_DISTANCE: f32 = 30.0;

pub struct RenderingPlugin;

impl Plugin for RenderingPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(MaterialPlugin::<CloudMaterial>::default())
            .insert_resource(Msaa::Sample4)
            .insert_resource(DirectionalLightShadowMap { size: SHADOW_MAP_SIZE })
            .insert_resource(AmbientLight {
                color: Color::WHITE,
                brightness: 0.3,
            })
            .add_systems(Startup, (setup_lighting, load_environment_map))
            .add_systems(
                Update,
                apply_environment_lighting.run_if(resource_exists::<EnvironmentMap>()),
            );
    }
}

fn setup_lighting(mut commands: Commands) {
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            color: Color::WHITE,
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        transform: Transform::from_translation(SUN_POSITION).looking_at(Vec3::ZERO, Vec3::Y),
        cascade_shadow_config: CascadeShadowConfigBuilder {
            num_cascades: 1,
            maximum_distance: SHADOW_DISTANCE,
            ..default()
        }
        .into(),
        ..default()
    });
}
