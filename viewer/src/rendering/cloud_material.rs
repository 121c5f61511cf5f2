use bevy::pbr::{MaterialPipeline, MaterialPipelineKey, NotShadowCaster};
use bevy::prelude::*;
use bevy::reflect::TypePath;
use bevy::render::mesh::MeshVertexBufferLayout;
use bevy::render::render_resource::{
    AsBindGroup, Extent3d, Face, RenderPipelineDescriptor, ShaderRef, ShaderType,
    SpecializedMeshPipelineError, TextureDimension, TextureFormat,
};
use bevy::render::texture::ImageSampler;
use diorama_engine::clouds::CloudInstance;
use diorama_engine::noise_volume::NoiseVolume;
use diorama_engine::schedule::CloudUniforms;

pub const CLOUD_SHADER: &str = "shaders/cloud.wgsl";

/// Layout must match `CloudUniform` in `cloud.wgsl`.
#[derive(Debug, Clone, Copy, Default, ShaderType)]
pub struct CloudUniform {
    pub base_color: Vec4,
    pub camera_position: Vec3,
    pub threshold: f32,
    pub opacity: f32,
    pub range: f32,
    pub steps: u32,
    pub frame: u32,
    pub resolution: f32,
}

impl CloudUniform {
    pub fn from_frame(clouds: &CloudUniforms, resolution: u32) -> Self {
        let p = &clouds.params;
        Self {
            base_color: p.base.extend(1.0),
            camera_position: clouds.camera_position,
            threshold: p.threshold,
            opacity: p.opacity,
            range: p.range,
            steps: p.steps,
            frame: clouds.frame,
            resolution: resolution.max(1) as f32,
        }
    }
}

/// Raymarched cloud box. Drawn from the inside faces so the march still
/// works with the camera inside the box.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct CloudMaterial {
    #[uniform(0)]
    pub uniforms: CloudUniform,
    #[texture(1, dimension = "3d")]
    #[sampler(2)]
    pub volume: Handle<Image>,
}

impl Material for CloudMaterial {
    fn vertex_shader() -> ShaderRef {
        CLOUD_SHADER.into()
    }

    fn fragment_shader() -> ShaderRef {
        CLOUD_SHADER.into()
    }

    fn alpha_mode(&self) -> AlphaMode {
        AlphaMode::Blend
    }

    fn specialize(
        _pipeline: &MaterialPipeline<Self>,
        descriptor: &mut RenderPipelineDescriptor,
        _layout: &MeshVertexBufferLayout,
        _key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        descriptor.primitive.cull_mode = Some(Face::Front);
        Ok(())
    }
}

/// Single-channel 3D texture, linear filtering, clamp to edge.
pub fn volume_image(volume: &NoiseVolume) -> Image {
    let side = volume.size();
    let mut image = Image::new(
        Extent3d {
            width: side,
            height: side,
            depth_or_array_layers: side,
        },
        TextureDimension::D3,
        volume.data().to_vec(),
        TextureFormat::R8Unorm,
    );
    image.sampler = ImageSampler::linear();
    image
}

#[derive(Component)]
pub struct CloudBox;

#[derive(Resource)]
pub struct CloudAssets {
    pub material: Handle<CloudMaterial>,
    pub resolution: u32,
}

pub fn spawn_clouds(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    material: &Handle<CloudMaterial>,
    instances: &[CloudInstance],
) {
    let cube = meshes.add(Mesh::from(shape::Cube { size: 1.0 }));
    for instance in instances {
        commands.spawn((
            MaterialMeshBundle {
                mesh: cube.clone(),
                material: material.clone(),
                transform: Transform::from_translation(instance.position)
                    .with_scale(instance.scale),
                ..default()
            },
            NotShadowCaster,
            CloudBox,
        ));
    }
    info!("Spawned {} cloud boxes", instances.len());
}

/// Pushes this frame's cloud uniforms into the shared material.
pub fn write_cloud_uniforms(
    clouds: &CloudUniforms,
    assets: &CloudAssets,
    materials: &mut Assets<CloudMaterial>,
) {
    if let Some(material) = materials.get_mut(&assets.material) {
        material.uniforms = CloudUniform::from_frame(clouds, assets.resolution);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diorama_engine::params::CloudParameters;

    #[test]
    fn uniform_mirrors_frame_state() {
        let clouds = CloudUniforms {
            params: CloudParameters::default(),
            camera_position: Vec3::new(-10.0, 6.0, -2.0),
            frame: 42,
        };
        let u = CloudUniform::from_frame(&clouds, 128);
        assert_eq!(u.steps, 100);
        assert_eq!(u.frame, 42);
        assert_eq!(u.resolution, 128.0);
        assert_eq!(u.camera_position, clouds.camera_position);
        assert_eq!(u.base_color.w, 1.0);
    }

    #[test]
    fn volume_image_is_3d() {
        let volume = NoiseVolume::from_raw(4, vec![7; 64]).unwrap();
        let image = volume_image(&volume);
        assert_eq!(image.texture_descriptor.dimension, TextureDimension::D3);
        assert_eq!(image.texture_descriptor.size.depth_or_array_layers, 4);
        assert_eq!(image.data.len(), 64);
    }
}
