//! Top-down software render of the scene, used for PNG snapshots.

use glam::Vec3;
use image::RgbaImage;
use rayon::prelude::*;
use tracing::info;

use crate::clouds::{march_instances, pixel_jitter, CloudInstance, DensityField, Ray};
use crate::params::{linear_to_srgb8, CloudParameters, UniformParameters};
use crate::terrain::biome::{color_at, ViewInfo};
use crate::terrain::TerrainField;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewSettings {
    pub width: u32,
    pub height: u32,
    /// World units covered along each image axis, centred on the origin.
    pub extent: f32,
    /// Height the cloud rays start from, looking straight down.
    pub eye_height: f32,
    pub frame: u32,
    pub view: ViewInfo,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            extent: 10.0,
            eye_height: 20.0,
            frame: 0,
            view: ViewInfo::default(),
        }
    }
}

/// Renders terrain colour with the cloud layer composited on top.
pub fn render_preview(
    field: &TerrainField,
    uniforms: &UniformParameters,
    volume: &(impl DensityField + Sync),
    instances: &[CloudInstance],
    clouds: &CloudParameters,
    settings: &PreviewSettings,
) -> RgbaImage {
    let start = std::time::Instant::now();
    let (width, height) = (settings.width.max(1), settings.height.max(1));
    let mut image = RgbaImage::new(width, height);
    let row_bytes = width as usize * 4;

    image.par_chunks_mut(row_bytes).enumerate().for_each(|(py, row)| {
        let z = ((py as f32 + 0.5) / height as f32 - 0.5) * settings.extent;
        for (px, pixel) in row.chunks_exact_mut(4).enumerate() {
            let x = ((px as f32 + 0.5) / width as f32 - 0.5) * settings.extent;
            let sample = field.evaluate(x, z, &uniforms.shape);
            let ground = color_at(&sample, &uniforms.palette, &settings.view);

            let ray = Ray::new(Vec3::new(x, settings.eye_height, z), Vec3::NEG_Y);
            let jitter = pixel_jitter(px as u32, py as u32, settings.frame);
            let cloud = march_instances(&ray, instances, volume, clouds, jitter);
            let a = cloud.alpha;
            let color = cloud.color.clamp(Vec3::ZERO, Vec3::ONE) * a + ground * (1.0 - a);

            pixel[0] = linear_to_srgb8(color.x);
            pixel[1] = linear_to_srgb8(color.y);
            pixel[2] = linear_to_srgb8(color.z);
            pixel[3] = 255;
        }
    });

    info!("rendered {width}x{height} preview in {:?}", start.elapsed());
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Solid;

    impl DensityField for Solid {
        fn density(&self, _uvw: Vec3) -> f32 {
            1.0
        }
        fn resolution(&self) -> u32 {
            8
        }
    }

    fn settings() -> PreviewSettings {
        PreviewSettings { width: 16, height: 16, ..PreviewSettings::default() }
    }

    #[test]
    fn preview_has_requested_size_and_is_opaque() {
        let field = TerrainField::new(4);
        let image = render_preview(
            &field,
            &UniformParameters::default(),
            &Solid,
            &[],
            &CloudParameters::default(),
            &settings(),
        );
        assert_eq!(image.dimensions(), (16, 16));
        assert!(image.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn clouds_change_only_covered_pixels() {
        let field = TerrainField::new(4);
        let uniforms = UniformParameters::default();
        let params = CloudParameters::default();
        let instance = [CloudInstance::new(Vec3::new(-2.5, 1.5, -2.5), Vec3::splat(2.0))];

        let bare = render_preview(&field, &uniforms, &Solid, &[], &params, &settings());
        let cloudy = render_preview(&field, &uniforms, &Solid, &instance, &params, &settings());

        // pixel (4, 4) sits at world (-2.19, -2.19), inside the instance footprint
        assert_ne!(bare.get_pixel(4, 4), cloudy.get_pixel(4, 4));
        assert_eq!(bare.get_pixel(14, 14), cloudy.get_pixel(14, 14));
    }
}
