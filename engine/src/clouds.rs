//! Volumetric cloud raymarching against the noise volume.
//!
//! The GPU shader in the viewer runs the same loop per fragment; this is the
//! reference used for tests and the CPU preview.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::noise_volume::NoiseVolume;
use crate::params::CloudParameters;

/// Once accumulated alpha exceeds this, the ray stops sampling.
pub const ALPHA_SATURATION: f32 = 0.99;
/// Offset of the central difference used for cloud shading.
pub const SHADING_STEP: f32 = 0.01;

/// Anything that can be sampled as normalized density over `[0, 1]^3`.
pub trait DensityField {
    fn density(&self, uvw: Vec3) -> f32;
    /// Texels per side, used to scale the jitter offset.
    fn resolution(&self) -> u32;
}

impl DensityField for NoiseVolume {
    fn density(&self, uvw: Vec3) -> f32 {
        self.sample_trilinear(uvw)
    }

    fn resolution(&self) -> u32 {
        self.size()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize_or_zero() }
    }
}

/// Placement of one unit cloud box. Instances share the volume and material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudInstance {
    pub position: Vec3,
    pub scale: Vec3,
}

impl CloudInstance {
    pub const fn new(position: Vec3, scale: Vec3) -> Self {
        Self { position, scale }
    }

    pub fn defaults() -> [CloudInstance; 4] {
        [
            CloudInstance::new(Vec3::new(3.0, 1.5, -2.0), Vec3::new(1.5, 1.0, 1.5)),
            CloudInstance::new(Vec3::new(-3.0, 1.5, 1.0), Vec3::new(2.0, 1.0, 1.5)),
            CloudInstance::new(Vec3::new(1.0, 1.5, 2.0), Vec3::new(2.0, 1.0, 2.5)),
            CloudInstance::new(Vec3::new(-2.0, 1.5, -3.0), Vec3::new(2.0, 2.0, 2.0)),
        ]
    }

    /// World ray expressed in the instance's unit-box space.
    pub fn local_ray(&self, ray: &Ray) -> Ray {
        Ray::new((ray.origin - self.position) / self.scale, ray.direction / self.scale)
    }
}

/// Entry and exit distances of `ray` through the box `[-0.5, 0.5]^3`.
pub fn hit_box(ray: &Ray) -> Option<(f32, f32)> {
    let inv = Vec3::ONE / ray.direction;
    let t_a = (Vec3::splat(-0.5) - ray.origin) * inv;
    let t_b = (Vec3::splat(0.5) - ray.origin) * inv;
    // a zero direction component with the origin on a slab plane yields NaN; min/max drop it
    let t0 = t_a.min(t_b).max_element();
    let t1 = t_a.max(t_b).min_element();
    (t0 <= t1 && t1 >= 0.0).then_some((t0.max(0.0), t1))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchResult {
    pub color: Vec3,
    pub alpha: f32,
    /// Density samples taken along the ray.
    pub samples: u32,
}

impl MarchResult {
    pub fn transparent(base: Vec3) -> Self {
        Self { color: base, alpha: 0.0, samples: 0 }
    }
}

pub fn wang_hash(seed: u32) -> u32 {
    let mut s = (seed ^ 61) ^ (seed >> 16);
    s = s.wrapping_mul(9);
    s ^= s >> 4;
    s = s.wrapping_mul(0x27d4_eb2d);
    s ^ (s >> 15)
}

/// Per-pixel start offset in [-1, 1]. Varies with `frame` so the banding
/// dither moves over time.
pub fn pixel_jitter(px: u32, py: u32, frame: u32) -> f32 {
    let seed = px
        .wrapping_mul(1973)
        .wrapping_add(py.wrapping_mul(9277))
        .wrapping_add(frame.wrapping_mul(26699));
    (wang_hash(seed) as f64 / 4_294_967_296.0) as f32 * 2.0 - 1.0
}

/// Collapses to a step at `edge0` when the edges meet (`range == 0`).
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 - edge0 <= f32::EPSILON {
        return if x >= edge0 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn shading(field: &impl DensityField, uvw: Vec3) -> f32 {
    field.density(uvw - Vec3::splat(SHADING_STEP)) - field.density(uvw + Vec3::splat(SHADING_STEP))
}

/// Marches one ray in unit-box space, compositing front to back.
pub fn march(
    ray: &Ray,
    field: &impl DensityField,
    params: &CloudParameters,
    jitter: f32,
) -> MarchResult {
    let dir = ray.direction;
    if params.steps == 0 || dir == Vec3::ZERO || !dir.is_finite() {
        return MarchResult::transparent(params.base);
    }
    let Some((t0, t1)) = hit_box(ray) else {
        return MarchResult::transparent(params.base);
    };

    // step length that crosses the box along the dominant axis in `steps`,
    // widened so no ray takes more than `steps` samples
    let inc = Vec3::ONE / dir.abs();
    let span = t1 - t0;
    let delta = (inc.min_element() / params.steps as f32).max(span / params.steps as f32);

    let resolution = field.resolution().max(1) as f32;
    let mut p = ray.origin + dir * t0 + dir * (jitter / resolution);

    let mut color = params.base;
    let mut alpha = 0.0f32;
    let mut samples = 0u32;
    let mut t = t0;
    while t < t1 && samples < params.steps {
        let uvw = p + Vec3::splat(0.5);
        let density = field.density(uvw);
        samples += 1;

        let (lo, hi) = (params.threshold - params.range, params.threshold + params.range);
        let d = smoothstep(lo, hi, density) * params.opacity;
        let shade = shading(field, uvw) * 3.0 + (p.x + p.y) * 0.25 + 0.2;

        color += (1.0 - alpha) * d * Vec3::splat(shade);
        alpha += (1.0 - alpha) * d;
        if alpha >= ALPHA_SATURATION {
            break;
        }
        p += dir * delta;
        t += delta;
    }

    MarchResult { color, alpha, samples }
}

/// Marches a world-space ray through every instance, nearest first.
pub fn march_instances(
    ray: &Ray,
    instances: &[CloudInstance],
    field: &impl DensityField,
    params: &CloudParameters,
    jitter: f32,
) -> MarchResult {
    let mut hits: Vec<(f32, Ray)> = instances
        .iter()
        .filter_map(|instance| {
            let local = instance.local_ray(ray);
            let (t0, _) = hit_box(&local)?;
            // distance in world units so instances of different scale sort correctly
            let entry = instance.position + (local.origin + local.direction * t0) * instance.scale;
            Some(((entry - ray.origin).length(), local))
        })
        .collect();
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut color = Vec3::ZERO;
    let mut alpha = 0.0f32;
    let mut samples = 0u32;
    for (_, local) in &hits {
        let result = march(local, field, params, jitter);
        samples += result.samples;
        color += (1.0 - alpha) * result.color * result.alpha;
        alpha += (1.0 - alpha) * result.alpha;
        if alpha >= ALPHA_SATURATION {
            break;
        }
    }

    if alpha > 0.0 {
        MarchResult { color: color / alpha, alpha, samples }
    } else {
        MarchResult { color: params.base, alpha: 0.0, samples }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Uniform(f32);

    impl DensityField for Uniform {
        fn density(&self, _uvw: Vec3) -> f32 {
            self.0
        }
        fn resolution(&self) -> u32 {
            64
        }
    }

    #[test]
    fn axis_ray_hits_unit_box() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        let (t0, t1) = hit_box(&ray).unwrap();
        assert!((t0 - 2.5).abs() < 1e-6 && (t1 - 3.5).abs() < 1e-6);
    }

    #[test]
    fn ray_starting_inside_enters_at_zero() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(hit_box(&ray).unwrap().0, 0.0);
    }

    #[test]
    fn parallel_ray_outside_slab_misses() {
        let ray = Ray::new(Vec3::new(0.0, 2.0, -3.0), Vec3::Z);
        assert!(hit_box(&ray).is_none());
        let behind = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Z);
        assert!(hit_box(&behind).is_none());
    }

    #[test]
    fn opaque_volume_stops_after_one_sample() {
        let params = CloudParameters { opacity: 1.0, ..CloudParameters::default() };
        let ray = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z);
        let result = march(&ray, &Uniform(1.0), &params, 0.0);
        assert_eq!(result.samples, 1);
        assert!(result.alpha >= ALPHA_SATURATION);
    }

    #[test]
    fn empty_volume_is_transparent_and_bounded() {
        let params = CloudParameters::default();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z);
        let result = march(&ray, &Uniform(0.0), &params, 0.0);
        assert_eq!(result.alpha, 0.0);
        assert!(result.samples <= params.steps);
        assert!(result.samples >= params.steps - 1);
    }

    #[test]
    fn zero_range_acts_as_a_hard_threshold() {
        let params = CloudParameters { threshold: 0.25, range: 0.0, ..CloudParameters::default() };
        let ray = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z);

        let at_threshold = march(&ray, &Uniform(0.25), &params, 0.0);
        assert!(at_threshold.alpha.is_finite() && at_threshold.color.is_finite());
        assert!(at_threshold.alpha > 0.0);

        let below = march(&ray, &Uniform(0.2), &params, 0.0);
        assert_eq!(below.alpha, 0.0);

        let empty = CloudParameters { threshold: 0.0, range: 0.0, ..CloudParameters::default() };
        let result = march(&ray, &Uniform(0.0), &empty, 0.0);
        assert!(result.alpha.is_finite() && result.color.is_finite());
    }

    #[test]
    fn diagonal_ray_never_exceeds_step_budget() {
        let params = CloudParameters { steps: 40, ..CloudParameters::default() };
        let ray = Ray::new(Vec3::splat(-2.0), Vec3::ONE);
        let result = march(&ray, &Uniform(0.0), &params, 0.0);
        assert!(result.samples <= 40);
    }

    #[test]
    fn jitter_is_in_range_and_varies_by_frame() {
        let a = pixel_jitter(10, 20, 0);
        let b = pixel_jitter(10, 20, 1);
        assert!((-1.0..=1.0).contains(&a) && (-1.0..=1.0).contains(&b));
        assert_ne!(a, b);
        assert_eq!(a, pixel_jitter(10, 20, 0));
    }

    #[test]
    fn local_ray_maps_instance_into_unit_box() {
        let instance = CloudInstance::new(Vec3::new(3.0, 1.5, -2.0), Vec3::new(1.5, 1.0, 1.5));
        let ray = Ray::new(Vec3::new(3.0, 1.5, -10.0), Vec3::Z);
        let local = instance.local_ray(&ray);
        assert!(local.origin.x.abs() < 1e-6 && local.origin.y.abs() < 1e-6);
        assert!(hit_box(&local).is_some());
    }
}
