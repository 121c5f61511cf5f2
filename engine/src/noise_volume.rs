//! Cubic 8-bit density field for the clouds.
//!
//! Each cell is `(128 + 128 * perlin(p)) * d * d` where `d` is a linear
//! falloff from the volume centre, so the shell fades to zero and the cloud
//! never clips against its bounding box.

use glam::Vec3;
use noise::{NoiseFn, Perlin};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::VolumeError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseVolumeConfig {
    pub size: u32,
    pub seed: u32,
    pub frequency: f64,
    /// x and z frequencies are divided by this, stretching clouds sideways.
    pub horizontal_stretch: f64,
}

impl Default for NoiseVolumeConfig {
    fn default() -> Self {
        Self {
            size: 128,
            seed: 0,
            frequency: 0.05,
            horizontal_stretch: 1.5,
        }
    }
}

/// Immutable after construction. Layout is x fastest, then y, then z,
/// matching a 3D texture upload.
#[derive(Debug, Clone)]
pub struct NoiseVolume {
    size: u32,
    data: Vec<u8>,
}

/// `1 - |p/size - 0.5|` for lattice point `p`.
pub fn radial_falloff(x: u32, y: u32, z: u32, size: u32) -> f32 {
    let half = size as f32 / 2.0;
    let offset = Vec3::new(x as f32 - half, y as f32 - half, z as f32 - half) / size as f32;
    1.0 - offset.length()
}

pub fn generate(config: &NoiseVolumeConfig) -> Result<NoiseVolume, VolumeError> {
    let size = config.size;
    if size == 0 {
        return Err(VolumeError::ZeroSize);
    }
    let side = size as usize;
    let slice_len = side.checked_mul(side).ok_or(VolumeError::TooLarge(size))?;
    let total = slice_len.checked_mul(side).ok_or(VolumeError::TooLarge(size))?;

    let started = std::time::Instant::now();
    let perlin = Perlin::new(config.seed);
    let fxz = config.frequency / config.horizontal_stretch;
    let fy = config.frequency;

    let mut data = Vec::new();
    data.try_reserve_exact(total).map_err(|_| VolumeError::TooLarge(size))?;
    data.resize(total, 0u8);
    data.par_chunks_mut(slice_len).enumerate().for_each(|(z, slice)| {
        for y in 0..side {
            for x in 0..side {
                let d = radial_falloff(x as u32, y as u32, z as u32, size);
                let n = perlin.get([x as f64 * fxz, y as f64 * fy, z as f64 * fxz]) as f32;
                let value = (128.0 + 128.0 * n) * d * d;
                slice[y * side + x] = value.clamp(0.0, 255.0) as u8;
            }
        }
    });

    info!(
        "generated {size}^3 cloud volume in {:.1} ms",
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(NoiseVolume { size, data })
}

impl NoiseVolume {
    /// Wraps raw texel data. `data.len()` must be `size^3`.
    pub fn from_raw(size: u32, data: Vec<u8>) -> Option<Self> {
        let side = size as usize;
        (size > 0 && data.len() == side * side * side).then_some(Self { size, data })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32, z: u32) -> usize {
        let side = self.size as usize;
        (z as usize * side + y as usize) * side + x as usize
    }

    pub fn density_at(&self, x: u32, y: u32, z: u32) -> u8 {
        self.data[self.index(x, y, z)]
    }

    fn texel(&self, x: i64, y: i64, z: i64) -> f32 {
        let max = self.size as i64 - 1;
        let idx = self.index(
            x.clamp(0, max) as u32,
            y.clamp(0, max) as u32,
            z.clamp(0, max) as u32,
        );
        self.data[idx] as f32 / 255.0
    }

    /// Linear-filtered lookup with clamp-to-edge, `uvw` in [0, 1]^3.
    /// Returns normalized density in [0, 1].
    pub fn sample_trilinear(&self, uvw: Vec3) -> f32 {
        let p = uvw * self.size as f32 - Vec3::splat(0.5);
        let base = p.floor();
        let t = p - base;
        let (x0, y0, z0) = (base.x as i64, base.y as i64, base.z as i64);

        let c000 = self.texel(x0, y0, z0);
        let c100 = self.texel(x0 + 1, y0, z0);
        let c010 = self.texel(x0, y0 + 1, z0);
        let c110 = self.texel(x0 + 1, y0 + 1, z0);
        let c001 = self.texel(x0, y0, z0 + 1);
        let c101 = self.texel(x0 + 1, y0, z0 + 1);
        let c011 = self.texel(x0, y0 + 1, z0 + 1);
        let c111 = self.texel(x0 + 1, y0 + 1, z0 + 1);

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let x00 = lerp(c000, c100, t.x);
        let x10 = lerp(c010, c110, t.x);
        let x01 = lerp(c001, c101, t.x);
        let x11 = lerp(c011, c111, t.x);
        lerp(lerp(x00, x10, t.y), lerp(x01, x11, t.y), t.z)
    }
}
