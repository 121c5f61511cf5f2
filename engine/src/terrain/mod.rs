//! Domain-warped height field shared by the surface and depth passes.

use fastnoise_lite::{FastNoiseLite, NoiseType};
use glam::{Vec2, Vec3};

use crate::params::TerrainShape;

pub mod biome;
pub mod mesh;

use biome::BiomeWeights;

/// Offset used to estimate the surface normal from neighbouring heights.
pub const NEIGHBOUR_SHIFT: f32 = 0.01;

/// Result of evaluating the field at one world-space `(x, z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainSample {
    pub position: Vec3,
    pub height: f32,
    pub warped: Vec2,
    pub normal: Vec3,
    /// `normal · up`, 1 on flat ground and 0 on a vertical cliff.
    pub up_dot: f32,
    pub weights: BiomeWeights,
}

/// Pure height/biome function. Holds only the seeded noise tables, so two
/// evaluations with the same inputs always agree bit for bit.
pub struct TerrainField {
    simplex: FastNoiseLite,
}

impl TerrainField {
    pub fn new(seed: i32) -> Self {
        let mut simplex = FastNoiseLite::with_seed(seed);
        simplex.set_noise_type(Some(NoiseType::OpenSimplex2));
        // frequencies are applied to the coordinates by the caller
        simplex.set_frequency(Some(1.0));
        Self { simplex }
    }

    #[inline]
    fn simplex(&self, p: Vec2) -> f32 {
        self.simplex.get_noise_2d(p.x, p.y)
    }

    /// Perturbs `(x, z)` by a secondary noise sample.
    pub fn warp(&self, x: f32, z: f32, shape: &TerrainShape) -> Vec2 {
        let p = Vec2::new(x, z);
        let offset =
            self.simplex(p * shape.position_frequency * shape.warp_frequency) * shape.warp_strength;
        p + Vec2::splat(offset)
    }

    fn elevation_at(&self, warped: Vec2, shape: &TerrainShape) -> f32 {
        let f = shape.position_frequency;
        let mut elevation = 0.0;
        elevation += self.simplex(warped * f) / 2.0;
        elevation += self.simplex(warped * f * 2.0) / 4.0;
        elevation += self.simplex(warped * f * 4.0) / 8.0;

        let sign = elevation.signum();
        elevation = elevation.abs().powi(2) * sign;
        elevation * shape.strength
    }

    /// Height of the displaced surface at `(x, z)`.
    pub fn elevation(&self, x: f32, z: f32, shape: &TerrainShape) -> f32 {
        self.elevation_at(self.warp(x, z, shape), shape)
    }

    /// Height used by the shadow/depth pass. Goes through the same
    /// [`TerrainField::elevation`] as [`TerrainField::evaluate`].
    pub fn depth_height(&self, x: f32, z: f32, shape: &TerrainShape) -> f32 {
        self.elevation(x, z, shape)
    }

    /// Full surface evaluation: height, normal, slope and biome weights.
    pub fn evaluate(&self, x: f32, z: f32, shape: &TerrainShape) -> TerrainSample {
        let warped = self.warp(x, z, shape);
        let height = self.elevation_at(warped, shape);
        let position = Vec3::new(x, height, z);

        let (ax, bz) = (x + NEIGHBOUR_SHIFT, z - NEIGHBOUR_SHIFT);
        let a = Vec3::new(ax, self.elevation(ax, z, shape), z);
        let b = Vec3::new(x, self.elevation(x, bz, shape), bz);
        let to_a = (a - position).normalize();
        let to_b = (b - position).normalize();
        let normal = to_a.cross(to_b).normalize_or_zero();
        let normal = if normal == Vec3::ZERO { Vec3::Y } else { normal };
        let up_dot = normal.dot(Vec3::Y);

        let snow_jitter = self.simplex(Vec2::new(x, z) * biome::SNOW_NOISE_FREQUENCY);
        let weights = biome::biome_weights(height, up_dot, snow_jitter);

        TerrainSample {
            position,
            height,
            warped,
            normal,
            up_dot,
            weights,
        }
    }
}
