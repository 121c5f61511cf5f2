//! Biome classification and colour compositing.

use glam::Vec3;

use super::TerrainSample;
use crate::params::{Biome, BiomePalette};

pub const SEA_LEVEL: f32 = -0.1;
pub const DEEP_WATER_HEIGHT: f32 = -1.0;
pub const GRASS_LINE: f32 = -0.06;
pub const ROCK_UP_DOT: f32 = 0.8;
pub const SNOW_LINE: f32 = 0.45;
pub const SNOW_LINE_VARIATION: f32 = 0.1;
pub const SNOW_NOISE_FREQUENCY: f32 = 15.0;

/// Half-width of the smooth transition at each height band edge.
pub const HEIGHT_BLEND: f32 = 0.01;
/// Half-width of the rock transition in `up_dot` units.
pub const SLOPE_BLEND: f32 = 0.02;

/// One weight per [`Biome`], in [`Biome::ALL`] order. Weights are in [0, 1]
/// and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BiomeWeights(pub [f32; Biome::COUNT]);

impl BiomeWeights {
    pub fn get(&self, biome: Biome) -> f32 {
        self.0[biome.index()]
    }

    pub fn dominant(&self) -> Biome {
        let mut best = Biome::WaterDeep;
        for biome in Biome::ALL {
            if self.get(biome) > self.get(best) {
                best = biome;
            }
        }
        best
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn band(edge: f32, half_width: f32, x: f32) -> f32 {
    smoothstep(edge - half_width, edge + half_width, x)
}

/// Classifies a point by height and slope.
///
/// Bands are layered bottom-up (deep water, surface water, sand, grass,
/// rock, snow). Each layer covers a fraction `t` of whatever lies beneath
/// it, so the weights are a partition of unity.
pub fn biome_weights(height: f32, up_dot: f32, snow_jitter: f32) -> BiomeWeights {
    let above_grass = band(GRASS_LINE, HEIGHT_BLEND, height);
    let steep = 1.0 - band(ROCK_UP_DOT, SLOPE_BLEND, up_dot);
    let snow_line = SNOW_LINE + snow_jitter * SNOW_LINE_VARIATION;

    let mut cover = [0.0f32; Biome::COUNT];
    cover[Biome::WaterSurface.index()] = smoothstep(DEEP_WATER_HEIGHT, SEA_LEVEL, height);
    cover[Biome::Sand.index()] = band(SEA_LEVEL, HEIGHT_BLEND, height);
    cover[Biome::Grass.index()] = above_grass;
    cover[Biome::Rock.index()] = steep * above_grass;
    cover[Biome::Snow.index()] = band(snow_line, HEIGHT_BLEND, height);

    let mut weights = [0.0f32; Biome::COUNT];
    let mut remaining = 1.0f32;
    for i in (1..Biome::COUNT).rev() {
        weights[i] = cover[i] * remaining;
        remaining *= 1.0 - cover[i];
    }
    weights[0] = remaining;
    BiomeWeights(weights)
}

/// Unlit surface colour: the palette blended by biome weights.
pub fn blend_albedo(weights: &BiomeWeights, palette: &BiomePalette) -> Vec3 {
    Biome::ALL
        .iter()
        .fold(Vec3::ZERO, |acc, &biome| acc + palette.get(biome) * weights.get(biome))
}

/// Lighting inputs for [`color_at`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewInfo {
    /// Unit vector pointing towards the light.
    pub light_direction: Vec3,
    pub light_color: Vec3,
    pub ambient: Vec3,
}

impl Default for ViewInfo {
    fn default() -> Self {
        Self {
            light_direction: Vec3::new(6.25, 3.0, 4.0).normalize(),
            light_color: Vec3::splat(0.8),
            ambient: Vec3::splat(0.3),
        }
    }
}

/// Final colour of a terrain sample under one directional light.
pub fn color_at(sample: &TerrainSample, palette: &BiomePalette, view: &ViewInfo) -> Vec3 {
    let albedo = blend_albedo(&sample.weights, palette);
    let lambert = sample.normal.dot(view.light_direction).max(0.0);
    let lit = albedo * (view.ambient + view.light_color * lambert);
    if lit.is_finite() {
        lit.clamp(Vec3::ZERO, Vec3::ONE)
    } else {
        Vec3::ZERO
    }
}
