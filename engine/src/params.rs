use std::ops::RangeInclusive;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ParameterOutOfRange;

pub const POSITION_FREQUENCY_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const STRENGTH_RANGE: RangeInclusive<f32> = 0.0..=10.0;
pub const WARP_FREQUENCY_RANGE: RangeInclusive<f32> = 0.0..=10.0;
pub const WARP_STRENGTH_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const CLOUD_UNIT_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const CLOUD_STEPS_RANGE: RangeInclusive<u32> = 1..=256;

/// Clamps a tunable into its range. Out-of-range writes are logged and
/// swallowed; NaN falls back to the lower bound.
pub fn clamp_param(name: &'static str, value: f32, range: RangeInclusive<f32>) -> f32 {
    let (min, max) = (*range.start(), *range.end());
    if range.contains(&value) {
        return value;
    }
    let clamped = if value.is_nan() { min } else { value.clamp(min, max) };
    let err = ParameterOutOfRange { name, value, min, max };
    debug!("clamped tunable: {err}, using {clamped}");
    clamped
}

fn clamp_steps(value: u32) -> u32 {
    let (min, max) = (*CLOUD_STEPS_RANGE.start(), *CLOUD_STEPS_RANGE.end());
    if !CLOUD_STEPS_RANGE.contains(&value) {
        let err = ParameterOutOfRange {
            name: "steps",
            value: value as f32,
            min: min as f32,
            max: max as f32,
        };
        debug!("clamped tunable: {err}");
    }
    value.clamp(min, max)
}

fn clamp_color(color: Vec3) -> Vec3 {
    let c = Vec3::select(color.is_nan_mask(), Vec3::ZERO, color);
    c.clamp(Vec3::ZERO, Vec3::ONE)
}

/// sRGB channel (0..=255) to linear.
pub fn srgb8_to_linear(channel: u8) -> f32 {
    let c = channel as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb8(value: f32) -> u8 {
    let v = value.clamp(0.0, 1.0);
    let s = if v <= 0.0031308 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0).round() as u8
}

pub fn rgb8(r: u8, g: u8, b: u8) -> Vec3 {
    Vec3::new(srgb8_to_linear(r), srgb8_to_linear(g), srgb8_to_linear(b))
}

/// The four scalars that shape the height field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainShape {
    pub position_frequency: f32,
    pub strength: f32,
    pub warp_frequency: f32,
    pub warp_strength: f32,
}

impl Default for TerrainShape {
    fn default() -> Self {
        Self {
            position_frequency: 0.2,
            strength: 2.0,
            warp_frequency: 5.0,
            warp_strength: 0.5,
        }
    }
}

impl TerrainShape {
    pub fn clamped(self) -> Self {
        Self {
            position_frequency: clamp_param(
                "position_frequency",
                self.position_frequency,
                POSITION_FREQUENCY_RANGE,
            ),
            strength: clamp_param("strength", self.strength, STRENGTH_RANGE),
            warp_frequency: clamp_param(
                "warp_frequency",
                self.warp_frequency,
                WARP_FREQUENCY_RANGE,
            ),
            warp_strength: clamp_param("warp_strength", self.warp_strength, WARP_STRENGTH_RANGE),
        }
    }
}

/// Biome bands in blend order, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    WaterDeep,
    WaterSurface,
    Sand,
    Grass,
    Rock,
    Snow,
}

impl Biome {
    pub const COUNT: usize = 6;
    pub const ALL: [Biome; Biome::COUNT] = [
        Biome::WaterDeep,
        Biome::WaterSurface,
        Biome::Sand,
        Biome::Grass,
        Biome::Rock,
        Biome::Snow,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Biome::WaterDeep => "Water deep",
            Biome::WaterSurface => "Water surface",
            Biome::Sand => "Sand",
            Biome::Grass => "Grass",
            Biome::Rock => "Rock",
            Biome::Snow => "Snow",
        }
    }
}

/// Linear RGB colour per biome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiomePalette {
    pub colors: [Vec3; Biome::COUNT],
}

impl Default for BiomePalette {
    fn default() -> Self {
        Self {
            colors: [
                rgb8(0x00, 0x2b, 0x3d),
                rgb8(0x66, 0xa8, 0xff),
                rgb8(0xff, 0xe8, 0x94),
                rgb8(0x85, 0xd5, 0x34),
                rgb8(0xbf, 0xbd, 0x8d),
                rgb8(0xff, 0xff, 0xff),
            ],
        }
    }
}

impl BiomePalette {
    pub fn get(&self, biome: Biome) -> Vec3 {
        self.colors[biome.index()]
    }

    pub fn set(&mut self, biome: Biome, color: Vec3) {
        self.colors[biome.index()] = clamp_color(color);
    }
}

/// Material block shared by every cloud instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudParameters {
    pub base: Vec3,
    pub threshold: f32,
    pub opacity: f32,
    pub range: f32,
    pub steps: u32,
}

impl Default for CloudParameters {
    fn default() -> Self {
        Self {
            base: rgb8(0x79, 0x8a, 0xa0),
            threshold: 0.25,
            opacity: 0.25,
            range: 0.1,
            steps: 100,
        }
    }
}

impl CloudParameters {
    pub fn clamped(self) -> Self {
        Self {
            base: clamp_color(self.base),
            threshold: clamp_param("threshold", self.threshold, CLOUD_UNIT_RANGE),
            opacity: clamp_param("opacity", self.opacity, CLOUD_UNIT_RANGE),
            range: clamp_param("range", self.range, CLOUD_UNIT_RANGE),
            steps: clamp_steps(self.steps),
        }
    }
}

/// Uniform block read by the terrain stages. One copy is frozen per frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UniformParameters {
    pub time: f32,
    pub shape: TerrainShape,
    pub palette: BiomePalette,
}

/// A single write from the configuration collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterUpdate {
    PositionFrequency(f32),
    Strength(f32),
    WarpFrequency(f32),
    WarpStrength(f32),
    BiomeColor(Biome, Vec3),
    CloudBase(Vec3),
    CloudThreshold(f32),
    CloudOpacity(f32),
    CloudRange(f32),
    CloudSteps(u32),
}

impl ParameterUpdate {
    pub fn apply(self, uniforms: &mut UniformParameters, cloud: &mut CloudParameters) {
        let shape = &mut uniforms.shape;
        match self {
            ParameterUpdate::PositionFrequency(v) => {
                shape.position_frequency =
                    clamp_param("position_frequency", v, POSITION_FREQUENCY_RANGE)
            }
            ParameterUpdate::Strength(v) => {
                shape.strength = clamp_param("strength", v, STRENGTH_RANGE)
            }
            ParameterUpdate::WarpFrequency(v) => {
                shape.warp_frequency = clamp_param("warp_frequency", v, WARP_FREQUENCY_RANGE)
            }
            ParameterUpdate::WarpStrength(v) => {
                shape.warp_strength = clamp_param("warp_strength", v, WARP_STRENGTH_RANGE)
            }
            ParameterUpdate::BiomeColor(biome, color) => uniforms.palette.set(biome, color),
            ParameterUpdate::CloudBase(color) => cloud.base = clamp_color(color),
            ParameterUpdate::CloudThreshold(v) => {
                cloud.threshold = clamp_param("threshold", v, CLOUD_UNIT_RANGE)
            }
            ParameterUpdate::CloudOpacity(v) => {
                cloud.opacity = clamp_param("opacity", v, CLOUD_UNIT_RANGE)
            }
            ParameterUpdate::CloudRange(v) => {
                cloud.range = clamp_param("range", v, CLOUD_UNIT_RANGE)
            }
            ParameterUpdate::CloudSteps(v) => cloud.steps = clamp_steps(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_writes_are_clamped() {
        let mut uniforms = UniformParameters::default();
        let mut cloud = CloudParameters::default();

        ParameterUpdate::PositionFrequency(3.0).apply(&mut uniforms, &mut cloud);
        ParameterUpdate::Strength(-1.0).apply(&mut uniforms, &mut cloud);
        ParameterUpdate::WarpStrength(f32::NAN).apply(&mut uniforms, &mut cloud);
        ParameterUpdate::CloudSteps(0).apply(&mut uniforms, &mut cloud);
        ParameterUpdate::CloudOpacity(1.5).apply(&mut uniforms, &mut cloud);

        assert_eq!(uniforms.shape.position_frequency, 1.0);
        assert_eq!(uniforms.shape.strength, 0.0);
        assert_eq!(uniforms.shape.warp_strength, 0.0);
        assert_eq!(cloud.steps, 1);
        assert_eq!(cloud.opacity, 1.0);
    }

    #[test]
    fn in_range_writes_pass_through() {
        let mut uniforms = UniformParameters::default();
        let mut cloud = CloudParameters::default();
        ParameterUpdate::WarpFrequency(7.5).apply(&mut uniforms, &mut cloud);
        ParameterUpdate::BiomeColor(Biome::Sand, Vec3::new(0.1, 0.2, 0.3))
            .apply(&mut uniforms, &mut cloud);

        assert_eq!(uniforms.shape.warp_frequency, 7.5);
        assert_eq!(uniforms.palette.get(Biome::Sand), Vec3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn srgb_conversion_round_trips_palette_bytes() {
        for byte in [0x00u8, 0x2b, 0x66, 0x94, 0xd5, 0xff] {
            assert_eq!(linear_to_srgb8(srgb8_to_linear(byte)), byte);
        }
    }
}
