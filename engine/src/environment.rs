//! Ambient term from an equirectangular environment map.

use std::f32::consts::PI;

use glam::Vec3;
use tracing::warn;

use crate::error::AssetLoadError;

const RGBA32F_TEXEL_BYTES: usize = 16;

/// Unpacks little-endian `Rgba32Float` pixel data, dropping alpha.
pub fn texels_from_rgba32f(bytes: &[u8]) -> Result<Vec<[f32; 3]>, AssetLoadError> {
    if bytes.len() % RGBA32F_TEXEL_BYTES != 0 {
        return Err(AssetLoadError::Corrupt {
            expected: bytes.len() / RGBA32F_TEXEL_BYTES + 1,
            found: bytes.len() / RGBA32F_TEXEL_BYTES,
        });
    }
    Ok(bytes
        .chunks_exact(RGBA32F_TEXEL_BYTES)
        .map(|t| {
            let channel = |i: usize| {
                f32::from_le_bytes([t[i * 4], t[i * 4 + 1], t[i * 4 + 2], t[i * 4 + 3]])
            };
            [channel(0), channel(1), channel(2)]
        })
        .collect())
}

/// Solid-angle weighted mean radiance of a `width` x `height` lat-long map.
/// Rows are weighted by the cosine of their latitude; non-finite texels are
/// skipped.
pub fn mean_radiance(width: u32, height: u32, texels: &[[f32; 3]]) -> Result<Vec3, AssetLoadError> {
    let expected = width as usize * height as usize;
    if expected == 0 || texels.len() != expected {
        return Err(AssetLoadError::Corrupt { expected: expected.max(1), found: texels.len() });
    }

    let mut sum = Vec3::ZERO;
    let mut total_weight = 0.0f32;
    let mut skipped = 0usize;
    for (row_index, row) in texels.chunks_exact(width as usize).enumerate() {
        let latitude = ((row_index as f32 + 0.5) / height as f32 - 0.5) * PI;
        let weight = latitude.cos();
        for texel in row {
            let radiance = Vec3::from_array(*texel);
            if !radiance.is_finite() {
                skipped += 1;
                continue;
            }
            sum += radiance * weight;
            total_weight += weight;
        }
    }
    if skipped > 0 {
        warn!("environment map has {skipped} non-finite texels");
    }
    if total_weight <= 0.0 {
        return Err(AssetLoadError::Corrupt { expected, found: expected - skipped });
    }
    Ok(sum / total_weight)
}
