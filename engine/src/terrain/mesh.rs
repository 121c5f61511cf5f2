//! CPU displacement of the terrain plane.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::biome::{blend_albedo, BiomeWeights};
use super::TerrainField;
use crate::params::{BiomePalette, TerrainShape};

/// Upper bound on grid subdivisions; keeps every vertex index within `u32`.
pub const MAX_SUBDIVISIONS: u32 = 4096;

/// Square plane in the XZ plane, centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainGrid {
    pub size: f32,
    pub subdivisions: u32,
}

impl Default for TerrainGrid {
    fn default() -> Self {
        Self { size: 10.0, subdivisions: 500 }
    }
}

impl TerrainGrid {
    pub fn vertices_per_side(&self) -> usize {
        self.subdivisions.clamp(1, MAX_SUBDIVISIONS) as usize + 1
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices_per_side() * self.vertices_per_side()
    }

    /// World-space `(x, z)` of grid vertex `(ix, iz)`. Rows run from -z to +z.
    pub fn vertex_xz(&self, ix: usize, iz: usize) -> (f32, f32) {
        let cells = self.vertices_per_side() - 1;
        let step = self.size / cells as f32;
        let half = self.size / 2.0;
        (ix as f32 * step - half, iz as f32 * step - half)
    }

    /// Two counter-clockwise (seen from +y) triangles per cell.
    pub fn indices(&self) -> Vec<u32> {
        let side = self.vertices_per_side();
        let cells = side - 1;
        let mut indices = Vec::with_capacity(cells * cells * 6);
        for iz in 0..cells {
            for ix in 0..cells {
                let a = (iz * side + ix) as u32;
                let b = ((iz + 1) * side + ix) as u32;
                let c = ((iz + 1) * side + ix + 1) as u32;
                let d = (iz * side + ix + 1) as u32;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }
        indices
    }
}

/// Displaced, coloured terrain surface. Keeps the biome weights so a palette
/// change only recolours.
#[derive(Debug, Clone, Default)]
pub struct SurfaceMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub weights: Vec<BiomeWeights>,
    pub indices: Vec<u32>,
}

impl SurfaceMesh {
    pub fn recolor(&mut self, palette: &BiomePalette) {
        self.colors = self
            .weights
            .par_iter()
            .map(|w| blend_albedo(w, palette).extend(1.0).to_array())
            .collect();
    }
}

pub fn build_surface(
    field: &TerrainField,
    grid: &TerrainGrid,
    shape: &TerrainShape,
    palette: &BiomePalette,
) -> SurfaceMesh {
    let side = grid.vertices_per_side();
    let samples: Vec<_> = (0..grid.vertex_count())
        .into_par_iter()
        .map(|i| {
            let (x, z) = grid.vertex_xz(i % side, i / side);
            field.evaluate(x, z, shape)
        })
        .collect();

    let mut mesh = SurfaceMesh {
        positions: samples.iter().map(|s| s.position.to_array()).collect(),
        normals: samples.iter().map(|s| s.normal.to_array()).collect(),
        colors: Vec::new(),
        weights: samples.iter().map(|s| s.weights).collect(),
        indices: grid.indices(),
    };
    mesh.recolor(palette);
    mesh
}

/// Vertex positions for the shadow/depth pass. Same grid, same field.
pub fn build_depth_positions(
    field: &TerrainField,
    grid: &TerrainGrid,
    shape: &TerrainShape,
) -> Vec<[f32; 3]> {
    let side = grid.vertices_per_side();
    (0..grid.vertex_count())
        .into_par_iter()
        .map(|i| {
            let (x, z) = grid.vertex_xz(i % side, i / side);
            [x, field.depth_height(x, z, shape), z]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Biome;
    use glam::Vec3;

    fn small_grid() -> TerrainGrid {
        TerrainGrid { size: 10.0, subdivisions: 24 }
    }

    #[test]
    fn grid_spans_the_plane() {
        let grid = small_grid();
        assert_eq!(grid.vertex_xz(0, 0), (-5.0, -5.0));
        assert_eq!(grid.vertex_xz(24, 24), (5.0, 5.0));
        assert_eq!(grid.indices().len(), 24 * 24 * 6);
    }

    #[test]
    fn oversized_grid_is_clamped_to_u32_indices() {
        let grid = TerrainGrid { size: 10.0, subdivisions: 100_000 };
        assert_eq!(grid.vertices_per_side(), MAX_SUBDIVISIONS as usize + 1);
        assert!(u32::try_from(grid.vertex_count()).is_ok());
        let last = grid.vertices_per_side() - 1;
        assert_eq!(grid.vertex_xz(last, last), (5.0, 5.0));

        let zero = TerrainGrid { size: 10.0, subdivisions: 0 };
        assert_eq!(zero.vertices_per_side(), 2);
    }

    #[test]
    fn depth_positions_match_surface_positions() {
        let field = TerrainField::new(2);
        let grid = small_grid();
        for shape in [
            TerrainShape::default(),
            TerrainShape {
                position_frequency: 1.0,
                strength: 10.0,
                warp_frequency: 10.0,
                warp_strength: 1.0,
            },
        ] {
            let surface = build_surface(&field, &grid, &shape, &BiomePalette::default());
            let depth = build_depth_positions(&field, &grid, &shape);
            assert_eq!(surface.positions, depth);
        }
    }

    #[test]
    fn recolor_keeps_geometry() {
        let field = TerrainField::new(9);
        let grid = small_grid();
        let shape = TerrainShape::default();
        let mut mesh = build_surface(&field, &grid, &shape, &BiomePalette::default());
        let positions = mesh.positions.clone();

        let mut palette = BiomePalette::default();
        for biome in Biome::ALL {
            palette.set(biome, Vec3::new(1.0, 0.0, 0.0));
        }
        mesh.recolor(&palette);

        assert_eq!(mesh.positions, positions);
        for c in &mesh.colors {
            assert!((c[0] - 1.0).abs() < 1e-5 && c[1].abs() < 1e-6);
        }
    }

    #[test]
    fn triangles_face_up_on_flat_ground() {
        let field = TerrainField::new(0);
        let grid = TerrainGrid { size: 2.0, subdivisions: 1 };
        let shape = TerrainShape { strength: 0.0, ..TerrainShape::default() };
        let mesh = build_surface(&field, &grid, &shape, &BiomePalette::default());
        for tri in mesh.indices.chunks(3) {
            let p = |i: u32| Vec3::from_array(mesh.positions[i as usize]);
            let n = (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]));
            assert!(n.y > 0.0);
        }
    }
}
