use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use diorama_engine::csg::TriMesh;
use diorama_engine::terrain::mesh::SurfaceMesh;

/// Terrain surface with per-vertex biome colours and smooth normals.
pub fn terrain_mesh(surface: &SurfaceMesh) -> Mesh {
    // Bevy 0.12 API
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, surface.positions.clone());
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, surface.normals.clone());
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, surface.colors.clone());
    mesh.set_indices(Some(Indices::U32(surface.indices.clone())));
    mesh
}

/// Swaps the colour attribute only; positions and indices stay.
pub fn write_colors(mesh: &mut Mesh, colors: &[[f32; 4]]) {
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors.to_vec());
}

/// Board mesh with hard edges: vertices are split per face so each face gets
/// its own flat normal.
pub fn board_mesh(tri: &TriMesh) -> Mesh {
    let positions: Vec<[f32; 3]> = tri.positions.iter().map(|p| p.to_array()).collect();
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.set_indices(Some(Indices::U32(tri.indices.clone())));
    mesh.duplicate_vertices();
    mesh.compute_flat_normals();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::render::mesh::VertexAttributeValues;
    use diorama_engine::csg::{subtract, BoxBrush};
    use diorama_engine::params::{BiomePalette, TerrainShape};
    use diorama_engine::terrain::mesh::{build_surface, TerrainGrid};
    use diorama_engine::terrain::TerrainField;

    fn vertex_colors(mesh: &Mesh) -> Option<&Vec<[f32; 4]>> {
        match mesh.attribute(Mesh::ATTRIBUTE_COLOR)? {
            VertexAttributeValues::Float32x4(colors) => Some(colors),
            _ => None,
        }
    }

    #[test]
    fn terrain_mesh_keeps_vertex_data() {
        let grid = TerrainGrid { size: 10.0, subdivisions: 8 };
        let surface = build_surface(
            &TerrainField::new(0),
            &grid,
            &TerrainShape::default(),
            &BiomePalette::default(),
        );
        let mut mesh = terrain_mesh(&surface);
        assert_eq!(mesh.count_vertices(), 81);

        let black = vec![[0.0, 0.0, 0.0, 1.0]; 81];
        write_colors(&mut mesh, &black);
        assert_eq!(vertex_colors(&mesh), Some(&black));
        assert_eq!(mesh.count_vertices(), 81);
    }

    #[test]
    fn board_normals_are_axis_aligned() {
        let board = subtract(
            &BoxBrush::new(Vec3::new(11.0, 2.0, 11.0)),
            &BoxBrush::new(Vec3::new(10.0, 2.1, 10.0)),
        )
        .unwrap();
        let mesh = board_mesh(&board);
        assert_eq!(mesh.count_vertices(), board.indices.len());

        let normals = mesh
            .attribute(Mesh::ATTRIBUTE_NORMAL)
            .and_then(|n| n.as_float3())
            .unwrap();
        for n in normals {
            let n = Vec3::from_array(*n);
            assert!((n.abs().max_element() - 1.0).abs() < 1e-5, "{n:?}");
        }
    }
}
