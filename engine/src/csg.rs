//! Boolean subtraction of axis-aligned box brushes.
//!
//! Both operands are split along every face plane of either box. That gives a
//! grid of at most 3x3x3 cells. Each cell lies entirely inside or outside
//! `a - b`, and the boundary faces between solid and empty cells form the
//! result. Every face sits on the shared grid, so the mesh has no T-junctions.

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use tracing::info;

use crate::error::GeometryError;

const EPSILON: f32 = 1e-6;

/// An axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxBrush {
    pub center: Vec3,
    pub size: Vec3,
}

impl BoxBrush {
    pub fn new(size: Vec3) -> Self {
        Self { center: Vec3::ZERO, size }
    }

    pub fn at(mut self, center: Vec3) -> Self {
        self.center = center;
        self
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.size / 2.0
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.size / 2.0
    }

    pub fn volume(&self) -> f32 {
        self.size.x * self.size.y * self.size.z
    }

    fn validate(&self, operand: &'static str) -> Result<(), GeometryError> {
        let ok = self.size.is_finite()
            && self.center.is_finite()
            && self.size.min_element() > EPSILON;
        if ok {
            Ok(())
        } else {
            Err(GeometryError::DegenerateOperand { operand, size: self.size.to_array() })
        }
    }

    fn contains(&self, p: Vec3) -> bool {
        let (min, max) = (self.min(), self.max());
        p.cmpgt(min).all() && p.cmplt(max).all()
    }
}

/// A run of triangles drawn with one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshGroup {
    pub start: usize,
    pub count: usize,
    pub material_index: usize,
}

/// Indexed triangle mesh with welded vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub groups: Vec<MeshGroup>,
}

impl TriMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Drops per-operand material groups so one material covers the mesh.
    pub fn clear_groups(&mut self) {
        self.groups.clear();
    }

    /// Enclosed volume by the divergence theorem; positive for outward winding.
    pub fn signed_volume(&self) -> f32 {
        self.triangles()
            .map(|[a, b, c]| {
                let (a, b, c) = (
                    self.positions[a as usize],
                    self.positions[b as usize],
                    self.positions[c as usize],
                );
                a.dot(b.cross(c)) / 6.0
            })
            .sum()
    }

    /// Every directed edge must appear exactly once, paired with its reverse.
    pub fn validate_manifold(&self) -> Result<(), GeometryError> {
        let mut edges: HashMap<(u32, u32), usize> = HashMap::new();
        for [a, b, c] in self.triangles() {
            for edge in [(a, b), (b, c), (c, a)] {
                *edges.entry(edge).or_default() += 1;
            }
        }
        for (&(from, to), &count) in &edges {
            let reverse = edges.get(&(to, from)).copied().unwrap_or(0);
            if count != 1 || reverse != 1 {
                return Err(GeometryError::NonManifold { from, to, count: count + reverse });
            }
        }
        Ok(())
    }

    /// Number of vertex-connected pieces.
    pub fn component_count(&self) -> usize {
        let mut parent: Vec<usize> = (0..self.positions.len()).collect();
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for [a, b, c] in self.triangles() {
            for (u, v) in [(a, b), (b, c)] {
                let (ru, rv) = (find(&mut parent, u as usize), find(&mut parent, v as usize));
                if ru != rv {
                    parent[ru] = rv;
                }
            }
        }
        let used: HashSet<usize> = self.indices.iter().map(|&i| i as usize).collect();
        let roots: HashSet<usize> = used.into_iter().map(|i| find(&mut parent, i)).collect();
        roots.len()
    }
}

/// Sorted, de-duplicated split planes along one axis.
fn split_planes(a: &BoxBrush, b: &BoxBrush, axis: usize) -> Vec<f32> {
    let mut planes = vec![a.min()[axis], a.max()[axis], b.min()[axis], b.max()[axis]];
    planes.sort_by(f32::total_cmp);
    planes.dedup_by(|x, y| (*x - *y).abs() <= EPSILON);
    planes
}

struct MeshBuilder {
    planes: [Vec<f32>; 3],
    lookup: HashMap<[usize; 3], u32>,
    mesh: TriMesh,
}

impl MeshBuilder {
    fn vertex(&mut self, grid: [usize; 3]) -> u32 {
        if let Some(&i) = self.lookup.get(&grid) {
            return i;
        }
        let i = self.mesh.positions.len() as u32;
        self.mesh.positions.push(Vec3::new(
            self.planes[0][grid[0]],
            self.planes[1][grid[1]],
            self.planes[2][grid[2]],
        ));
        self.lookup.insert(grid, i);
        i
    }

    /// Quad on the face of cell `cell` facing `+axis` (`positive`) or `-axis`.
    fn face(&mut self, cell: [usize; 3], axis: usize, positive: bool) -> [u32; 6] {
        let u = (axis + 1) % 3;
        let v = (axis + 2) % 3;
        let corner = |du: usize, dv: usize| {
            let mut g = cell;
            g[axis] += positive as usize;
            g[u] += du;
            g[v] += dv;
            g
        };
        // (u, v) counter-clockwise gives a +axis normal
        let mut quad = [
            self.vertex(corner(0, 0)),
            self.vertex(corner(1, 0)),
            self.vertex(corner(1, 1)),
            self.vertex(corner(0, 1)),
        ];
        if !positive {
            quad.reverse();
        }
        [quad[0], quad[1], quad[2], quad[0], quad[2], quad[3]]
    }
}

/// `a - b`. Fails on degenerate operands, an empty result, or a result that
/// is not a closed manifold.
pub fn subtract(a: &BoxBrush, b: &BoxBrush) -> Result<TriMesh, GeometryError> {
    a.validate("first")?;
    b.validate("second")?;

    let planes = [split_planes(a, b, 0), split_planes(a, b, 1), split_planes(a, b, 2)];
    let dims = [planes[0].len() - 1, planes[1].len() - 1, planes[2].len() - 1];

    let center = |c: [usize; 3]| {
        Vec3::new(
            (planes[0][c[0]] + planes[0][c[0] + 1]) / 2.0,
            (planes[1][c[1]] + planes[1][c[1] + 1]) / 2.0,
            (planes[2][c[2]] + planes[2][c[2] + 1]) / 2.0,
        )
    };
    let solid = |c: [i64; 3]| -> bool {
        if (0..3).any(|k| c[k] < 0 || c[k] >= dims[k] as i64) {
            return false;
        }
        let p = center([c[0] as usize, c[1] as usize, c[2] as usize]);
        a.contains(p) && !b.contains(p)
    };

    // faces cut by the second brush go to material slot 1
    let mut builder = MeshBuilder {
        planes: planes.clone(),
        lookup: HashMap::new(),
        mesh: TriMesh::default(),
    };
    let mut slots: [Vec<u32>; 2] = [Vec::new(), Vec::new()];
    for x in 0..dims[0] {
        for y in 0..dims[1] {
            for z in 0..dims[2] {
                let cell = [x, y, z];
                let ci = [x as i64, y as i64, z as i64];
                if !solid(ci) {
                    continue;
                }
                for axis in 0..3 {
                    for positive in [false, true] {
                        let mut n = ci;
                        n[axis] += if positive { 1 } else { -1 };
                        if solid(n) {
                            continue;
                        }
                        let outside_a = n[axis] < 0 || n[axis] >= dims[axis] as i64 || {
                            let nc = [n[0] as usize, n[1] as usize, n[2] as usize];
                            !a.contains(center(nc))
                        };
                        let slot = if outside_a { 0 } else { 1 };
                        slots[slot].extend_from_slice(&builder.face(cell, axis, positive));
                    }
                }
            }
        }
    }

    let mut mesh = builder.mesh;
    for (material_index, indices) in slots.into_iter().enumerate() {
        if indices.is_empty() {
            continue;
        }
        mesh.groups.push(MeshGroup {
            start: mesh.indices.len(),
            count: indices.len(),
            material_index,
        });
        mesh.indices.extend(indices);
    }

    if mesh.indices.is_empty() {
        return Err(GeometryError::EmptyResult);
    }
    mesh.validate_manifold()?;
    info!(
        "csg subtraction produced {} triangles, {} vertices",
        mesh.triangle_count(),
        mesh.positions.len()
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> TriMesh {
        let fill = BoxBrush::new(Vec3::new(11.0, 2.0, 11.0));
        let hole = BoxBrush::new(Vec3::new(10.0, 2.1, 10.0));
        subtract(&fill, &hole).unwrap()
    }

    #[test]
    fn frame_is_single_closed_manifold() {
        let mesh = board();
        assert!(mesh.validate_manifold().is_ok());
        assert_eq!(mesh.component_count(), 1);
        // quads: 8 top, 8 bottom, 12 outer walls, 4 inner walls
        assert_eq!(mesh.triangle_count(), 64);
    }

    #[test]
    fn frame_volume_is_fill_minus_hole_inside_fill() {
        let mesh = board();
        // the hole only removes what lies inside the 2-unit-tall fill
        let expected = 11.0 * 2.0 * 11.0 - 10.0 * 2.0 * 10.0;
        assert!((mesh.signed_volume() - expected).abs() < 1e-3, "{}", mesh.signed_volume());
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn groups_cover_every_triangle_until_cleared() {
        let mut mesh = board();
        let covered: usize = mesh.groups.iter().map(|g| g.count).sum();
        assert_eq!(covered, mesh.indices.len());
        assert_eq!(mesh.groups.len(), 2);
        mesh.clear_groups();
        assert!(mesh.groups.is_empty());
    }

    #[test]
    fn degenerate_operands_are_rejected() {
        let good = BoxBrush::new(Vec3::ONE);
        let flat = BoxBrush::new(Vec3::new(1.0, 0.0, 1.0));
        let broken = BoxBrush::new(Vec3::new(1.0, f32::NAN, 1.0));
        assert!(matches!(
            subtract(&flat, &good),
            Err(GeometryError::DegenerateOperand { operand: "first", .. })
        ));
        assert!(matches!(
            subtract(&good, &broken),
            Err(GeometryError::DegenerateOperand { operand: "second", .. })
        ));
    }

    #[test]
    fn swallowing_hole_leaves_nothing() {
        let small = BoxBrush::new(Vec3::ONE);
        let big = BoxBrush::new(Vec3::splat(2.0));
        assert_eq!(subtract(&small, &big), Err(GeometryError::EmptyResult));
    }

    #[test]
    fn disjoint_hole_keeps_the_box() {
        let a = BoxBrush::new(Vec3::ONE);
        let b = BoxBrush::new(Vec3::ONE).at(Vec3::new(5.0, 0.0, 0.0));
        let mesh = subtract(&a, &b).unwrap();
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-5);
        assert_eq!(mesh.groups.len(), 1);
    }

    #[test]
    fn corner_notch_stays_manifold() {
        let a = BoxBrush::new(Vec3::splat(2.0));
        let b = BoxBrush::new(Vec3::splat(2.0)).at(Vec3::splat(1.0));
        let mesh = subtract(&a, &b).unwrap();
        assert!(mesh.validate_manifold().is_ok());
        assert!((mesh.signed_volume() - 7.0).abs() < 1e-4);
    }
}
