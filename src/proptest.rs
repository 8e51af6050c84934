//! Proptest strategies for polygons and polygonal meshes.
use crate::mesh::procedural::{create_single_polygon_mesh, create_unit_square_uniform_quad_mesh_2d};
use crate::mesh::PolygonMesh;
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::{Point2, Vector2};
use std::f64::consts::PI;

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // Pick a reasonably small range to pick coordinates from,
    // otherwise we can easily get floating point numbers that are
    // so ridiculously large as to break anything we might want to do with them
    let range = -10.0..10.0;
    [range.clone(), range].prop_map(|[x, y]| Point2::new(x, y))
}

/// Convex polygons with between three and `max_vertices` counter-clockwise vertices.
///
/// Vertices are placed on an axis-aligned ellipse, one in each of the equal angular sectors
/// of the full turn, so consecutive vertices are never too close to each other.
pub fn convex_polygon(max_vertices: usize) -> impl Strategy<Value = Vec<Point2<f64>>> {
    assert!(max_vertices >= 3);
    (3..=max_vertices)
        .prop_flat_map(|n| (point2(), 0.1..5.0, 0.2..5.0, vec(0.1..0.9, n)))
        .prop_map(|(center, radius, aspect, sector_offsets): (_, f64, f64, Vec<f64>)| {
            let n = sector_offsets.len();
            sector_offsets
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let theta = 2.0 * PI * (i as f64 + s) / n as f64;
                    center + Vector2::new(aspect * radius * theta.cos(), radius * theta.sin())
                })
                .collect()
        })
}

/// Meshes consisting of a single convex polygon.
pub fn single_convex_polygon_mesh(max_vertices: usize) -> impl Strategy<Value = PolygonMesh> {
    convex_polygon(max_vertices).prop_map(create_single_polygon_mesh)
}

/// Uniform quad meshes of the unit square whose interior vertices are randomly displaced by up
/// to a fifth of the cell size in each direction, which keeps every cell convex.
pub fn perturbed_unit_square_quad_mesh(max_cells_per_dim: usize) -> impl Strategy<Value = PolygonMesh> {
    assert!(max_cells_per_dim >= 1);
    (1..=max_cells_per_dim)
        .prop_flat_map(|n| {
            let num_vertices = (n + 1) * (n + 1);
            (Just(n), vec([-0.2..0.2, -0.2..0.2], num_vertices))
        })
        .prop_map(|(n, displacements)| {
            let mesh = create_unit_square_uniform_quad_mesh_2d(n);
            let h = 1.0 / n as f64;
            let on_boundary = |coordinate: f64| coordinate.abs() < 1e-12 || (coordinate - 1.0).abs() < 1e-12;
            let vertices = mesh
                .vertices()
                .iter()
                .zip(&displacements)
                .map(|(v, [dx, dy])| {
                    let dx = if on_boundary(v.x) { 0.0 } else { dx * h };
                    let dy = if on_boundary(v.y) { 0.0 } else { dy * h };
                    v + Vector2::new(dx, dy)
                })
                .collect();
            PolygonMesh::from_vertices_and_cells(vertices, mesh.cells().clone())
        })
}
