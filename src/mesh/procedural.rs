//! Basic procedural mesh generation routines.
use crate::mesh::PolygonMesh;
use crate::nested_vec::NestedVec;
use nalgebra::{Point2, Vector2};

pub fn create_unit_square_uniform_quad_mesh_2d(cells_per_dim: usize) -> PolygonMesh {
    create_rectangular_uniform_quad_mesh_2d(1.0, 1, 1, cells_per_dim, &Vector2::new(0.0, 1.0))
}

/// Uniform triangle mesh of the unit square, obtained by splitting every square along the
/// diagonal from its bottom-left to its top-right corner.
///
/// With `cells_per_dim == 1` this is the two-triangle mesh with five edges.
pub fn create_unit_square_uniform_tri_mesh_2d(cells_per_dim: usize) -> PolygonMesh {
    split_quads_into_triangles(&create_unit_square_uniform_quad_mesh_2d(cells_per_dim))
}

/// Generates an axis-aligned rectangular uniform mesh given a unit length,
/// dimensions as multipliers of the unit length and the number of cells per unit length.
pub fn create_rectangular_uniform_quad_mesh_2d(
    unit_length: f64,
    units_x: usize,
    units_y: usize,
    cells_per_unit: usize,
    top_left: &Vector2<f64>,
) -> PolygonMesh {
    if cells_per_unit == 0 || units_x == 0 || units_y == 0 {
        return PolygonMesh::from_vertices_and_cells(Vec::new(), NestedVec::new());
    }

    let mut vertices = Vec::new();
    let mut cells = NestedVec::new();

    let cell_size = unit_length / cells_per_unit as f64;
    let num_cells_x = units_x * cells_per_unit;
    let num_cells_y = units_y * cells_per_unit;
    let num_vertices_x = num_cells_x + 1;
    let num_vertices_y = num_cells_y + 1;

    let to_global_vertex_index = |i, j| (num_cells_x + 1) * j + i;

    for j in 0..num_vertices_y {
        for i in 0..num_vertices_x {
            let v = top_left + Vector2::new(i as f64, -(j as f64)) * cell_size;
            vertices.push(Point2::from(v));
        }
    }

    for j in 0..num_cells_y {
        for i in 0..num_cells_x {
            cells.push(&[
                to_global_vertex_index(i, j + 1),
                to_global_vertex_index(i + 1, j + 1),
                to_global_vertex_index(i + 1, j),
                to_global_vertex_index(i, j),
            ]);
        }
    }

    PolygonMesh::from_vertices_and_cells(vertices, cells)
}

/// Splits every quadrilateral cell `[a, b, c, d]` into the triangles `[a, b, c]` and `[a, c, d]`.
///
/// # Panics
///
/// Panics if the mesh contains a cell that is not a quadrilateral.
pub fn split_quads_into_triangles(mesh: &PolygonMesh) -> PolygonMesh {
    let mut cells = NestedVec::new();
    for (cell_idx, quad) in mesh.cells().iter().enumerate() {
        assert_eq!(quad.len(), 4, "Cell {cell_idx} is not a quadrilateral.");
        let &[a, b, c, d] = quad else { unreachable!() };
        cells.push(&[a, b, c]);
        cells.push(&[a, c, d]);
    }
    PolygonMesh::from_vertices_and_cells(mesh.vertices().to_vec(), cells)
}

/// Uniform mesh of the unit square in which every square cell also carries the midpoints of
/// its four sides as vertices, making each cell an eight-sided polygon.
///
/// Cells with collinear consecutive vertices are valid virtual element cells and exercise
/// polygons with many edges.
pub fn create_unit_square_uniform_octagon_mesh_2d(cells_per_dim: usize) -> PolygonMesh {
    let n = cells_per_dim;
    if n == 0 {
        return PolygonMesh::from_vertices_and_cells(Vec::new(), NestedVec::new());
    }

    // Vertices on the refined lattice with spacing h / 2, excluding cell centers
    let m = 2 * n + 1;
    let spacing = 1.0 / (2 * n) as f64;
    let mut lattice_index = vec![usize::MAX; m * m];
    let mut vertices = Vec::new();
    for j in 0..m {
        for i in 0..m {
            if i % 2 == 1 && j % 2 == 1 {
                continue;
            }
            lattice_index[m * j + i] = vertices.len();
            vertices.push(Point2::new(i as f64 * spacing, j as f64 * spacing));
        }
    }

    let mut cells = NestedVec::new();
    for cj in 0..n {
        for ci in 0..n {
            let (i, j) = (2 * ci, 2 * cj);
            let loop_coords = [
                (i, j),
                (i + 1, j),
                (i + 2, j),
                (i + 2, j + 1),
                (i + 2, j + 2),
                (i + 1, j + 2),
                (i, j + 2),
                (i, j + 1),
            ];
            let mut appender = cells.begin_array();
            for (li, lj) in loop_coords {
                appender.push_single(lattice_index[m * lj + li]);
            }
        }
    }

    PolygonMesh::from_vertices_and_cells(vertices, cells)
}

/// A mesh consisting of a single polygon with the given counter-clockwise vertices.
pub fn create_single_polygon_mesh(vertices: Vec<Point2<f64>>) -> PolygonMesh {
    let mut cells = NestedVec::new();
    cells.push(&(0..vertices.len()).collect::<Vec<_>>());
    PolygonMesh::from_vertices_and_cells(vertices, cells)
}
