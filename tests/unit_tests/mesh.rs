use fenris_vem::mesh::procedural::{
    create_rectangular_uniform_quad_mesh_2d, create_single_polygon_mesh, create_unit_square_uniform_octagon_mesh_2d,
    create_unit_square_uniform_quad_mesh_2d, create_unit_square_uniform_tri_mesh_2d,
};
use fenris_vem::mesh::{PolygonMesh, PolygonalMesh};
use fenris_vem::nested_vec::NestedVec;
use fenris_vem::proptest::{perturbed_unit_square_quad_mesh, single_convex_polygon_mesh};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Point2, Vector2};
use proptest::prelude::*;
use util::assert_panics;

/// The sum of $|e| n$ over the edges of a closed polygon vanishes.
fn assert_cell_normals_close<M: PolygonalMesh>(mesh: &M) {
    for cell in 0..mesh.number_of_cells() {
        let mut sum = Vector2::zeros();
        for (local_edge, &edge) in mesh.cell_edges(cell).iter().enumerate() {
            let normal = mesh.cell_edge_sign(cell, local_edge) * mesh.edge_unit_normal(edge);
            sum += mesh.edge_length(edge) * normal;
        }
        assert_matrix_eq!(sum, Vector2::zeros(), comp = abs, tol = 1e-12);
    }
}

#[test]
fn two_triangle_mesh_topology() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    assert_eq!(mesh.number_of_cells(), 2);
    assert_eq!(mesh.number_of_edges(), 5);
    assert_eq!(mesh.find_boundary_edges(), vec![0, 1, 3, 4]);
    assert_eq!(mesh.cell_edges(0), [0, 1, 2]);
    assert_eq!(mesh.cell_edges(1), [2, 3, 4]);

    // The diagonal is traversed forwards by cell 0 and backwards by cell 1
    assert_eq!(mesh.edge_to_cell()[2], [0, 1, 2, 0]);
    assert_eq!(mesh.cell_edge_sign(0, 2), 1.0);
    assert_eq!(mesh.cell_edge_sign(1, 0), -1.0);
    assert!(!mesh.is_boundary_edge(2));
    assert_eq!(mesh.boundary_edge_flag(), [true, true, false, true, true]);

    for cell in 0..2 {
        assert_scalar_eq!(mesh.cell_measure(cell), 0.5, comp = abs, tol = 1e-14);
        assert_scalar_eq!(mesh.cell_size(cell), 0.5f64.sqrt(), comp = abs, tol = 1e-14);
    }
    assert_matrix_eq!(
        mesh.cell_barycenter(0).coords,
        Vector2::new(2.0 / 3.0, 1.0 / 3.0),
        comp = abs,
        tol = 1e-14
    );
    assert_matrix_eq!(
        mesh.cell_barycenter(1).coords,
        Vector2::new(1.0 / 3.0, 2.0 / 3.0),
        comp = abs,
        tol = 1e-14
    );
    assert_scalar_eq!(mesh.edge_length(2), 2.0f64.sqrt(), comp = abs, tol = 1e-14);
    assert_cell_normals_close(&mesh);
}

#[test]
fn cell_edge_endpoints_follow_counter_clockwise_traversal() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    // The diagonal takes the orientation of cell 0, from (1, 1) to (0, 0)
    let [a, b] = mesh.edge_endpoints(2);
    assert_eq!(a, Point2::new(1.0, 1.0));
    assert_eq!(b, Point2::new(0.0, 0.0));
    assert_eq!(mesh.cell_edge_endpoints(0, 2), [a, b]);
    assert_eq!(mesh.cell_edge_endpoints(1, 0), [b, a]);
}

#[test]
fn uniform_quad_mesh_counts() {
    for n in 1..5 {
        let mesh = create_unit_square_uniform_quad_mesh_2d(n);
        assert_eq!(mesh.number_of_cells(), n * n);
        assert_eq!(mesh.number_of_edges(), 2 * n * (n + 1));
        assert_eq!(mesh.find_boundary_edges().len(), 4 * n);
        assert_eq!(mesh.number_of_edges_of_cells(), vec![4; n * n]);

        let total_area: f64 = (0..mesh.number_of_cells())
            .map(|cell| mesh.cell_measure(cell))
            .sum();
        assert_scalar_eq!(total_area, 1.0, comp = abs, tol = 1e-12);
        assert_cell_normals_close(&mesh);

        // Interior edges are shared by two distinct cells with cell0 < cell1
        for &[c0, c1, _, _] in mesh.edge_to_cell() {
            assert!(c0 <= c1);
        }
    }
}

#[test]
fn rectangular_quad_mesh_is_translated_and_scaled() {
    let mesh = create_rectangular_uniform_quad_mesh_2d(2.0, 2, 1, 2, &Vector2::new(-1.0, 3.0));
    assert_eq!(mesh.number_of_cells(), 8);
    let total_area: f64 = (0..8).map(|cell| mesh.cell_measure(cell)).sum();
    assert_scalar_eq!(total_area, 8.0, comp = abs, tol = 1e-12);
    assert_matrix_eq!(
        mesh.cell_barycenter(0).coords,
        Vector2::new(-0.5, 2.5),
        comp = abs,
        tol = 1e-12
    );
}

#[test]
fn octagon_mesh_counts() {
    for n in 1..4 {
        let mesh = create_unit_square_uniform_octagon_mesh_2d(n);
        let h = 1.0 / n as f64;
        assert_eq!(mesh.number_of_cells(), n * n);
        assert_eq!(mesh.number_of_edges(), 4 * n * (n + 1));
        assert_eq!(mesh.number_of_edges_of_cells(), vec![8; n * n]);
        for cell in 0..mesh.number_of_cells() {
            assert_scalar_eq!(mesh.cell_measure(cell), h * h, comp = abs, tol = 1e-12);
        }
        assert_cell_normals_close(&mesh);
    }
}

#[test]
fn non_convex_polygon_centroid() {
    // L-shaped polygon made up of three unit squares
    let mesh = create_single_polygon_mesh(vec![
        Point2::new(0.0, 0.0),
        Point2::new(2.0, 0.0),
        Point2::new(2.0, 1.0),
        Point2::new(1.0, 1.0),
        Point2::new(1.0, 2.0),
        Point2::new(0.0, 2.0),
    ]);
    assert_scalar_eq!(mesh.cell_measure(0), 3.0, comp = abs, tol = 1e-14);
    let expected = Vector2::new(0.5 + 1.5 + 0.5, 0.5 + 0.5 + 1.5) / 3.0;
    assert_matrix_eq!(mesh.cell_barycenter(0).coords, expected, comp = abs, tol = 1e-14);
    assert!(mesh.find_boundary_edges().len() == 6);
}

#[test]
fn invalid_cells_panic() {
    let square = || {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    };

    // Clockwise
    assert_panics!(PolygonMesh::from_vertices_and_cells(square(), NestedVec::from(vec![vec![0, 3, 2, 1]])));
    // Too few vertices
    assert_panics!(PolygonMesh::from_vertices_and_cells(square(), NestedVec::from(vec![vec![0, 1]])));
    // Vertex out of bounds
    assert_panics!(PolygonMesh::from_vertices_and_cells(square(), NestedVec::from(vec![vec![0, 1, 4]])));
    // Shared edge traversed in the same direction by both cells
    assert_panics!(PolygonMesh::from_vertices_and_cells(
        square(),
        NestedVec::from(vec![vec![0, 1, 2], vec![0, 1, 3]])
    ));
    // Edge shared by three cells
    assert_panics!(PolygonMesh::from_vertices_and_cells(
        square(),
        NestedVec::from(vec![vec![0, 1, 2], vec![1, 0, 3], vec![1, 0, 2]])
    ));
}

proptest! {
    #[test]
    fn convex_polygon_geometry_is_consistent(mesh in single_convex_polygon_mesh(9)) {
        prop_assert!(mesh.cell_measure(0) > 0.0);
        prop_assert_eq!(mesh.find_boundary_edges().len(), mesh.number_of_edges());
        assert_cell_normals_close(&mesh);

        // The centroid of a convex polygon lies strictly inside it
        let centroid = mesh.cell_barycenter(0);
        for local_edge in 0..mesh.number_of_edges_of_cell(0) {
            let [a, b] = mesh.cell_edge_endpoints(0, local_edge);
            let t = b - a;
            let outward = Vector2::new(t.y, -t.x);
            prop_assert!((centroid - a).dot(&outward) < 0.0);
        }
    }

    #[test]
    fn perturbed_quad_meshes_cover_unit_square(mesh in perturbed_unit_square_quad_mesh(4)) {
        let total_area: f64 = (0..mesh.number_of_cells())
            .map(|cell| mesh.cell_measure(cell))
            .sum();
        prop_assert!((total_area - 1.0).abs() < 1e-12);
        assert_cell_normals_close(&mesh);
    }
}
