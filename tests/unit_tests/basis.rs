use fenris_vem::basis::{
    first_derivative_map, lowered_polynomial_dim, monomial_degree, monomial_exponents, monomial_index, polynomial_dim,
    second_derivative_map, MonomialBasis, ScaledMonomialSpace,
};
use fenris_vem::mesh::procedural::{create_single_polygon_mesh, create_unit_square_uniform_octagon_mesh_2d};
use fenris_vem::mesh::{PolygonMesh, PolygonalMesh};
use fenris_vem::proptest::single_convex_polygon_mesh;
use fenris_vem::quadrature::{polygon_quadrature, segment_quadrature, GaussQuadrature, Quadrature, QuadratureProvider};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, Point2, Vector2};
use proptest::prelude::*;

fn l_shaped_mesh() -> PolygonMesh {
    create_single_polygon_mesh(vec![
        Point2::new(0.0, 0.0),
        Point2::new(2.0, 0.0),
        Point2::new(2.0, 1.0),
        Point2::new(1.0, 1.0),
        Point2::new(1.0, 2.0),
        Point2::new(0.0, 2.0),
    ])
}

fn assert_monomial_integrals_match_quadrature(mesh: &PolygonMesh, cell: usize, degree: usize) {
    let basis = ScaledMonomialSpace::new(mesh);
    let exact = basis.cell_monomial_integrals(cell, degree);
    let quadrature = polygon_quadrature(mesh, cell, &GaussQuadrature.triangle_rule(degree));
    let area = mesh.cell_measure(cell);
    for (i, &integral) in exact.iter().enumerate() {
        let approx = quadrature.integrate(|x| {
            let mut m = vec![0.0; polynomial_dim(degree)];
            basis.populate_cell_basis(cell, degree, x, &mut m);
            m[i]
        });
        assert_scalar_eq!(integral, approx, comp = abs, tol = 1e-10 * (area + integral.abs()));
    }
}

#[test]
fn polynomial_dimensions() {
    assert_eq!(polynomial_dim(0), 1);
    assert_eq!(polynomial_dim(1), 3);
    assert_eq!(polynomial_dim(2), 6);
    assert_eq!(polynomial_dim(3), 10);
    assert_eq!(lowered_polynomial_dim(2, 3), 0);
    assert_eq!(lowered_polynomial_dim(3, 3), 1);
    assert_eq!(lowered_polynomial_dim(5, 3), 6);
}

#[test]
fn monomial_ordering() {
    // 1, x, y, x^2, xy, y^2, x^3, ...
    assert_eq!(monomial_index(0, 0), 0);
    assert_eq!(monomial_index(1, 0), 1);
    assert_eq!(monomial_index(0, 1), 2);
    assert_eq!(monomial_index(2, 0), 3);
    assert_eq!(monomial_index(1, 1), 4);
    assert_eq!(monomial_index(0, 2), 5);
    assert_eq!(monomial_index(3, 0), 6);

    for index in 0..polynomial_dim(6) {
        let (a, b) = monomial_exponents(index);
        assert_eq!(monomial_index(a, b), index);
        assert_eq!(monomial_degree(index), a + b);
    }
}

#[test]
fn scaled_monomial_values() {
    let mesh = create_single_polygon_mesh(vec![
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(1.0, 1.0),
        Point2::new(0.0, 1.0),
    ]);
    let basis = ScaledMonomialSpace::new(&mesh);
    assert_matrix_eq!(basis.cell_center(0).coords, Vector2::new(0.5, 0.5), comp = abs, tol = 1e-15);
    assert_scalar_eq!(basis.cell_scale(0), 1.0, comp = abs, tol = 1e-15);

    let mut m = vec![0.0; 6];
    basis.populate_cell_basis(0, 2, &Point2::new(0.75, 1.0), &mut m);
    assert_matrix_eq!(
        DVector::from_vec(m),
        DVector::from_vec(vec![1.0, 0.25, 0.5, 0.0625, 0.125, 0.25]),
        comp = abs,
        tol = 1e-15
    );
}

#[test]
fn derivative_maps_match_finite_differences() {
    let mesh = create_unit_square_uniform_octagon_mesh_2d(2);
    let basis = ScaledMonomialSpace::new(&mesh);
    let cell = 3;
    let degree = 4;
    let n = polynomial_dim(degree);
    let map = first_derivative_map(degree);
    let h = basis.cell_scale(cell);
    let x = basis.cell_center(cell) + Vector2::new(0.07, -0.11);
    let eps = 1e-6;

    let eval = |x: Point2<f64>| {
        let mut values = vec![0.0; n];
        basis.populate_cell_basis(cell, degree, &x, &mut values);
        values
    };
    let m = eval(x);
    let dx: Vec<_> = eval(x + Vector2::new(eps, 0.0))
        .iter()
        .zip(eval(x - Vector2::new(eps, 0.0)))
        .map(|(plus, minus)| (plus - minus) / (2.0 * eps))
        .collect();
    let dy: Vec<_> = eval(x + Vector2::new(0.0, eps))
        .iter()
        .zip(eval(x - Vector2::new(0.0, eps)))
        .map(|(plus, minus)| (plus - minus) / (2.0 * eps))
        .collect();

    assert_eq!(map.x.len(), polynomial_dim(degree - 1));
    for k in 0..polynomial_dim(degree - 1) {
        let (ix, cx) = map.x[k];
        let (iy, cy) = map.y[k];
        assert_scalar_eq!(dx[ix], cx / h * m[k], comp = abs, tol = 1e-6);
        assert_scalar_eq!(dy[iy], cy / h * m[k], comp = abs, tol = 1e-6);
    }
}

#[test]
fn second_derivative_map_entries() {
    let map = second_derivative_map(4);
    assert_eq!(map.xx.len(), polynomial_dim(2));
    let k = monomial_index(1, 1);
    assert_eq!(map.xx[k], (monomial_index(3, 1), 6.0));
    assert_eq!(map.yy[k], (monomial_index(1, 3), 6.0));
    assert_eq!(map.xy[k], (monomial_index(2, 2), 4.0));

    let map = first_derivative_map(3);
    assert_eq!(map.x[k], (monomial_index(2, 1), 2.0));
    assert_eq!(map.y[k], (monomial_index(1, 2), 2.0));
}

#[test]
fn cell_monomial_integrals_on_non_convex_polygon() {
    let mesh = l_shaped_mesh();
    let basis = ScaledMonomialSpace::new(&mesh);
    let integrals = basis.cell_monomial_integrals(0, 6);
    assert_scalar_eq!(integrals[0], 3.0, comp = abs, tol = 1e-13);
    // The barycenter is the center of the monomials
    assert_scalar_eq!(integrals[1], 0.0, comp = abs, tol = 1e-13);
    assert_scalar_eq!(integrals[2], 0.0, comp = abs, tol = 1e-13);
    assert_monomial_integrals_match_quadrature(&mesh, 0, 6);
}

#[test]
fn cell_monomial_integrals_on_octagon_cells() {
    let mesh = create_unit_square_uniform_octagon_mesh_2d(3);
    for cell in 0..mesh.number_of_cells() {
        assert_monomial_integrals_match_quadrature(&mesh, cell, 5);
    }
}

#[test]
fn cell_mass_matrix_is_symmetric_positive_definite() {
    let mesh = l_shaped_mesh();
    let basis = ScaledMonomialSpace::new(&mesh);
    let mass = basis.cell_mass_matrix(0, 3);
    assert_eq!(mass.nrows(), 10);
    assert_scalar_eq!(mass[(0, 0)], 3.0, comp = abs, tol = 1e-13);
    assert_matrix_eq!(mass, mass.transpose(), comp = abs, tol = 1e-14);
    assert!(mass.cholesky().is_some());
}

#[test]
fn edge_basis_and_mass_matrix() {
    let mesh = create_unit_square_uniform_octagon_mesh_2d(1);
    let basis = ScaledMonomialSpace::new(&mesh);
    let degree = 3;
    for edge in 0..mesh.number_of_edges() {
        let [a, b] = mesh.edge_endpoints(edge);
        let mut phi = vec![0.0; degree + 1];
        basis.populate_edge_basis(edge, degree, &mesh.edge_barycenter(edge), &mut phi);
        assert_matrix_eq!(
            DVector::from_vec(phi.clone()),
            DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0]),
            comp = abs,
            tol = 1e-14
        );
        basis.populate_edge_basis(edge, degree, &b, &mut phi);
        assert_matrix_eq!(
            DVector::from_vec(phi.clone()),
            DVector::from_vec(vec![1.0, 0.5, 0.25, 0.125]),
            comp = abs,
            tol = 1e-14
        );

        let quadrature = segment_quadrature(&GaussQuadrature.edge_rule(2 * degree), &a, &b);
        let mut expected = DMatrix::zeros(degree + 1, degree + 1);
        for (w, x) in quadrature.weights().iter().zip(quadrature.points()) {
            basis.populate_edge_basis(edge, degree, x, &mut phi);
            let phi = DVector::from_column_slice(&phi);
            expected += *w * &phi * phi.transpose();
        }
        assert_matrix_eq!(basis.edge_mass_matrix(edge, degree), expected, comp = abs, tol = 1e-14);
    }
}

proptest! {
    #[test]
    fn cell_monomial_integrals_on_convex_polygons(mesh in single_convex_polygon_mesh(8)) {
        assert_monomial_integrals_match_quadrature(&mesh, 0, 4);
    }
}
