//! Patch tests: the discrete problem $-\mathrm{div}\, \varepsilon(u) = f$ with Dirichlet data
//! reproduces divergence-free quadratic solutions exactly on every mesh.
use fenris_vem::assembly::global::apply_dirichlet_bc_csr;
use fenris_vem::error::estimate_L2_error;
use fenris_vem::mesh::procedural::{
    create_rectangular_uniform_quad_mesh_2d, create_unit_square_uniform_octagon_mesh_2d,
    create_unit_square_uniform_quad_mesh_2d, create_unit_square_uniform_tri_mesh_2d,
};
use fenris_vem::mesh::PolygonMesh;
use fenris_vem::space::VirtualElementSpace;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DVector, Point2, Vector2};
use util::csr_to_dense;

fn u_exact(x: &Point2<f64>) -> Vector2<f64> {
    Vector2::new(x.x * x.x, -2.0 * x.x * x.y)
}

/// $f = -\mathrm{div}\, \varepsilon(u) = -\frac{1}{2} \Delta u$ for divergence-free $u$.
fn f(_: &Point2<f64>) -> Vector2<f64> {
    Vector2::new(-1.0, 0.0)
}

fn solve_patch_problem(mesh: &PolygonMesh, order: usize) -> (VirtualElementSpace<PolygonMesh>, DVector<f64>) {
    let space = VirtualElementSpace::new(mesh, order).unwrap();
    let mut a = space.matrix_a().unwrap();
    let mut b = space.source_vector(f).unwrap();

    let mut gh = space.zero_vector();
    let is_dirichlet = space.set_dirichlet_bc(&mut gh, u_exact).unwrap();
    apply_dirichlet_bc_csr(&mut a, &mut b, &gh, &is_dirichlet);

    let uh = csr_to_dense(&a)
        .cholesky()
        .expect("System must be positive definite after Dirichlet conditions")
        .solve(&b);
    (space, uh)
}

#[test]
fn patch_test_reproduces_quadratic_solution() {
    let meshes = [
        create_unit_square_uniform_tri_mesh_2d(1),
        create_unit_square_uniform_tri_mesh_2d(3),
        create_unit_square_uniform_quad_mesh_2d(2),
        create_unit_square_uniform_octagon_mesh_2d(2),
        create_rectangular_uniform_quad_mesh_2d(0.5, 3, 2, 1, &Vector2::new(-0.25, 0.5)),
    ];
    for mesh in &meshes {
        for order in [2, 3] {
            let (space, uh) = solve_patch_problem(mesh, order);
            let expected = space.interpolate(u_exact);
            assert_matrix_eq!(uh, expected, comp = abs, tol = 1e-9);

            let error = estimate_L2_error(&space, &uh, u_exact).unwrap();
            assert_scalar_eq!(error, 0.0, comp = abs, tol = 1e-9);
        }
    }
}

#[test]
fn patch_test_solution_is_divergence_free() {
    let mesh = create_unit_square_uniform_octagon_mesh_2d(3);
    for order in [2, 3] {
        let (space, uh) = solve_patch_problem(&mesh, order);
        let divergence = &space.divergence_matrix() * &uh;
        assert_matrix_eq!(divergence, DVector::zeros(divergence.len()), comp = abs, tol = 1e-9);
    }
}
