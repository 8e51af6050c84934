//! Functionality for error estimation.
//!
//! Virtual element functions cannot be evaluated pointwise, so errors are measured between an
//! exact solution and the cell-wise projections $\Pi_0 u_h$.
use crate::basis::MonomialBasis;
use crate::mesh::PolygonalMesh;
use crate::quadrature::{polygon_quadrature, Quadrature, QuadraturePair2d, QuadratureProvider};
use crate::space::VirtualElementSpace;
use crate::VemError;
use nalgebra::{DVector, Point2, Vector2};
use rayon::prelude::*;

/// Estimate the squared $L^2$ error $\norm{\Pi_0 u_h - u}^2_{L^2(K)}$ on a single cell, given the
/// monomial coefficients of the projection and a reference triangle rule.
///
/// # Panics
///
/// Panics if the coefficient vector has the wrong length.
#[allow(non_snake_case)]
pub fn estimate_cell_L2_error_squared<M, B, Q>(
    space: &VirtualElementSpace<M, B, Q>,
    cell: usize,
    coefficients: &DVector<f64>,
    u: impl Fn(&Point2<f64>) -> Vector2<f64>,
    triangle_rule: &QuadraturePair2d,
) -> f64
where
    M: ?Sized + PolygonalMesh + Sync,
    B: MonomialBasis + Sync,
    Q: QuadratureProvider + Sync,
{
    let cell_quadrature = polygon_quadrature(space.mesh(), cell, triangle_rule);
    cell_quadrature.integrate(|x| {
        let error = space.evaluate_projection(cell, coefficients, x) - u(x);
        error.norm_squared()
    })
}

/// Estimate the $L^2$ error $\norm{\Pi_0 u_h - u}_{L^2}$ over the whole mesh.
///
/// Cells are integrated in parallel with a rule of strength $2p + 2$ on each fan triangle.
///
/// # Errors
///
/// Returns [`VemError::DimensionMismatch`] if `uh` does not have one entry per global DOF.
#[allow(non_snake_case)]
pub fn estimate_L2_error<M, B, Q>(
    space: &VirtualElementSpace<M, B, Q>,
    uh: &DVector<f64>,
    u: impl Fn(&Point2<f64>) -> Vector2<f64> + Sync,
) -> Result<f64, VemError>
where
    M: ?Sized + PolygonalMesh + Sync,
    B: MonomialBasis + Sync,
    Q: QuadratureProvider + Sync,
{
    let coefficients = space.project_to_monomials(uh)?;
    let rule = space.quadrature().triangle_rule(2 * space.order() + 2);
    let error_squared: f64 = coefficients
        .par_iter()
        .enumerate()
        .map(|(cell, coeffs)| estimate_cell_L2_error_squared(space, cell, coeffs, &u, &rule))
        .sum();
    Ok(error_squared.sqrt())
}
