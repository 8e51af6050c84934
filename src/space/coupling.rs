//! Blocks coupling local DOFs to polynomials: the moment map `E`, the projection right-hand
//! side `R` (including its mean-value part `T`), the divergence coupling `J` and the DOFs of
//! monomials `D`.
//!
//! All boundary integrals are evaluated through the edge DOFs. The outward normal of the cell
//! is used throughout, which means that contributions of an interior edge enter its first
//! cell with the global edge normal and its second cell with the negated normal.
use crate::basis::{first_derivative_map, monomial_degree, polynomial_dim, second_derivative_map};
use crate::space::cell::CellContext;
use crate::space::moments::RigidBodyFunctionals;
use nalgebra::{DMatrix, DVector};

/// Assembles `E = [E_x, E_y]` with $E_c v = (\int_K v_c m_k)_k$ for $m_k \in P_{p-2}$.
///
/// For a monomial $m_k$ of degree $d$, Euler's identity gives
/// $(d + 1) (m_k, 0) = \tilde\nabla(\tilde x m_k) - \partial_{\tilde y} m_k (-\tilde y, \tilde x)$.
/// For fields of constant divergence, the gradient part reduces to a boundary integral of
/// $\tilde x m_k$ minus its cell mean, and the remaining part is a multiple of an interior DOF.
/// The y-component is analogous.
pub(crate) fn assemble_moment_map(context: &CellContext) -> [DMatrix<f64>; 2] {
    let p = context.order;
    let nk1 = polynomial_dim(p - 1);
    let nk2 = polynomial_dim(p - 2);
    let nl = context.num_local_dofs();
    let h = context.scale;
    let means = context.monomial_means(nk1);
    let map = first_derivative_map(p - 1);
    let interior_map = first_derivative_map(p - 2);

    let mut e = [DMatrix::zeros(nk2, nl), DMatrix::zeros(nk2, nl)];
    for k in 0..nk2 {
        let c_k = (monomial_degree(k) + 1) as f64;
        let parents = [map.x[k].0, map.y[k].0];
        for (local_edge, edge) in context.edges.iter().enumerate() {
            let w = &edge.trace_weights;
            for n in 0..p {
                let (dof_x, dof_y) = (context.edge_dof(0, local_edge, n), context.edge_dof(1, local_edge, n));
                for (e_c, &parent) in e.iter_mut().zip(&parents) {
                    let weight = h / c_k * (w[(parent, n)] - means[parent] * w[(0, n)]);
                    e_c[(k, dof_x)] += weight * edge.normal.x;
                    e_c[(k, dof_y)] += weight * edge.normal.y;
                }
            }
        }
    }

    for j in 0..interior_map.x.len() {
        let (ky, cy) = interior_map.y[j];
        let (kx, cx) = interior_map.x[j];
        let dof = context.interior_dof(j);
        e[0][(ky, dof)] += context.area * cy / (monomial_degree(ky) + 1) as f64;
        e[1][(kx, dof)] -= context.area * cx / (monomial_degree(kx) + 1) as f64;
    }

    e
}

#[derive(Debug, Clone)]
pub(crate) struct BoundaryCoupling {
    /// `R`, including the mean-value and rotation parts.
    pub rhs: DMatrix<f64>,
    /// `T`, the mean-value part of `R`.
    pub mean: DMatrix<f64>,
    /// `J`.
    pub divergence: DMatrix<f64>,
}

/// Assembles the right-hand side of the projection.
///
/// Row $i$ of `R` evaluates, for a test monomial $q_i$,
/// $\int_{\partial K} \varepsilon(q_i) n \cdot v - \int_K \mathrm{div}\,\varepsilon(q_i) \cdot v$
/// plus the rigid-body functionals of $q_i$ times the corresponding functionals of $v$.
/// `J` evaluates $\int_K \mathrm{div}\, v \, m_l$ for $m_l \in P_{p-1}$ under the assumption
/// that the divergence of $v$ is constant on the cell.
pub(crate) fn assemble_boundary_coupling(
    context: &CellContext,
    moment_map: &[DMatrix<f64>; 2],
    rigid: &RigidBodyFunctionals,
) -> BoundaryCoupling {
    let p = context.order;
    let nk = polynomial_dim(p);
    let nk1 = polynomial_dim(p - 1);
    let nl = context.num_local_dofs();
    let h = context.scale;
    let area = context.area;
    let means = context.monomial_means(nk1);
    let first = first_derivative_map(p);
    let second = second_derivative_map(p);

    let mut r = DMatrix::zeros(2 * nk, nl);
    let mut j = DMatrix::zeros(nk1, nl);
    let mut mean_of_dofs = [DVector::zeros(nl), DVector::zeros(nl)];
    let mut rotation_of_dofs = DVector::zeros(nl);

    for (local_edge, edge) in context.edges.iter().enumerate() {
        let (nx, ny) = (edge.normal.x, edge.normal.y);
        let w = &edge.trace_weights;

        for n in 0..p {
            let (dof_x, dof_y) = (context.edge_dof(0, local_edge, n), context.edge_dof(1, local_edge, n));

            // Traction of the test monomials against the trace of v
            for k in 0..nk1 {
                let (ix, cx) = first.x[k];
                let (iy, cy) = first.y[k];
                let wx = cx / h * w[(k, n)];
                let wy = cy / h * w[(k, n)];
                r[(ix, dof_x)] += wx * nx;
                r[(iy, dof_x)] += 0.5 * wy * ny;
                r[(iy, dof_y)] += 0.5 * wy * nx;
                r[(nk + ix, dof_x)] += 0.5 * wx * ny;
                r[(nk + ix, dof_y)] += 0.5 * wx * nx;
                r[(nk + iy, dof_y)] += wy * ny;
            }

            // Mean values via h int_{dK} (x~ - mean(x~)) v.n, exact for constant divergence
            for (mean_c, index) in mean_of_dofs.iter_mut().zip([1, 2]) {
                let weight = h / area * (w[(index, n)] - means[index] * w[(0, n)]);
                mean_c[dof_x] += weight * nx;
                mean_c[dof_y] += weight * ny;
            }
        }

        // Only the constant edge basis function carries the edge mean
        let (dof_x, dof_y) = (context.edge_dof(0, local_edge, 0), context.edge_dof(1, local_edge, 0));
        rotation_of_dofs[dof_x] += edge.length * ny / area;
        rotation_of_dofs[dof_y] -= edge.length * nx / area;
        for l in 0..nk1 {
            j[(l, dof_x)] += means[l] * edge.length * nx;
            j[(l, dof_y)] += means[l] * edge.length * ny;
        }
    }

    let [e_x, e_y] = moment_map;
    let h2 = h * h;
    for k in 0..second.xx.len() {
        let (ixx, cxx) = second.xx[k];
        let (iyy, cyy) = second.yy[k];
        let (ixy, cxy) = second.xy[k];
        add_scaled_row(&mut r, ixx, -cxx / h2, e_x, k);
        add_scaled_row(&mut r, iyy, -0.5 * cyy / h2, e_x, k);
        add_scaled_row(&mut r, ixy, -0.5 * cxy / h2, e_y, k);
        add_scaled_row(&mut r, nk + ixy, -0.5 * cxy / h2, e_x, k);
        add_scaled_row(&mut r, nk + ixx, -0.5 * cxx / h2, e_y, k);
        add_scaled_row(&mut r, nk + iyy, -cyy / h2, e_y, k);
    }

    let [rigid_mean_x, rigid_mean_y] = &rigid.mean;
    let [dof_mean_x, dof_mean_y] = &mean_of_dofs;
    let t = rigid_mean_x * dof_mean_x.transpose() + rigid_mean_y * dof_mean_y.transpose();
    r += &t;
    r += &rigid.rotation * rotation_of_dofs.transpose();

    BoundaryCoupling {
        rhs: r,
        mean: t,
        divergence: j,
    }
}

fn add_scaled_row(target: &mut DMatrix<f64>, row: usize, coefficient: f64, source: &DMatrix<f64>, source_row: usize) {
    for (t, s) in target.row_mut(row).iter_mut().zip(source.row(source_row).iter()) {
        *t += coefficient * s;
    }
}

/// Assembles `D`, whose column $i$ holds the local DOFs of the $i$-th vector monomial.
pub(crate) fn assemble_dofs_of_monomials(context: &CellContext) -> DMatrix<f64> {
    let p = context.order;
    let nk = polynomial_dim(p);
    let nl = context.num_local_dofs();
    let mut d = DMatrix::zeros(nl, 2 * nk);

    for (local_edge, edge) in context.edges.iter().enumerate() {
        for n in 0..p {
            let (dof_x, dof_y) = (context.edge_dof(0, local_edge, n), context.edge_dof(1, local_edge, n));
            for i in 0..nk {
                let value = edge.monomial_moments[(i, n)] / edge.length;
                d[(dof_x, i)] = value;
                d[(dof_y, nk + i)] = value;
            }
        }
    }

    let interior_map = first_derivative_map(p - 2);
    for k in 0..interior_map.x.len() {
        let (ky, _) = interior_map.y[k];
        let (kx, _) = interior_map.x[k];
        let dof = context.interior_dof(k);
        for i in 0..nk {
            d[(dof, i)] = context.mass[(ky, i)] / context.area;
            d[(dof, nk + i)] = -context.mass[(kx, i)] / context.area;
        }
    }

    d
}
