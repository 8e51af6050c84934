//! Polynomial Gram blocks: the strain Gram matrix, rigid-body terms, the divergence block
//! and the interior moment blocks.
use crate::basis::{first_derivative_map, lowered_polynomial_dim, polynomial_dim};
use crate::space::cell::CellContext;
use nalgebra::{DMatrix, DVector};

/// Assembles the strain Gram matrix $\int_K \varepsilon(q_i) : \varepsilon(q_j)$ and the
/// divergence block $\int_K \mathrm{div}\, q_i \, m_l$ for vector monomials $q_i$ in
/// $[P_p]^2$ and $m_l \in P_{p-1}$.
///
/// Vector monomials are ordered with all x-component monomials first. Because
/// $2 \varepsilon_{12} \varepsilon_{12} = \frac{1}{2} (\partial_y u_1 + \partial_x u_2)
/// (\partial_y v_1 + \partial_x v_2)$, the shear contributions enter with weight one half.
pub(crate) fn assemble_strain_and_divergence(context: &CellContext) -> (DMatrix<f64>, DMatrix<f64>) {
    let p = context.order;
    let nk = polynomial_dim(p);
    let nk1 = polynomial_dim(p - 1);
    let h = context.scale;
    let map = first_derivative_map(p);
    let mass = &context.mass;

    let mut strain = DMatrix::zeros(2 * nk, 2 * nk);
    for k in 0..nk1 {
        let (ix_k, cx_k) = map.x[k];
        let (iy_k, cy_k) = map.y[k];
        for l in 0..nk1 {
            let (ix_l, cx_l) = map.x[l];
            let (iy_l, cy_l) = map.y[l];
            let m = mass[(k, l)] / (h * h);

            strain[(ix_k, ix_l)] += cx_k * cx_l * m;
            strain[(iy_k, iy_l)] += 0.5 * cy_k * cy_l * m;
            strain[(iy_k, nk + ix_l)] += 0.5 * cy_k * cx_l * m;
            strain[(nk + ix_l, iy_k)] += 0.5 * cy_k * cx_l * m;
            strain[(nk + ix_k, nk + ix_l)] += 0.5 * cx_k * cx_l * m;
            strain[(nk + iy_k, nk + iy_l)] += cy_k * cy_l * m;
        }
    }

    let mut divergence = DMatrix::zeros(2 * nk, nk1);
    for k in 0..nk1 {
        let (ix, cx) = map.x[k];
        let (iy, cy) = map.y[k];
        for l in 0..nk1 {
            divergence[(ix, l)] += cx / h * mass[(k, l)];
            divergence[(nk + iy, l)] += cy / h * mass[(k, l)];
        }
    }

    (strain, divergence)
}

/// The three functionals that fix the rigid-body part of the projection: the mean values of
/// both components and the mean rotation $|K|^{-1} \int_K (\partial_y v_1 - \partial_x v_2)$,
/// expressed on the coefficients of $[P_p]^2$.
#[derive(Debug, Clone)]
pub(crate) struct RigidBodyFunctionals {
    pub mean: [DVector<f64>; 2],
    pub rotation: DVector<f64>,
}

impl RigidBodyFunctionals {
    pub fn new(context: &CellContext) -> Self {
        let p = context.order;
        let nk = polynomial_dim(p);
        let nk1 = polynomial_dim(p - 1);
        let h = context.scale;
        let means = context.monomial_means(nk);
        let map = first_derivative_map(p);

        let mut mean = [DVector::zeros(2 * nk), DVector::zeros(2 * nk)];
        mean[0].rows_mut(0, nk).copy_from_slice(&means);
        mean[1].rows_mut(nk, nk).copy_from_slice(&means);

        let mut rotation = DVector::zeros(2 * nk);
        for k in 0..nk1 {
            let (ix, cx) = map.x[k];
            let (iy, cy) = map.y[k];
            rotation[iy] += cy / h * means[k];
            rotation[nk + ix] -= cx / h * means[k];
        }

        Self { mean, rotation }
    }

    /// The rank-three Gram matrix of the rigid-body functionals.
    pub fn gram(&self) -> DMatrix<f64> {
        let [mean_x, mean_y] = &self.mean;
        mean_x * mean_x.transpose() + mean_y * mean_y.transpose() + &self.rotation * self.rotation.transpose()
    }
}

/// Assembles the Gram matrix `Q` of the interior DOF test functions
/// $\psi_k = (\tilde y \, m_k, -\tilde x \, m_k)$, $m_k \in P_{p-3}$, and the block `L`
/// pairing the interior DOFs with their moments $\int_K v \cdot \psi_k = |K| d_k(v)$.
///
/// Returns `None` for $p = 2$, where there are no interior DOFs.
pub(crate) fn assemble_interior_gram(context: &CellContext) -> Option<(DMatrix<f64>, DMatrix<f64>)> {
    let p = context.order;
    let idof = lowered_polynomial_dim(p, 3);
    if idof == 0 {
        return None;
    }

    let map = first_derivative_map(p - 2);
    let mass = &context.mass;
    let gram = DMatrix::from_fn(idof, idof, |k, l| {
        mass[(map.y[k].0, map.y[l].0)] + mass[(map.x[k].0, map.x[l].0)]
    });

    let mut moments = DMatrix::zeros(idof, context.num_local_dofs());
    for k in 0..idof {
        moments[(k, context.interior_dof(k))] = context.area;
    }

    Some((gram, moments))
}
