//! Per-cell projector data.
use crate::basis::{lowered_polynomial_dim, polynomial_dim, MonomialBasis};
use crate::mesh::PolygonalMesh;
use crate::quadrature::{segment_quadrature, Quadrature, QuadratureProvider};
use crate::space::coupling::{
    assemble_boundary_coupling, assemble_dofs_of_monomials, assemble_moment_map,
};
use crate::space::moments::{assemble_interior_gram, assemble_strain_and_divergence, RigidBodyFunctionals};
use crate::VemError;
use nalgebra::{DMatrix, Vector2};

/// Relative pivot size below which a local system is considered numerically singular.
const PIVOT_RATIO_TOLERANCE: f64 = 1e-13;

/// Geometric and basis data of a single edge, as seen from one of its cells.
#[derive(Debug, Clone)]
pub(crate) struct CellEdge {
    pub edge: usize,
    pub length: f64,
    /// Normal pointing out of the cell.
    pub normal: Vector2<f64>,
    /// $H_1 = M_e^{-1}$ for the edge basis.
    pub inverse_mass: DMatrix<f64>,
    /// $\int_e m_i \phi_n$ for all monomials $m_i \in P_p$ of the cell.
    pub monomial_moments: DMatrix<f64>,
    /// Weights `W` such that $\int_e v m_\alpha = \sum_n W_{\alpha n} d_n(v)$ for
    /// $m_\alpha \in P_{p-1}$, where $d_n$ are the edge DOFs of $v$.
    pub trace_weights: DMatrix<f64>,
}

/// Everything needed to assemble the blocks of a single cell.
#[derive(Debug, Clone)]
pub(crate) struct CellContext {
    pub cell: usize,
    pub order: usize,
    pub area: f64,
    pub scale: f64,
    /// $\int_K m_i m_j$ for $m_i, m_j \in P_p$.
    pub mass: DMatrix<f64>,
    pub edges: Vec<CellEdge>,
}

impl CellContext {
    pub fn new<M, B, Q>(mesh: &M, basis: &B, quadrature: &Q, cell: usize, order: usize) -> Result<Self, VemError>
    where
        M: ?Sized + PolygonalMesh,
        B: ?Sized + MonomialBasis,
        Q: ?Sized + QuadratureProvider,
    {
        let p = order;
        let nk = polynomial_dim(p);
        let nk1 = polynomial_dim(p - 1);
        // Products m_i * phi_n have degree at most 2p - 1
        let rule = quadrature.edge_rule(2 * p - 1);

        let mut m = vec![0.0; nk];
        let mut phi = vec![0.0; p];
        let edges = mesh
            .cell_edges(cell)
            .iter()
            .enumerate()
            .map(|(local_edge, &edge)| {
                let length = mesh.edge_length(edge);
                let normal = mesh.cell_edge_sign(cell, local_edge) * mesh.edge_unit_normal(edge);
                let inverse_mass = basis
                    .edge_mass_matrix(edge, p - 1)
                    .cholesky()
                    .ok_or(VemError::SingularCellSystem { cell })?
                    .inverse();

                let [a, b] = mesh.edge_endpoints(edge);
                let edge_quadrature = segment_quadrature(&rule, &a, &b);
                let mut monomial_moments = DMatrix::zeros(nk, p);
                for (w, x) in edge_quadrature.weights().iter().zip(edge_quadrature.points()) {
                    basis.populate_cell_basis(cell, p, x, &mut m);
                    basis.populate_edge_basis(edge, p - 1, x, &mut phi);
                    for n in 0..p {
                        for i in 0..nk {
                            monomial_moments[(i, n)] += w * m[i] * phi[n];
                        }
                    }
                }
                let trace_weights = length * monomial_moments.rows(0, nk1) * &inverse_mass;

                Ok(CellEdge {
                    edge,
                    length,
                    normal,
                    inverse_mass,
                    monomial_moments,
                    trace_weights,
                })
            })
            .collect::<Result<Vec<_>, VemError>>()?;

        Ok(Self {
            cell,
            order,
            area: mesh.cell_measure(cell),
            scale: basis.cell_scale(cell),
            mass: basis.cell_mass_matrix(cell, p),
            edges,
        })
    }

    /// The number of edge DOFs of the cell per velocity component.
    pub fn num_component_dofs(&self) -> usize {
        self.order * self.edges.len()
    }

    pub fn num_local_dofs(&self) -> usize {
        2 * self.num_component_dofs() + lowered_polynomial_dim(self.order, 3)
    }

    /// Local index of DOF `n` of the given component on the given local edge.
    pub fn edge_dof(&self, component: usize, local_edge: usize, n: usize) -> usize {
        component * self.num_component_dofs() + local_edge * self.order + n
    }

    /// Local index of interior DOF `k`.
    pub fn interior_dof(&self, k: usize) -> usize {
        2 * self.num_component_dofs() + k
    }

    /// Mean values $|K|^{-1} \int_K m_i$ of the first `n` monomials.
    pub fn monomial_means(&self, n: usize) -> Vec<f64> {
        (0..n).map(|i| self.mass[(0, i)] / self.area).collect()
    }
}

/// All per-cell matrices of a reduced divergence-free nonconforming space.
///
/// With $n_k = \dim P_p$, $n_{k1} = \dim P_{p-1}$, $n_{k2} = \dim P_{p-2}$ and $n_l$ the number
/// of local DOFs of the cell, the blocks have the following shapes:
///
/// | block | shape | meaning |
/// |---|---|---|
/// | `G` | $2 n_k \times 2 n_k$ | strain Gram matrix plus rigid-body stabilization |
/// | `B` | $2 n_k \times n_{k1}$ | $\int_K \mathrm{div}\, q \, m_l$ |
/// | `E` | $2 \times (n_{k2} \times n_l)$ | $\int_K v_c m_k$ in terms of DOFs |
/// | `T` | $2 n_k \times n_l$ | mean-value part of `R` |
/// | `R` | $2 n_k \times n_l$ | right-hand side of the projection |
/// | `J` | $n_{k1} \times n_l$ | $\int_K \mathrm{div}\, v \, m_l$ for constant divergence |
/// | `D` | $n_l \times 2 n_k$ | DOFs of the monomials |
/// | `Π0` | $2 n_k \times n_l$ | monomial coefficients of the projection |
#[derive(Debug, Clone)]
pub struct CellBlocks {
    pub(crate) area: f64,
    pub(crate) scale: f64,
    pub(crate) mass: DMatrix<f64>,
    pub(crate) inverse_mass: DMatrix<f64>,
    pub(crate) edge_inverse_mass: Vec<DMatrix<f64>>,
    pub(crate) strain: DMatrix<f64>,
    pub(crate) rigid: DMatrix<f64>,
    pub(crate) divergence: DMatrix<f64>,
    pub(crate) moment_map: [DMatrix<f64>; 2],
    pub(crate) mean_coupling: DMatrix<f64>,
    pub(crate) rhs: DMatrix<f64>,
    pub(crate) divergence_coupling: DMatrix<f64>,
    pub(crate) dofs_of_monomials: DMatrix<f64>,
    pub(crate) projector: DMatrix<f64>,
    pub(crate) interior: Option<InteriorBlocks>,
    pub(crate) stabilization: DMatrix<f64>,
}

/// Interior blocks, only present for order $p > 2$.
#[derive(Debug, Clone)]
pub(crate) struct InteriorBlocks {
    pub gram: DMatrix<f64>,
    pub moments: DMatrix<f64>,
}

impl CellBlocks {
    pub(crate) fn build(context: &CellContext) -> Result<Self, VemError> {
        let cell = context.cell;
        let nk1 = polynomial_dim(context.order - 1);

        let (strain, divergence) = assemble_strain_and_divergence(context);
        let rigid_functionals = RigidBodyFunctionals::new(context);
        let rigid = rigid_functionals.gram();

        let inverse_mass = context
            .mass
            .view((0, 0), (nk1, nk1))
            .into_owned()
            .cholesky()
            .ok_or(VemError::SingularCellSystem { cell })?
            .inverse();

        let moment_map = assemble_moment_map(context);
        let coupling = assemble_boundary_coupling(context, &moment_map, &rigid_functionals);
        let dofs_of_monomials = assemble_dofs_of_monomials(context);
        let interior = assemble_interior_gram(context).map(|(gram, moments)| InteriorBlocks { gram, moments });

        let g = &strain + &rigid;
        let projector = solve_projection(context, &g, &divergence, &coupling.rhs, &coupling.divergence)?;
        let stabilization = assemble_stabilization(context, interior.as_ref())?;

        Ok(Self {
            area: context.area,
            scale: context.scale,
            mass: context.mass.clone(),
            inverse_mass,
            edge_inverse_mass: context
                .edges
                .iter()
                .map(|e| e.inverse_mass.clone())
                .collect(),
            strain,
            rigid,
            divergence,
            moment_map,
            mean_coupling: coupling.mean,
            rhs: coupling.rhs,
            divergence_coupling: coupling.divergence,
            dofs_of_monomials,
            projector,
            interior,
            stabilization,
        })
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn num_local_dofs(&self) -> usize {
        self.projector.ncols()
    }

    /// The cell mass matrix $\int_K m_i m_j$ for $m_i, m_j \in P_p$.
    pub fn mass(&self) -> &DMatrix<f64> {
        &self.mass
    }

    /// $H_0$, the inverse of the mass matrix restricted to $P_{p-1}$.
    pub fn inverse_mass(&self) -> &DMatrix<f64> {
        &self.inverse_mass
    }

    /// $H_1$ for each local edge of the cell.
    pub fn edge_inverse_mass(&self) -> &[DMatrix<f64>] {
        &self.edge_inverse_mass
    }

    /// The full `G` block, i.e. the strain Gram matrix plus the rigid-body terms.
    pub fn g(&self) -> DMatrix<f64> {
        &self.strain + &self.rigid
    }

    /// $\int_K \varepsilon(q_i) : \varepsilon(q_j)$ for vector monomials $q_i, q_j$.
    pub fn strain(&self) -> &DMatrix<f64> {
        &self.strain
    }

    /// The rank-three rigid-body part of `G`.
    pub fn rigid(&self) -> &DMatrix<f64> {
        &self.rigid
    }

    pub fn b(&self) -> &DMatrix<f64> {
        &self.divergence
    }

    pub fn e(&self) -> &[DMatrix<f64>; 2] {
        &self.moment_map
    }

    pub fn t(&self) -> &DMatrix<f64> {
        &self.mean_coupling
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.rhs
    }

    pub fn j(&self) -> &DMatrix<f64> {
        &self.divergence_coupling
    }

    pub fn d(&self) -> &DMatrix<f64> {
        &self.dofs_of_monomials
    }

    /// The projector $\Pi_0$ from local DOFs to coefficients of $[P_p]^2$.
    pub fn pi0(&self) -> &DMatrix<f64> {
        &self.projector
    }

    /// The Gram matrix `Q` of the interior DOF test functions, or `None` for $p = 2$.
    pub fn q(&self) -> Option<&DMatrix<f64>> {
        self.interior.as_ref().map(|interior| &interior.gram)
    }

    /// The interior moment block `L`, or `None` for $p = 2$.
    pub fn l(&self) -> Option<&DMatrix<f64>> {
        self.interior.as_ref().map(|interior| &interior.moments)
    }

    /// The DOF-space stabilization matrix `S`.
    pub fn stabilization(&self) -> &DMatrix<f64> {
        &self.stabilization
    }
}

/// Solves $\begin{pmatrix} G & B \\ B^T & 0 \end{pmatrix} \begin{pmatrix} \Pi_0 \\ \Lambda
/// \end{pmatrix} = \begin{pmatrix} R \\ J \end{pmatrix}$ and returns $\Pi_0$.
fn solve_projection(
    context: &CellContext,
    g: &DMatrix<f64>,
    b: &DMatrix<f64>,
    r: &DMatrix<f64>,
    j: &DMatrix<f64>,
) -> Result<DMatrix<f64>, VemError> {
    let n = g.nrows();
    let m = b.ncols();
    let mut system = DMatrix::zeros(n + m, n + m);
    system.view_mut((0, 0), (n, n)).copy_from(g);
    system.view_mut((0, n), (n, m)).copy_from(b);
    system.view_mut((n, 0), (m, n)).copy_from(&b.transpose());

    let mut rhs = DMatrix::zeros(n + m, r.ncols());
    rhs.view_mut((0, 0), (n, r.ncols())).copy_from(r);
    rhs.view_mut((n, 0), (m, r.ncols())).copy_from(j);

    let singular = VemError::SingularCellSystem { cell: context.cell };
    let lu = system.lu();
    let pivots = lu.u().diagonal().abs();
    // Also rejects NaN pivots
    if !(pivots.min() > PIVOT_RATIO_TOLERANCE * pivots.max()) {
        return Err(singular);
    }
    let solution = lu.solve(&rhs).ok_or(singular)?;
    Ok(solution.rows(0, n).into_owned())
}

/// Block-diagonal DOF stabilization: $|e|^2 / h_K \, H_1$ for each edge block of both
/// components, and $L^T Q^{-1} L / h_K^2$ for the interior block.
fn assemble_stabilization(context: &CellContext, interior: Option<&InteriorBlocks>) -> Result<DMatrix<f64>, VemError> {
    let p = context.order;
    let nl = context.num_local_dofs();
    let h = context.scale;
    let mut s = DMatrix::zeros(nl, nl);
    for (local_edge, edge) in context.edges.iter().enumerate() {
        let block = (edge.length * edge.length / h) * &edge.inverse_mass;
        for component in 0..2 {
            let offset = context.edge_dof(component, local_edge, 0);
            s.view_mut((offset, offset), (p, p)).copy_from(&block);
        }
    }

    if let Some(interior) = interior {
        let gram_inverse = interior
            .gram
            .clone()
            .cholesky()
            .ok_or(VemError::SingularCellSystem { cell: context.cell })?
            .inverse();
        let l = &interior.moments;
        s += l.transpose() * gram_inverse * l / (h * h);
    }
    Ok(s)
}
