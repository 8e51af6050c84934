//! Reduced divergence-free nonconforming virtual element spaces.
//!
//! A [`VirtualElementSpace`] of order $p \geq 2$ precomputes, for every cell, the blocks of the
//! local projection problem and the projector $\Pi_0$ from local DOFs onto $[P_p]^2$. The
//! projection of a local DOF vector $v$ is the polynomial $\pi$ determined by
//!
//! $$
//! \begin{pmatrix} G & B \\ B^T & 0 \end{pmatrix}
//! \begin{pmatrix} \pi \\ \lambda \end{pmatrix}
//! = \begin{pmatrix} R \\ J \end{pmatrix} v,
//! $$
//!
//! where $G$ is the strain Gram matrix augmented by the rigid-body functionals and $B$ pairs
//! the divergence with $P_{p-1}$. The projection reproduces every field of $[P_p]^2$ with
//! constant divergence on the cell.
use crate::assembly::global::{gather_global_to_local, CsrParAssembler, SerialVectorAssembler};
use crate::assembly::local::{ElementSourceAssembler, ElementStiffnessAssembler};
use crate::basis::{first_derivative_map, lowered_polynomial_dim, polynomial_dim, MonomialBasis, ScaledMonomialSpace};
use crate::dof::DofMap;
use crate::mesh::PolygonalMesh;
use crate::nested_vec::NestedVec;
use crate::quadrature::{polygon_quadrature, segment_quadrature, GaussQuadrature, Quadrature, QuadratureProvider};
use crate::space::cell::CellContext;
use crate::VemError;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, Point2, Vector2};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;

mod cell;
mod coupling;
mod moments;

pub use cell::CellBlocks;

/// Cells with an area below this fraction of the largest cell area are reported.
const SMALL_CELL_AREA_RATIO: f64 = 1e-10;

/// A reduced divergence-free nonconforming virtual element space on a polygonal mesh.
///
/// The mesh, monomial basis and quadrature are substitutable through the [`PolygonalMesh`],
/// [`MonomialBasis`] and [`QuadratureProvider`] traits.
#[derive(Debug)]
pub struct VirtualElementSpace<'a, M: ?Sized, B = ScaledMonomialSpace<'a, M>, Q = GaussQuadrature> {
    mesh: &'a M,
    basis: B,
    quadrature: Q,
    dof_map: DofMap,
    cells: Vec<CellBlocks>,
}

impl<'a, M> VirtualElementSpace<'a, M>
where
    M: ?Sized + PolygonalMesh + Sync,
{
    /// Builds the space of the given order with scaled monomials and Gauss quadrature.
    ///
    /// # Errors
    ///
    /// See [`with_providers`](Self::with_providers).
    pub fn new(mesh: &'a M, order: usize) -> Result<Self, VemError> {
        Self::with_providers(mesh, ScaledMonomialSpace::new(mesh), GaussQuadrature, order)
    }
}

impl<'a, M, B, Q> VirtualElementSpace<'a, M, B, Q>
where
    M: ?Sized + PolygonalMesh + Sync,
    B: MonomialBasis + Sync,
    Q: QuadratureProvider + Sync,
{
    /// Builds the space of the given order with custom basis and quadrature providers.
    ///
    /// Cells are processed in parallel. Construction fails as a whole if any cell fails.
    ///
    /// # Errors
    ///
    /// Returns [`VemError::InvalidOrder`] if `order < 2`, [`VemError::InvalidTopology`] if the
    /// edge-to-cell table of the mesh is inconsistent, and [`VemError::SingularCellSystem`] if a
    /// local system of some cell cannot be solved reliably.
    pub fn with_providers(mesh: &'a M, basis: B, quadrature: Q, order: usize) -> Result<Self, VemError> {
        let dof_map = DofMap::new(mesh, order)?;
        info!(
            "Building order {} space on {} cells and {} edges with {} DOFs.",
            order,
            mesh.number_of_cells(),
            mesh.number_of_edges(),
            dof_map.number_of_global_dofs()
        );
        warn_about_small_cells(mesh);

        let cells = (0..mesh.number_of_cells())
            .into_par_iter()
            .map(|cell| {
                let context = CellContext::new(mesh, &basis, &quadrature, cell, order)?;
                CellBlocks::build(&context)
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Computed projector blocks for {} cells.", cells.len());

        Ok(Self {
            mesh,
            basis,
            quadrature,
            dof_map,
            cells,
        })
    }

    /// Returns a vector with one entry for every global DOF, initialized to zero.
    pub fn zero_vector(&self) -> DVector<f64> {
        DVector::zeros(self.number_of_global_dofs())
    }

    /// Computes the DOFs of a given vector field.
    ///
    /// Edge DOFs are the scaled moments $|e|^{-1} \int_e u_c \phi_n$ and interior DOFs the
    /// scaled moments $|K|^{-1} \int_K u \cdot (\tilde y m_k, -\tilde x m_k)$.
    pub fn interpolate(&self, u: impl Fn(&Point2<f64>) -> Vector2<f64>) -> DVector<f64> {
        let p = self.order();
        let shift = self.dof_map.number_of_component_edge_dofs();
        let mut uh = self.zero_vector();

        for edge in 0..self.mesh.number_of_edges() {
            let [moments_x, moments_y] = self.edge_moments(edge, &u);
            let dofs = self.dof_map.edge_dofs(edge);
            uh.rows_mut(dofs.start, p).copy_from(&moments_x);
            uh.rows_mut(dofs.start + shift, p).copy_from(&moments_y);
        }

        let idof = self.dof_map.interior_dofs_per_cell();
        if idof > 0 {
            let rule = self.quadrature.triangle_rule(2 * p);
            let map = first_derivative_map(p - 2);
            let mut m = vec![0.0; polynomial_dim(p - 2)];
            for cell in 0..self.mesh.number_of_cells() {
                let area = self.mesh.cell_measure(cell);
                let cell_quadrature = polygon_quadrature(self.mesh, cell, &rule);
                let dofs = self.dof_map.cell_interior_dofs(cell);
                for (w, x) in cell_quadrature.weights().iter().zip(cell_quadrature.points()) {
                    self.basis.populate_cell_basis(cell, p - 2, x, &mut m);
                    let value = u(x);
                    for (k, dof) in dofs.clone().enumerate() {
                        uh[dof] += w * (value.x * m[map.y[k].0] - value.y * m[map.x[k].0]) / area;
                    }
                }
            }
        }

        uh
    }

    /// Applies $\Pi_0$ cell by cell and returns the coefficients of the projected field on each
    /// cell, x-component monomials first.
    ///
    /// # Errors
    ///
    /// Returns [`VemError::DimensionMismatch`] if `uh` does not have one entry per global DOF.
    pub fn project_to_monomials(&self, uh: &DVector<f64>) -> Result<Vec<DVector<f64>>, VemError> {
        self.check_global_vector(uh)?;
        let coefficients = (0..self.cells.len())
            .into_par_iter()
            .map(|cell| {
                let dofs = self.dof_map.cell_global_dofs(cell);
                let mut local = DVector::zeros(dofs.len());
                gather_global_to_local(uh, &mut local, &dofs);
                self.cells[cell].pi0() * local
            })
            .collect();
        Ok(coefficients)
    }

    /// Evaluates a field given by its monomial coefficients on a cell at the point `x`.
    ///
    /// # Panics
    ///
    /// Panics if `coefficients` does not have length $2 \dim P_p$.
    pub fn evaluate_projection(&self, cell: usize, coefficients: &DVector<f64>, x: &Point2<f64>) -> Vector2<f64> {
        let nk = polynomial_dim(self.order());
        assert_eq!(coefficients.len(), 2 * nk, "Coefficient vector has wrong length");
        let mut m = DVector::zeros(nk);
        self.basis
            .populate_cell_basis(cell, self.order(), x, m.as_mut_slice());
        Vector2::new(
            coefficients.rows(0, nk).dot(&m),
            coefficients.rows(nk, nk).dot(&m),
        )
    }

    /// Writes the DOFs of the boundary data `g` into the boundary edge DOFs of both velocity
    /// components of `gh`, and returns flags marking all boundary DOFs.
    ///
    /// Other entries of `gh` are left untouched. The written values are the scaled edge moments
    /// $|e|^{-1} \int_e g_c \phi_n$, consistent with the DOF definition, not the coefficients of
    /// the $L^2(e)$ projection, which are available from
    /// [`edge_trace_coefficients`](Self::edge_trace_coefficients).
    ///
    /// # Errors
    ///
    /// Returns [`VemError::DimensionMismatch`] if `gh` does not have one entry per global DOF.
    pub fn set_dirichlet_bc(
        &self,
        gh: &mut DVector<f64>,
        g: impl Fn(&Point2<f64>) -> Vector2<f64>,
    ) -> Result<Vec<bool>, VemError> {
        self.check_global_vector(gh)?;
        let p = self.order();
        let shift = self.dof_map.number_of_component_edge_dofs();
        for edge in (0..self.mesh.number_of_edges()).filter(|&e| self.mesh.is_boundary_edge(e)) {
            let [moments_x, moments_y] = self.edge_moments(edge, &g);
            let dofs = self.dof_map.edge_dofs(edge);
            gh.rows_mut(dofs.start, p).copy_from(&moments_x);
            gh.rows_mut(dofs.start + shift, p).copy_from(&moments_y);
        }
        Ok(self.boundary_dof())
    }

    /// Coefficients of the $L^2(e)$ projection of both components of `g` onto the edge basis,
    /// obtained by applying $H_1 = M_e^{-1}$ to the moments $\int_e g_c \phi_n$.
    ///
    /// # Errors
    ///
    /// Returns [`VemError::SingularCellSystem`] (reporting the first cell of the edge) if the edge
    /// mass matrix cannot be inverted.
    pub fn edge_trace_coefficients(
        &self,
        edge: usize,
        g: impl Fn(&Point2<f64>) -> Vector2<f64>,
    ) -> Result<[DVector<f64>; 2], VemError> {
        let cell = self.mesh.edge_to_cell()[edge][0];
        let inverse_mass = self
            .basis
            .edge_mass_matrix(edge, self.order() - 1)
            .cholesky()
            .ok_or(VemError::SingularCellSystem { cell })?
            .inverse();
        let length = self.mesh.edge_length(edge);
        let [moments_x, moments_y] = self.edge_moments(edge, &g);
        Ok([
            length * &inverse_mass * moments_x,
            length * &inverse_mass * moments_y,
        ])
    }

    /// The scaled edge moments $|e|^{-1} \int_e u_c \phi_n$ of both components.
    fn edge_moments(&self, edge: usize, u: impl Fn(&Point2<f64>) -> Vector2<f64>) -> [DVector<f64>; 2] {
        let p = self.order();
        // Exact for data of degree up to p + 3
        let rule = self.quadrature.edge_rule(2 * p + 2);
        let [a, b] = self.mesh.edge_endpoints(edge);
        let length = self.mesh.edge_length(edge);
        let edge_quadrature = segment_quadrature(&rule, &a, &b);

        let mut phi = vec![0.0; p];
        let mut moments = [DVector::zeros(p), DVector::zeros(p)];
        for (w, x) in edge_quadrature.weights().iter().zip(edge_quadrature.points()) {
            self.basis.populate_edge_basis(edge, p - 1, x, &mut phi);
            let value = u(x);
            for n in 0..p {
                moments[0][n] += w * value.x * phi[n] / length;
                moments[1][n] += w * value.y * phi[n] / length;
            }
        }
        moments
    }

    /// Assembles the global stiffness matrix.
    pub fn matrix_a(&self) -> eyre::Result<CsrMatrix<f64>> {
        CsrParAssembler::default().assemble(&self.stiffness_assembler())
    }

    pub fn stiffness_assembler(&self) -> ElementStiffnessAssembler<'_> {
        ElementStiffnessAssembler::new(&self.dof_map, &self.cells)
    }

    /// Assembles the load vector of the given body force.
    ///
    /// On each cell, the force is projected onto $[P_{p-2}]^2$ in $L^2(K)$ and tested against
    /// the virtual functions through their computable moments.
    pub fn source_vector<F>(&self, f: F) -> eyre::Result<DVector<f64>>
    where
        F: Fn(&Point2<f64>) -> Vector2<f64>,
    {
        SerialVectorAssembler::default().assemble_vector(&self.source_assembler(f))
    }

    pub fn source_assembler<F>(&self, f: F) -> ElementSourceAssembler<'_, 'a, M, B, Q, F>
    where
        F: Fn(&Point2<f64>) -> Vector2<f64>,
    {
        ElementSourceAssembler::new(self, f)
    }

    /// Assembles the global divergence operator coupling velocity DOFs to piecewise
    /// polynomial pressures of degree $p - 1$.
    ///
    /// Row `cell * dim P_{p-1} + l` evaluates $\int_K \mathrm{div}\, v \, m_l$.
    pub fn divergence_matrix(&self) -> CsrMatrix<f64> {
        let nk1 = polynomial_dim(self.order() - 1);
        let num_rows = self.cells.len() * nk1;
        let num_triplets: usize = self
            .cells
            .iter()
            .map(|blocks| nk1 * blocks.num_local_dofs())
            .sum();

        let mut coo = CooMatrix::new(num_rows, self.number_of_global_dofs());
        coo.reserve(num_triplets);
        for (cell, blocks) in self.cells.iter().enumerate() {
            let dofs = self.dof_map.cell_global_dofs(cell);
            let j = blocks.j();
            for l in 0..nk1 {
                for (local, &global) in dofs.iter().enumerate() {
                    coo.push(cell * nk1 + l, global, j[(l, local)]);
                }
            }
        }
        CsrMatrix::from(&coo)
    }

    fn check_global_vector(&self, v: &DVector<f64>) -> Result<(), VemError> {
        let expected = self.number_of_global_dofs();
        if v.len() != expected {
            Err(VemError::DimensionMismatch {
                expected,
                actual: v.len(),
            })
        } else {
            Ok(())
        }
    }
}

fn warn_about_small_cells<M>(mesh: &M)
where
    M: ?Sized + PolygonalMesh,
{
    let max_area = (0..mesh.number_of_cells())
        .map(|cell| mesh.cell_measure(cell))
        .fold(0.0, f64::max);
    for cell in 0..mesh.number_of_cells() {
        let area = mesh.cell_measure(cell);
        if area <= SMALL_CELL_AREA_RATIO * max_area {
            warn!(
                "Cell {} has area {:e}, compared to {:e} for the largest cell. \
                 Its local systems may be ill-conditioned.",
                cell, area, max_area
            );
        }
    }
}

impl<'a, M, B, Q> VirtualElementSpace<'a, M, B, Q>
where
    M: ?Sized + PolygonalMesh,
{
    pub fn order(&self) -> usize {
        self.dof_map.order()
    }

    pub fn mesh(&self) -> &'a M {
        self.mesh
    }

    pub fn basis(&self) -> &B {
        &self.basis
    }

    pub fn quadrature(&self) -> &Q {
        &self.quadrature
    }

    pub fn dof_map(&self) -> &DofMap {
        &self.dof_map
    }

    pub fn number_of_global_dofs(&self) -> usize {
        self.dof_map.number_of_global_dofs()
    }

    pub fn number_of_local_dofs(&self, cell: usize) -> usize {
        self.dof_map.number_of_local_dofs(cell)
    }

    /// The number of interior DOFs per cell, or zero for $p = 2$.
    pub fn number_of_interior_dofs_per_cell(&self) -> usize {
        lowered_polynomial_dim(self.order(), 3)
    }

    /// The x-component edge DOFs of every cell. See [`DofMap::cell_to_dof`].
    pub fn cell_to_dof(&self) -> &NestedVec<usize> {
        self.dof_map.cell_to_dof()
    }

    /// Flags all global DOFs associated with boundary edges.
    pub fn boundary_dof(&self) -> Vec<bool> {
        self.dof_map.vector_boundary_dof()
    }

    /// The precomputed blocks of the given cell.
    pub fn cell_blocks(&self, cell: usize) -> &CellBlocks {
        &self.cells[cell]
    }

    pub fn cells(&self) -> &[CellBlocks] {
        &self.cells
    }

    /// The projector $\Pi_0$ of the given cell.
    pub fn matrix_pi0(&self, cell: usize) -> &DMatrix<f64> {
        self.cells[cell].pi0()
    }
}
