use crate::basis::{polynomial_dim, MonomialBasis};
use crate::dof::DofMap;
use crate::mesh::PolygonalMesh;
use crate::quadrature::{polygon_quadrature, Quadrature, QuadratureProvider};
use crate::space::{CellBlocks, VirtualElementSpace};
use eyre::eyre;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut, Point2, Vector2};

pub trait ElementConnectivityAssembler {
    fn num_elements(&self) -> usize;

    /// The total number of global DOFs.
    fn num_dofs(&self) -> usize;

    fn element_dof_count(&self, element_index: usize) -> usize;

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize);
}

impl ElementConnectivityAssembler for DofMap {
    fn num_elements(&self) -> usize {
        self.cell_to_dof().len()
    }

    fn num_dofs(&self) -> usize {
        self.number_of_global_dofs()
    }

    fn element_dof_count(&self, element_index: usize) -> usize {
        self.number_of_local_dofs(element_index)
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        self.populate_cell_global_dofs(element_index, output)
    }
}

pub trait ElementMatrixAssembler: ElementConnectivityAssembler {
    fn assemble_element_matrix_into(&self, element_index: usize, output: DMatrixViewMut<f64>) -> eyre::Result<()>;
}

pub trait ElementVectorAssembler: ElementConnectivityAssembler {
    fn assemble_element_vector_into(&self, element_index: usize, output: DVectorViewMut<f64>) -> eyre::Result<()>;
}

/// Assembles the local stiffness matrices of a virtual element space.
#[derive(Debug, Clone, Copy)]
pub struct ElementStiffnessAssembler<'s> {
    dof_map: &'s DofMap,
    cells: &'s [CellBlocks],
}

impl<'s> ElementStiffnessAssembler<'s> {
    pub fn new(dof_map: &'s DofMap, cells: &'s [CellBlocks]) -> Self {
        assert_eq!(
            dof_map.num_elements(),
            cells.len(),
            "Number of cell blocks must match the number of cells in the DOF map."
        );
        Self { dof_map, cells }
    }
}

impl<'s> ElementConnectivityAssembler for ElementStiffnessAssembler<'s> {
    fn num_elements(&self) -> usize {
        self.dof_map.num_elements()
    }

    fn num_dofs(&self) -> usize {
        self.dof_map.num_dofs()
    }

    fn element_dof_count(&self, element_index: usize) -> usize {
        self.dof_map.element_dof_count(element_index)
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        self.dof_map.populate_element_dofs(output, element_index)
    }
}

impl<'s> ElementMatrixAssembler for ElementStiffnessAssembler<'s> {
    fn assemble_element_matrix_into(&self, element_index: usize, output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        assemble_element_stiffness_matrix(output, &self.cells[element_index]);
        Ok(())
    }
}

/// Assemble the local stiffness matrix of a cell from its projector blocks.
///
/// The matrix is the sum of the consistency term $U^T H U$, with
///
/// $$
/// U = \begin{pmatrix} B_x^T & 0 \\ B_y^T & B_x^T \\ 0 & B_y^T \end{pmatrix} \Pi_0,
/// \qquad H = \mathrm{diag}(H_0, \tfrac{1}{2} H_0, H_0),
/// $$
///
/// which evaluates $\int_K \varepsilon(\Pi_0 u) : \varepsilon(\Pi_0 v)$, and the stabilization
/// $(I - D \Pi_0)^T S (I - D \Pi_0)$ acting on the part of the DOFs not reproduced by the
/// projection.
///
/// # Panics
///
/// Panics if `output` is not a square matrix with one row per local DOF.
pub fn assemble_element_stiffness_matrix(mut output: DMatrixViewMut<f64>, blocks: &CellBlocks) {
    let nl = blocks.num_local_dofs();
    assert_eq!(output.nrows(), nl, "Output must have one row per local DOF");
    assert_eq!(output.ncols(), nl, "Output must have one column per local DOF");

    let pi = blocks.pi0();
    let nk = pi.nrows() / 2;
    let b = blocks.b();
    let (bx, by) = (b.rows(0, nk), b.rows(nk, nk));
    let (pi_x, pi_y) = (pi.rows(0, nk), pi.rows(nk, nk));

    // Moments of the strain components of the projection against P_{p-1}
    let u_xx = bx.transpose() * pi_x;
    let u_yy = by.transpose() * pi_y;
    let u_xy = by.transpose() * pi_x + bx.transpose() * pi_y;

    let h0 = blocks.inverse_mass();
    let consistency = u_xx.transpose() * h0 * &u_xx
        + 0.5 * (u_xy.transpose() * h0 * &u_xy)
        + u_yy.transpose() * h0 * &u_yy;

    let residual = DMatrix::identity(nl, nl) - blocks.d() * pi;
    let stability = residual.transpose() * blocks.stabilization() * &residual;

    output.copy_from(&(consistency + stability));
}

/// Assembles the local load vectors of a body force $f$.
pub struct ElementSourceAssembler<'s, 'a, M: ?Sized, B, Q, F> {
    space: &'s VirtualElementSpace<'a, M, B, Q>,
    source: F,
}

impl<'s, 'a, M, B, Q, F> ElementSourceAssembler<'s, 'a, M, B, Q, F>
where
    M: ?Sized + PolygonalMesh,
{
    pub fn new(space: &'s VirtualElementSpace<'a, M, B, Q>, source: F) -> Self {
        Self { space, source }
    }
}

impl<'s, 'a, M, B, Q, F> ElementConnectivityAssembler for ElementSourceAssembler<'s, 'a, M, B, Q, F>
where
    M: ?Sized + PolygonalMesh,
{
    fn num_elements(&self) -> usize {
        self.space.dof_map().num_elements()
    }

    fn num_dofs(&self) -> usize {
        self.space.dof_map().num_dofs()
    }

    fn element_dof_count(&self, element_index: usize) -> usize {
        self.space.dof_map().element_dof_count(element_index)
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        self.space
            .dof_map()
            .populate_element_dofs(output, element_index)
    }
}

impl<'s, 'a, M, B, Q, F> ElementVectorAssembler for ElementSourceAssembler<'s, 'a, M, B, Q, F>
where
    M: ?Sized + PolygonalMesh,
    B: MonomialBasis,
    Q: QuadratureProvider,
    F: Fn(&Point2<f64>) -> Vector2<f64>,
{
    fn assemble_element_vector_into(&self, element_index: usize, output: DVectorViewMut<f64>) -> eyre::Result<()> {
        let cell = element_index;
        let p = self.space.order();
        let nk2 = polynomial_dim(p - 2);
        let rule = self.space.quadrature().triangle_rule(2 * p);
        let cell_quadrature = polygon_quadrature(self.space.mesh(), cell, &rule);

        let mut m = vec![0.0; nk2];
        let mut moments = [DVector::zeros(nk2), DVector::zeros(nk2)];
        for (w, x) in cell_quadrature.weights().iter().zip(cell_quadrature.points()) {
            self.space
                .basis()
                .populate_cell_basis(cell, p - 2, x, &mut m);
            let f = (self.source)(x);
            for k in 0..nk2 {
                moments[0][k] += w * f.x * m[k];
                moments[1][k] += w * f.y * m[k];
            }
        }

        assemble_element_source_vector(output, self.space.cell_blocks(cell), &moments)
            .map_err(|err| eyre!("Failed to assemble load vector of cell {cell}: {err}"))
    }
}

/// Assemble the local load vector of a cell from the moments $\int_K f_c m_k$,
/// $m_k \in P_{p-2}$, of both components of the body force.
///
/// The force is replaced by its $L^2(K)$ projection onto $[P_{p-2}]^2$, whose coefficients are
/// tested against the computable moments `E` of the virtual functions.
///
/// # Panics
///
/// Panics if `output` does not have one entry per local DOF.
pub fn assemble_element_source_vector(
    mut output: DVectorViewMut<f64>,
    blocks: &CellBlocks,
    moments: &[DVector<f64>; 2],
) -> eyre::Result<()> {
    assert_eq!(
        output.len(),
        blocks.num_local_dofs(),
        "Output must have one entry per local DOF"
    );
    let nk2 = moments[0].len();
    let projection_mass = blocks
        .mass()
        .view((0, 0), (nk2, nk2))
        .into_owned()
        .cholesky()
        .ok_or_else(|| eyre!("cell mass matrix is not positive definite"))?;

    output.fill(0.0);
    for (e_c, moments_c) in blocks.e().iter().zip(moments) {
        let coefficients = projection_mass.solve(moments_c);
        output.gemv_tr(1.0, e_c, &coefficients, 1.0);
    }
    Ok(())
}
