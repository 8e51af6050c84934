use crate::assembly::local::{ElementMatrixAssembler, ElementVectorAssembler};
use eyre::ensure;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// An assembler for CSR matrices.
///
/// Element matrices are collected as triplets, and duplicate entries are summed when
/// converting to CSR.
#[derive(Debug, Default)]
pub struct CsrAssembler {
    // Buffers that help prevent unnecessary allocations
    // when assembling multiple matrices with the same assembler
    workspace: RefCell<CsrAssemblerWorkspace>,
}

#[derive(Debug, Clone)]
struct CsrAssemblerWorkspace {
    element_global_dofs: Vec<usize>,
    element_matrix: DMatrix<f64>,
}

impl Default for CsrAssemblerWorkspace {
    fn default() -> Self {
        Self {
            element_global_dofs: Vec::new(),
            element_matrix: DMatrix::zeros(0, 0),
        }
    }
}

impl CsrAssemblerWorkspace {
    /// Computes the element matrix of the given element into the workspace buffers.
    fn compute_element_matrix<A>(&mut self, element_assembler: &A, element_index: usize) -> eyre::Result<()>
    where
        A: ?Sized + ElementMatrixAssembler,
    {
        let n = element_assembler.element_dof_count(element_index);
        self.element_global_dofs.resize(n, 0);
        self.element_matrix.resize_mut(n, n, 0.0);
        self.element_matrix.fill(0.0);

        element_assembler.assemble_element_matrix_into(element_index, DMatrixViewMut::from(&mut self.element_matrix))?;
        element_assembler.populate_element_dofs(&mut self.element_global_dofs, element_index);
        Ok(())
    }

    fn element_triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let dofs = &self.element_global_dofs;
        (0..dofs.len()).flat_map(move |i| (0..dofs.len()).map(move |j| (dofs[i], dofs[j], self.element_matrix[(i, j)])))
    }
}

impl CsrAssembler {
    pub fn assemble(&self, element_assembler: &dyn ElementMatrixAssembler) -> eyre::Result<CsrMatrix<f64>> {
        let n = element_assembler.num_dofs();
        let mut coo = CooMatrix::new(n, n);

        // Reuse previously allocated buffers
        let ws = &mut *self.workspace.borrow_mut();
        for element_index in 0..element_assembler.num_elements() {
            ws.compute_element_matrix(element_assembler, element_index)?;
            for (i, j, v) in ws.element_triplets() {
                coo.push(i, j, v);
            }
        }

        Ok(CsrMatrix::from(&coo))
    }
}

/// A parallel assembler for CSR matrices.
///
/// Element matrices are computed in parallel with thread-local buffers. The resulting triplets
/// are gathered and summed into a CSR matrix sequentially.
#[derive(Debug, Default)]
pub struct CsrParAssembler {
    workspace: ThreadLocal<RefCell<CsrAssemblerWorkspace>>,
}

impl CsrParAssembler {
    pub fn assemble(&self, element_assembler: &(dyn Sync + ElementMatrixAssembler)) -> eyre::Result<CsrMatrix<f64>> {
        let n = element_assembler.num_dofs();
        let element_triplets = (0..element_assembler.num_elements())
            .into_par_iter()
            .with_min_len(16)
            .map(|element_index| -> eyre::Result<Vec<_>> {
                let ws = &mut *self.workspace.get_or_default().borrow_mut();
                ws.compute_element_matrix(element_assembler, element_index)?;
                Ok(ws.element_triplets().collect::<Vec<_>>())
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        let num_triplets = element_triplets.iter().map(Vec::len).sum();
        let mut coo = CooMatrix::new(n, n);
        coo.reserve(num_triplets);
        for (i, j, v) in element_triplets.into_iter().flatten() {
            coo.push(i, j, v);
        }

        Ok(CsrMatrix::from(&coo))
    }
}

/// An assembler for global vectors.
#[derive(Debug, Default)]
pub struct SerialVectorAssembler {
    workspace: RefCell<VectorAssemblerWorkspace>,
}

#[derive(Debug, Clone)]
struct VectorAssemblerWorkspace {
    element_global_dofs: Vec<usize>,
    element_vector: DVector<f64>,
}

impl Default for VectorAssemblerWorkspace {
    fn default() -> Self {
        Self {
            element_global_dofs: Vec::new(),
            element_vector: DVector::zeros(0),
        }
    }
}

impl SerialVectorAssembler {
    pub fn assemble_vector(&self, element_assembler: &dyn ElementVectorAssembler) -> eyre::Result<DVector<f64>> {
        let mut output = DVector::zeros(element_assembler.num_dofs());
        self.assemble_vector_into(&mut output, element_assembler)?;
        Ok(output)
    }

    /// Adds the element vectors of all elements to `output`.
    pub fn assemble_vector_into(
        &self,
        output: &mut DVector<f64>,
        element_assembler: &dyn ElementVectorAssembler,
    ) -> eyre::Result<()> {
        ensure!(
            output.len() == element_assembler.num_dofs(),
            "Output vector has length {}, but the assembler has {} DOFs",
            output.len(),
            element_assembler.num_dofs()
        );

        let ws = &mut *self.workspace.borrow_mut();
        for element_index in 0..element_assembler.num_elements() {
            let n = element_assembler.element_dof_count(element_index);
            ws.element_global_dofs.resize(n, 0);
            ws.element_vector.resize_vertically_mut(n, 0.0);
            ws.element_vector.fill(0.0);

            element_assembler
                .assemble_element_vector_into(element_index, DVectorViewMut::from(&mut ws.element_vector))?;
            element_assembler.populate_element_dofs(&mut ws.element_global_dofs, element_index);

            for (&dof, &value) in ws.element_global_dofs.iter().zip(ws.element_vector.iter()) {
                output[dof] += value;
            }
        }
        Ok(())
    }
}

/// Gathers the entries of `global` at the given indices into `local`.
///
/// # Panics
///
/// Panics if `local` and `indices` have different lengths, or an index is out of bounds.
pub fn gather_global_to_local<'a>(
    global: impl Into<DVectorView<'a, f64>>,
    local: impl Into<DVectorViewMut<'a, f64>>,
    indices: &[usize],
) {
    let global = global.into();
    let mut local = local.into();
    assert_eq!(local.len(), indices.len(), "Local vector and indices must have the same length");
    for (local_entry, &global_index) in local.iter_mut().zip(indices) {
        *local_entry = global[global_index];
    }
}

/// Imposes Dirichlet conditions on the linear system `matrix * u = rhs`.
///
/// For each flagged DOF `i`, the column of `i` is moved to the right-hand side using the
/// prescribed value `values[i]`, the row and column are zeroed and the diagonal entry is
/// replaced by a representative scale of the matrix. The corresponding entry of `rhs` is set so
/// that the solution attains `values[i]`. The symmetry of the matrix is preserved.
///
/// Entries of `values` at DOFs that are not flagged are ignored.
///
/// # Panics
///
/// Panics if the vectors and flags do not have one entry per row of the matrix, if the matrix
/// is not square, or if a flagged row has no stored diagonal entry.
pub fn apply_dirichlet_bc_csr(
    matrix: &mut CsrMatrix<f64>,
    rhs: &mut DVector<f64>,
    values: &DVector<f64>,
    is_dirichlet: &[bool],
) {
    let n = matrix.nrows();
    assert_eq!(matrix.ncols(), n, "Matrix must be square");
    assert_eq!(rhs.len(), n, "Right-hand side must have one entry per row");
    assert_eq!(values.len(), n, "Prescribed values must have one entry per row");
    assert_eq!(is_dirichlet.len(), n, "Dirichlet flags must have one entry per row");

    // Simply setting 1 on the diagonal would ignore the scaling of the matrix,
    // so take the first non-zero diagonal entry as a representative scale
    let scale = matrix
        .triplet_iter()
        .find(|&(i, j, &v)| i == j && v != 0.0)
        .map(|(_, _, v)| v.abs())
        .unwrap_or(1.0);

    for (i, mut row) in matrix.row_iter_mut().enumerate() {
        let (cols, vals) = row.cols_and_values_mut();
        if is_dirichlet[i] {
            let mut has_diagonal = false;
            for (&j, v) in cols.iter().zip(vals.iter_mut()) {
                if j == i {
                    *v = scale;
                    has_diagonal = true;
                } else {
                    *v = 0.0;
                }
            }
            assert!(has_diagonal, "Dirichlet row {i} has no stored diagonal entry");
            rhs[i] = scale * values[i];
        } else {
            for (&j, v) in cols.iter().zip(vals.iter_mut()) {
                if is_dirichlet[j] {
                    rhs[i] -= *v * values[j];
                    *v = 0.0;
                }
            }
        }
    }
}
