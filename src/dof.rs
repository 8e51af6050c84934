//! Degree-of-freedom numbering for reduced divergence-free nonconforming spaces.
//!
//! A space of order $p$ carries, for each velocity component, $p$ moments against the edge
//! basis on every edge, plus $(p - 2)(p - 1) / 2$ interior moments per cell when $p > 2$.
//! Global DOFs are laid out as
//!
//! ```text
//! [ x-component edge DOFs | y-component edge DOFs | interior DOFs ]
//!   e * p + n               NE * p + e * p + n      2 * NE * p + K * idof + k
//! ```
//!
//! and the local DOF vector of a cell follows the same block order, with edge DOFs ordered by
//! local edge index.
use crate::basis::lowered_polynomial_dim;
use crate::mesh::PolygonalMesh;
use crate::nested_vec::NestedVec;
use crate::VemError;
use log::debug;
use std::ops::Range;

/// DOF numbering of a reduced divergence-free nonconforming virtual element space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    order: usize,
    num_edges: usize,
    num_cells: usize,
    // Scalar (x-component) edge DOFs of each cell
    cell_to_dof: NestedVec<usize>,
    boundary_edge: Vec<bool>,
}

impl DofMap {
    /// Builds the DOF numbering for the given mesh and order.
    ///
    /// # Errors
    ///
    /// Returns [`VemError::InvalidOrder`] if `order < 2`, and [`VemError::InvalidTopology`] if
    /// the edge-to-cell table of the mesh references out-of-range cells or local edges, is not
    /// consistent with the cell-to-edge lists, or contains a degenerate interior edge.
    pub fn new<M>(mesh: &M, order: usize) -> Result<Self, VemError>
    where
        M: ?Sized + PolygonalMesh,
    {
        if order < 2 {
            return Err(VemError::InvalidOrder { order });
        }
        validate_edge_to_cell(mesh)?;

        let p = order;
        let num_cells = mesh.number_of_cells();
        let num_edges = mesh.number_of_edges();

        let mut offsets = Vec::with_capacity(num_cells + 1);
        offsets.push(0);
        for cell in 0..num_cells {
            offsets.push(offsets[cell] + p * mesh.number_of_edges_of_cell(cell));
        }

        // Each edge writes its DOFs into the slots of both incident cells, so the two
        // sides necessarily agree
        let mut data = vec![usize::MAX; offsets[num_cells]];
        for (edge, &[c0, c1, l0, l1]) in mesh.edge_to_cell().iter().enumerate() {
            for (cell, local) in [(c0, l0), (c1, l1)] {
                let begin = offsets[cell] + local * p;
                for (n, slot) in data[begin..begin + p].iter_mut().enumerate() {
                    *slot = edge * p + n;
                }
            }
        }
        check_all_cell_edges_claimed(mesh, &offsets, &data, p)?;

        let mut cell_to_dof = NestedVec::new();
        for range in offsets.windows(2) {
            cell_to_dof.push(&data[range[0]..range[1]]);
        }

        let dof_map = Self {
            order,
            num_edges,
            num_cells,
            cell_to_dof,
            boundary_edge: mesh.boundary_edge_flag(),
        };
        debug!(
            "Numbered {} global DOFs ({} edges, {} cells, order {}).",
            dof_map.number_of_global_dofs(),
            num_edges,
            num_cells,
            order
        );
        Ok(dof_map)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// The number of DOFs per edge and velocity component, which equals the order $p$.
    pub fn edge_dofs_per_component(&self) -> usize {
        self.order
    }

    /// The number of interior DOFs per cell, $(p - 2)(p - 1) / 2$.
    pub fn interior_dofs_per_cell(&self) -> usize {
        lowered_polynomial_dim(self.order, 3)
    }

    /// The number of edge DOFs of a single velocity component, $NE \cdot p$.
    pub fn number_of_component_edge_dofs(&self) -> usize {
        self.num_edges * self.order
    }

    pub fn number_of_global_dofs(&self) -> usize {
        2 * self.number_of_component_edge_dofs() + self.num_cells * self.interior_dofs_per_cell()
    }

    pub fn number_of_local_dofs(&self, cell: usize) -> usize {
        2 * self.cell_edge_dofs(cell).len() + self.interior_dofs_per_cell()
    }

    /// The number of local DOFs of every cell.
    pub fn number_of_local_dofs_of_cells(&self) -> Vec<usize> {
        (0..self.num_cells)
            .map(|cell| self.number_of_local_dofs(cell))
            .collect()
    }

    /// The x-component edge DOFs of each cell, ordered by local edge index.
    ///
    /// The y-component DOFs are obtained by adding
    /// [`number_of_component_edge_dofs`](Self::number_of_component_edge_dofs).
    pub fn cell_to_dof(&self) -> &NestedVec<usize> {
        &self.cell_to_dof
    }

    /// The x-component edge DOFs of a single cell.
    ///
    /// # Panics
    ///
    /// Panics if the cell index is out of bounds.
    pub fn cell_edge_dofs(&self, cell: usize) -> &[usize] {
        self.cell_to_dof
            .get(cell)
            .unwrap_or_else(|| panic!("Cell index {cell} out of bounds ({} cells).", self.num_cells))
    }

    /// The x-component DOFs of an edge.
    pub fn edge_dofs(&self, edge: usize) -> Range<usize> {
        edge * self.order..(edge + 1) * self.order
    }

    /// The x-component DOFs of every edge.
    pub fn edge_to_dof(&self) -> Vec<Range<usize>> {
        (0..self.num_edges).map(|edge| self.edge_dofs(edge)).collect()
    }

    /// The interior DOFs of a cell. Empty for $p = 2$.
    pub fn cell_interior_dofs(&self, cell: usize) -> Range<usize> {
        let idof = self.interior_dofs_per_cell();
        let begin = 2 * self.number_of_component_edge_dofs() + cell * idof;
        begin..begin + idof
    }

    /// Flags the x-component DOFs that belong to boundary edges.
    pub fn boundary_dof(&self) -> Vec<bool> {
        self.boundary_edge
            .iter()
            .flat_map(|&is_boundary| std::iter::repeat(is_boundary).take(self.order))
            .collect()
    }

    /// Flags all global DOFs (both components) that belong to boundary edges.
    pub fn vector_boundary_dof(&self) -> Vec<bool> {
        let scalar = self.boundary_dof();
        let mut flags = Vec::with_capacity(self.number_of_global_dofs());
        flags.extend_from_slice(&scalar);
        flags.extend_from_slice(&scalar);
        flags.resize(self.number_of_global_dofs(), false);
        flags
    }

    /// Writes the global indices of all local DOFs of the cell into `output`.
    ///
    /// # Panics
    ///
    /// Panics if `output.len() != self.number_of_local_dofs(cell)`.
    pub fn populate_cell_global_dofs(&self, cell: usize, output: &mut [usize]) {
        assert_eq!(output.len(), self.number_of_local_dofs(cell), "Output has wrong length");
        let edge_dofs = self.cell_edge_dofs(cell);
        let n = edge_dofs.len();
        let shift = self.number_of_component_edge_dofs();
        output[..n].copy_from_slice(edge_dofs);
        for (out, dof) in output[n..2 * n].iter_mut().zip(edge_dofs) {
            *out = dof + shift;
        }
        for (out, dof) in output[2 * n..].iter_mut().zip(self.cell_interior_dofs(cell)) {
            *out = dof;
        }
    }

    pub fn cell_global_dofs(&self, cell: usize) -> Vec<usize> {
        let mut dofs = vec![0; self.number_of_local_dofs(cell)];
        self.populate_cell_global_dofs(cell, &mut dofs);
        dofs
    }
}

fn validate_edge_to_cell<M>(mesh: &M) -> Result<(), VemError>
where
    M: ?Sized + PolygonalMesh,
{
    let num_cells = mesh.number_of_cells();
    let invalid = |edge, reason: String| Err(VemError::InvalidTopology { edge, reason });

    for (edge, &[c0, c1, l0, l1]) in mesh.edge_to_cell().iter().enumerate() {
        for (cell, local) in [(c0, l0), (c1, l1)] {
            if cell >= num_cells {
                return invalid(edge, format!("cell index {cell} out of range ({num_cells} cells)"));
            }
            let cell_edges = mesh.cell_edges(cell);
            if local >= cell_edges.len() {
                return invalid(
                    edge,
                    format!("local index {local} out of range for cell {cell} with {} edges", cell_edges.len()),
                );
            }
            if cell_edges[local] != edge {
                return invalid(
                    edge,
                    format!("cell {cell} lists edge {} at local index {local}", cell_edges[local]),
                );
            }
        }
        if c0 == c1 && l0 != l1 {
            return invalid(edge, format!("both sides refer to cell {c0} with different local indices"));
        }
    }
    Ok(())
}

/// Every local edge of every cell must be claimed by the edge-to-cell entry of the edge the cell
/// lists there.
fn check_all_cell_edges_claimed<M>(mesh: &M, offsets: &[usize], data: &[usize], p: usize) -> Result<(), VemError>
where
    M: ?Sized + PolygonalMesh,
{
    for (cell, range) in offsets.windows(2).enumerate() {
        let cell_edges = mesh.cell_edges(cell);
        let unclaimed = data[range[0]..range[1]]
            .chunks(p)
            .position(|dofs| dofs.contains(&usize::MAX));
        if let Some(local) = unclaimed {
            return Err(VemError::InvalidTopology {
                edge: cell_edges[local],
                reason: format!(
                    "cell {cell} lists the edge at local index {local}, but the edge-to-cell entry \
                     does not refer back to it"
                ),
            });
        }
    }
    Ok(())
}
