use fenris_vem::basis::ScaledMonomialSpace;
use fenris_vem::dof::DofMap;
use fenris_vem::mesh::procedural::{create_unit_square_uniform_octagon_mesh_2d, create_unit_square_uniform_tri_mesh_2d};
use fenris_vem::mesh::{PolygonMesh, PolygonalMesh};
use fenris_vem::quadrature::GaussQuadrature;
use fenris_vem::space::VirtualElementSpace;
use fenris_vem::VemError;
use nalgebra::Point2;

/// A mesh whose edge-to-cell table has been tampered with.
struct TamperedMesh {
    mesh: PolygonMesh,
    edge_to_cell: Vec<[usize; 4]>,
}

impl TamperedMesh {
    fn new(mesh: PolygonMesh, edge: usize, entry: [usize; 4]) -> Self {
        let mut edge_to_cell = mesh.edge_to_cell().to_vec();
        edge_to_cell[edge] = entry;
        Self { mesh, edge_to_cell }
    }
}

impl PolygonalMesh for TamperedMesh {
    fn number_of_cells(&self) -> usize {
        self.mesh.number_of_cells()
    }

    fn number_of_edges(&self) -> usize {
        self.mesh.number_of_edges()
    }

    fn cell_edges(&self, cell: usize) -> &[usize] {
        self.mesh.cell_edges(cell)
    }

    fn edge_to_cell(&self) -> &[[usize; 4]] {
        &self.edge_to_cell
    }

    fn edge_endpoints(&self, edge: usize) -> [Point2<f64>; 2] {
        self.mesh.edge_endpoints(edge)
    }

    fn cell_measure(&self, cell: usize) -> f64 {
        self.mesh.cell_measure(cell)
    }

    fn cell_barycenter(&self, cell: usize) -> Point2<f64> {
        self.mesh.cell_barycenter(cell)
    }
}

#[test]
fn two_triangles_order_2() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    let dof_map = DofMap::new(&mesh, 2).unwrap();
    assert_eq!(dof_map.edge_dofs_per_component(), 2);
    assert_eq!(dof_map.interior_dofs_per_cell(), 0);
    assert_eq!(dof_map.number_of_component_edge_dofs(), 10);
    assert_eq!(dof_map.number_of_global_dofs(), 20);
    assert_eq!(dof_map.number_of_local_dofs_of_cells(), vec![12, 12]);

    assert_eq!(dof_map.cell_edge_dofs(0), [0, 1, 2, 3, 4, 5]);
    assert_eq!(dof_map.cell_edge_dofs(1), [4, 5, 6, 7, 8, 9]);
    assert_eq!(dof_map.cell_to_dof().len(), 2);
    assert_eq!(dof_map.edge_dofs(3), 6..8);
    assert_eq!(dof_map.cell_interior_dofs(1), 20..20);

    assert_eq!(
        dof_map.boundary_dof(),
        [true, true, true, true, false, false, true, true, true, true]
    );
    let flags = dof_map.vector_boundary_dof();
    assert_eq!(flags.len(), 20);
    assert_eq!(&flags[..10], &flags[10..]);
}

#[test]
fn two_triangles_order_3() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    let dof_map = DofMap::new(&mesh, 3).unwrap();
    assert_eq!(dof_map.interior_dofs_per_cell(), 1);
    assert_eq!(dof_map.number_of_global_dofs(), 32);
    assert_eq!(dof_map.number_of_local_dofs(0), 19);

    let expected = [
        6, 7, 8, 9, 10, 11, 12, 13, 14, // x-component
        21, 22, 23, 24, 25, 26, 27, 28, 29, // y-component
        31, // interior
    ];
    assert_eq!(dof_map.cell_global_dofs(1), expected);
    assert_eq!(dof_map.cell_interior_dofs(0), 30..31);

    // Interior DOFs are never boundary DOFs
    let flags = dof_map.vector_boundary_dof();
    assert_eq!(flags.len(), 32);
    assert!(!flags[30] && !flags[31]);
}

#[test]
fn shared_edges_have_identical_dofs_in_both_cells() {
    let mesh = create_unit_square_uniform_octagon_mesh_2d(3);
    let order = 4;
    let dof_map = DofMap::new(&mesh, order).unwrap();
    let edge_to_dof = dof_map.edge_to_dof();
    for (edge, &[c0, c1, l0, l1]) in mesh.edge_to_cell().iter().enumerate() {
        let dofs0 = &dof_map.cell_edge_dofs(c0)[l0 * order..(l0 + 1) * order];
        let dofs1 = &dof_map.cell_edge_dofs(c1)[l1 * order..(l1 + 1) * order];
        assert_eq!(dofs0, dofs1);
        assert_eq!(dofs0, edge_to_dof[edge].clone().collect::<Vec<_>>());
    }
}

#[test]
fn order_below_two_is_rejected() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    for order in [0, 1] {
        assert_eq!(DofMap::new(&mesh, order), Err(VemError::InvalidOrder { order }));
        assert!(matches!(
            VirtualElementSpace::new(&mesh, order),
            Err(VemError::InvalidOrder { .. })
        ));
    }
}

#[test]
fn inconsistent_edge_to_cell_is_rejected() {
    let tampered = [
        // Cell out of range
        [0, 7, 2, 0],
        // Local index out of range
        [0, 1, 2, 5],
        // Cell 1 does not list edge 2 at local index 1
        [0, 1, 2, 1],
        // Boundary entry with different local indices
        [0, 0, 2, 1],
        // Marked as a boundary edge, although cell 1 still lists edge 2 at local index 0
        [0, 0, 2, 2],
        // Same, but only the second side is kept
        [1, 1, 0, 0],
    ];
    for entry in tampered {
        let mesh = TamperedMesh::new(create_unit_square_uniform_tri_mesh_2d(1), 2, entry);
        let result = DofMap::new(&mesh, 2);
        assert!(
            matches!(result, Err(VemError::InvalidTopology { edge: 2, .. })),
            "Entry {entry:?} was not rejected: {result:?}"
        );
        assert!(matches!(
            VirtualElementSpace::with_providers(&mesh, ScaledMonomialSpace::new(&mesh), GaussQuadrature, 2),
            Err(VemError::InvalidTopology { edge: 2, .. })
        ));
    }
}
