//! Polygonal meshes and the topological queries needed by virtual element spaces.
use crate::nested_vec::NestedVec;
use nalgebra::{Point2, Vector2};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub mod procedural;

/// Topological and geometric queries on a two-dimensional polygonal mesh.
///
/// Cells are simple polygons whose boundary is traversed counter-clockwise. Each edge
/// has a fixed global orientation and an entry `[cell0, cell1, local0, local1]` in the
/// edge-to-cell table, where `cell0` is the cell for which the edge orientation agrees with the
/// counter-clockwise traversal and `local0`/`local1` are the local indices of the edge in the
/// respective cells. Boundary edges have `cell0 == cell1` and `local0 == local1`.
pub trait PolygonalMesh {
    fn number_of_cells(&self) -> usize;

    fn number_of_edges(&self) -> usize;

    /// The global edges of the given cell, ordered by local edge index.
    fn cell_edges(&self, cell: usize) -> &[usize];

    fn edge_to_cell(&self) -> &[[usize; 4]];

    /// The endpoints of the edge, ordered according to the global edge orientation.
    fn edge_endpoints(&self, edge: usize) -> [Point2<f64>; 2];

    fn cell_measure(&self, cell: usize) -> f64;

    /// The area centroid of the cell.
    fn cell_barycenter(&self, cell: usize) -> Point2<f64>;

    /// The characteristic size of the cell, used to scale monomials.
    fn cell_size(&self, cell: usize) -> f64 {
        self.cell_measure(cell).sqrt()
    }

    fn number_of_edges_of_cell(&self, cell: usize) -> usize {
        self.cell_edges(cell).len()
    }

    fn number_of_edges_of_cells(&self) -> Vec<usize> {
        (0..self.number_of_cells())
            .map(|cell| self.number_of_edges_of_cell(cell))
            .collect()
    }

    fn edge_length(&self, edge: usize) -> f64 {
        let [a, b] = self.edge_endpoints(edge);
        (b - a).norm()
    }

    fn edge_barycenter(&self, edge: usize) -> Point2<f64> {
        let [a, b] = self.edge_endpoints(edge);
        nalgebra::center(&a, &b)
    }

    fn edge_unit_tangent(&self, edge: usize) -> Vector2<f64> {
        let [a, b] = self.edge_endpoints(edge);
        (b - a).normalize()
    }

    /// The unit normal of the edge, pointing out of `cell0`.
    fn edge_unit_normal(&self, edge: usize) -> Vector2<f64> {
        let t = self.edge_unit_tangent(edge);
        Vector2::new(t.y, -t.x)
    }

    fn is_boundary_edge(&self, edge: usize) -> bool {
        let [c0, c1, _, _] = self.edge_to_cell()[edge];
        c0 == c1
    }

    fn boundary_edge_flag(&self) -> Vec<bool> {
        self.edge_to_cell()
            .iter()
            .map(|&[c0, c1, _, _]| c0 == c1)
            .collect()
    }

    /// Returns `1.0` if the global orientation of the local edge agrees with the
    /// counter-clockwise traversal of the cell, and `-1.0` otherwise.
    ///
    /// Multiplying the global edge normal by this sign gives the outward normal of the cell.
    fn cell_edge_sign(&self, cell: usize, local_edge: usize) -> f64 {
        let edge = self.cell_edges(cell)[local_edge];
        let [c0, _, l0, _] = self.edge_to_cell()[edge];
        if c0 == cell && l0 == local_edge {
            1.0
        } else {
            -1.0
        }
    }

    /// The endpoints of a local edge of the cell, ordered along the counter-clockwise
    /// traversal of the cell boundary.
    fn cell_edge_endpoints(&self, cell: usize, local_edge: usize) -> [Point2<f64>; 2] {
        let edge = self.cell_edges(cell)[local_edge];
        let [a, b] = self.edge_endpoints(edge);
        if self.cell_edge_sign(cell, local_edge) > 0.0 {
            [a, b]
        } else {
            [b, a]
        }
    }
}

/// A two-dimensional mesh of simple polygons.
///
/// Edges, the edge-to-cell table and cell geometry are derived on construction. Edges are
/// numbered in order of first appearance when sweeping the cells in index order, and take
/// the orientation of the first cell that contains them. Consequently `cell0 < cell1` holds
/// for every interior edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonMesh {
    vertices: Vec<Point2<f64>>,
    cells: NestedVec<usize>,
    edges: Vec<[usize; 2]>,
    edge_to_cell: Vec<[usize; 4]>,
    cell_to_edge: NestedVec<usize>,
    cell_areas: Vec<f64>,
    cell_centroids: Vec<Point2<f64>>,
}

impl PolygonMesh {
    /// Constructs a polygon mesh from vertices and counter-clockwise cell vertex loops.
    ///
    /// # Panics
    ///
    /// Panics if a cell has fewer than three vertices, references a vertex out of bounds,
    /// has non-positive signed area, if an edge is shared by more than two cells, or if two
    /// cells traverse a shared edge in the same direction.
    pub fn from_vertices_and_cells(vertices: Vec<Point2<f64>>, cells: NestedVec<usize>) -> Self {
        let mut edges: Vec<[usize; 2]> = Vec::new();
        let mut edge_to_cell: Vec<[usize; 4]> = Vec::new();
        let mut cell_to_edge = NestedVec::new();
        let mut edge_lookup: FxHashMap<[usize; 2], usize> = FxHashMap::default();

        for (cell_idx, cell) in cells.iter().enumerate() {
            assert!(
                cell.len() >= 3,
                "Cell {cell_idx} has {} vertices, but a polygon needs at least three.",
                cell.len()
            );
            for &v in cell {
                assert!(
                    v < vertices.len(),
                    "Cell {cell_idx} references vertex {v}, but there are only {} vertices.",
                    vertices.len()
                );
            }

            let mut appender = cell_to_edge.begin_array();
            for local in 0..cell.len() {
                let a = cell[local];
                let b = cell[(local + 1) % cell.len()];
                assert_ne!(a, b, "Cell {cell_idx} has a degenerate edge at local index {local}.");
                let key = if a < b { [a, b] } else { [b, a] };

                let edge_idx = if let Some(&edge_idx) = edge_lookup.get(&key) {
                    let entry = &mut edge_to_cell[edge_idx];
                    assert_ne!(entry[0], cell_idx, "Cell {cell_idx} contains edge ({a}, {b}) more than once.");
                    assert!(
                        entry[0] == entry[1] && entry[2] == entry[3],
                        "Edge ({a}, {b}) is shared by more than two cells (found again in cell {cell_idx})."
                    );
                    assert_eq!(
                        edges[edge_idx],
                        [b, a],
                        "Cells {} and {cell_idx} traverse edge ({a}, {b}) in the same direction.",
                        entry[0]
                    );
                    entry[1] = cell_idx;
                    entry[3] = local;
                    edge_idx
                } else {
                    edges.push([a, b]);
                    edge_to_cell.push([cell_idx, cell_idx, local, local]);
                    edge_lookup.insert(key, edges.len() - 1);
                    edges.len() - 1
                };
                appender.push_single(edge_idx);
            }
        }

        let (cell_areas, cell_centroids): (Vec<f64>, Vec<Point2<f64>>) = cells
            .iter()
            .enumerate()
            .map(|(cell_idx, cell)| {
                let (area, centroid) = compute_polygon_area_and_centroid(&vertices, cell);
                assert!(
                    area > 0.0,
                    "Cell {cell_idx} has non-positive signed area {area}. \
                     Cells must be simple and counter-clockwise."
                );
                (area, centroid)
            })
            .unzip();

        Self {
            vertices,
            cells,
            edges,
            edge_to_cell,
            cell_to_edge,
            cell_areas,
            cell_centroids,
        }
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn cells(&self) -> &NestedVec<usize> {
        &self.cells
    }

    /// Vertex index pairs of all edges, ordered according to the global edge orientation.
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    pub fn cell_to_edge(&self) -> &NestedVec<usize> {
        &self.cell_to_edge
    }

    /// Indices of all edges on the boundary of the mesh.
    pub fn find_boundary_edges(&self) -> Vec<usize> {
        self.edge_to_cell
            .iter()
            .enumerate()
            .filter(|(_, &[c0, c1, _, _])| c0 == c1)
            .map(|(edge_idx, _)| edge_idx)
            .collect()
    }
}

impl PolygonalMesh for PolygonMesh {
    fn number_of_cells(&self) -> usize {
        self.cells.len()
    }

    fn number_of_edges(&self) -> usize {
        self.edges.len()
    }

    fn cell_edges(&self, cell: usize) -> &[usize] {
        self.cell_to_edge
            .get(cell)
            .unwrap_or_else(|| panic!("Cell index {cell} out of bounds ({} cells).", self.number_of_cells()))
    }

    fn edge_to_cell(&self) -> &[[usize; 4]] {
        &self.edge_to_cell
    }

    fn edge_endpoints(&self, edge: usize) -> [Point2<f64>; 2] {
        let [a, b] = self.edges[edge];
        [self.vertices[a], self.vertices[b]]
    }

    fn cell_measure(&self, cell: usize) -> f64 {
        self.cell_areas[cell]
    }

    fn cell_barycenter(&self, cell: usize) -> Point2<f64> {
        self.cell_centroids[cell]
    }
}

/// Signed area and area centroid of the polygon given by the vertex loop.
fn compute_polygon_area_and_centroid(vertices: &[Point2<f64>], polygon: &[usize]) -> (f64, Point2<f64>) {
    // Shift coordinates to the first vertex to reduce cancellation for small polygons far
    // away from the origin
    let origin = vertices[polygon[0]];
    let mut twice_area = 0.0;
    let mut weighted_sum = Vector2::zeros();
    for i in 0..polygon.len() {
        let a = vertices[polygon[i]] - origin;
        let b = vertices[polygon[(i + 1) % polygon.len()]] - origin;
        let cross = a.x * b.y - a.y * b.x;
        twice_area += cross;
        weighted_sum += (a + b) * cross;
    }
    let area = 0.5 * twice_area;
    let centroid = origin + weighted_sum / (3.0 * twice_area);
    (area, centroid)
}
