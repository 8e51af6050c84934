//! Quadrature rules for edges, triangles and polygonal cells.
//!
//! Reference rules are taken from `fenris-quadrature` and converted to the unit interval and the
//! unit triangle with vertices `(0, 0)`, `(1, 0)` and `(0, 1)`. All converted rules are
//! *normalized*: their weights sum to one, so that applying a rule to a geometric entity amounts
//! to multiplying by the measure of the entity.
use crate::mesh::PolygonalMesh;
use fenris_quadrature::{polyquad, tensor, univariate};
use itertools::izip;
use log::debug;
use nalgebra::{Point2, Vector2};

/// Errors returned by quadrature methods.
pub use fenris_quadrature::Error as QuadratureError;

/// Weights and points of a rule on `[0, 1]`.
pub type QuadraturePair1d = (Vec<f64>, Vec<f64>);
/// Weights and points of a rule in two dimensions.
pub type QuadraturePair2d = (Vec<f64>, Vec<Point2<f64>>);

/// A quadrature rule consisting of weights and points.
pub trait Quadrature {
    type Point;

    fn weights(&self) -> &[f64];
    fn points(&self) -> &[Self::Point];

    /// Approximates the integral of the given function using this quadrature rule.
    fn integrate(&self, f: impl Fn(&Self::Point) -> f64) -> f64 {
        self.weights()
            .iter()
            .zip(self.points())
            .map(|(w, x)| w * f(x))
            .sum()
    }
}

impl<P> Quadrature for (Vec<f64>, Vec<P>) {
    type Point = P;

    fn weights(&self) -> &[f64] {
        &self.0
    }

    fn points(&self) -> &[P] {
        &self.1
    }
}

/// Supplies reference quadrature rules of a requested polynomial strength.
pub trait QuadratureProvider {
    /// A normalized rule on `[0, 1]`, exact for polynomials of degree up to `strength`.
    fn edge_rule(&self, strength: usize) -> QuadraturePair1d;

    /// A normalized rule on the reference triangle, exact for polynomials of total degree up
    /// to `strength`.
    fn triangle_rule(&self, strength: usize) -> QuadraturePair2d;
}

/// Gauss quadrature on edges and polyquad rules on triangles.
///
/// Triangle strengths beyond the tabulated polyquad rules fall back to [`collapsed_gauss`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GaussQuadrature;

impl QuadratureProvider for GaussQuadrature {
    fn edge_rule(&self, strength: usize) -> QuadraturePair1d {
        gauss_for_degree(strength)
    }

    fn triangle_rule(&self, strength: usize) -> QuadraturePair2d {
        triangle(strength).unwrap_or_else(|err| {
            debug!("No polyquad triangle rule of strength {strength} ({err}), using collapsed Gauss rule.");
            collapsed_gauss(strength)
        })
    }
}

/// Converts a rule on `[-1, 1]` to a normalized rule on `[0, 1]`.
fn convert_quadrature_rule_from_1d_f64(quadrature: fenris_quadrature::Rule<1>) -> QuadraturePair1d {
    let (weights, points) = quadrature;
    let weights = weights.into_iter().map(|w| 0.5 * w).collect();
    let points = points.into_iter().map(|[x]| 0.5 * (x + 1.0)).collect();
    (weights, points)
}

/// Converts a rule on the reference triangle `(-1, -1)`, `(1, -1)`, `(-1, 1)` to a normalized
/// rule on the unit triangle.
fn convert_quadrature_rule_from_2d_f64(quadrature: fenris_quadrature::Rule<2>) -> QuadraturePair2d {
    let (weights, points) = quadrature;
    // The reference triangle has area 2
    let weights = weights.into_iter().map(|w| 0.5 * w).collect();
    let points = points
        .into_iter()
        .map(|[x, y]| Point2::new(0.5 * (x + 1.0), 0.5 * (y + 1.0)))
        .collect();
    (weights, points)
}

/// Gauss rule with the given number of points on `[0, 1]`.
///
/// Given `n` points, the rule integrates polynomials of degree up to `2 n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> QuadraturePair1d {
    convert_quadrature_rule_from_1d_f64(univariate::gauss(num_points))
}

/// The Gauss rule with the fewest points that integrates polynomials of the given degree
/// exactly on `[0, 1]`.
pub fn gauss_for_degree(degree: usize) -> QuadraturePair1d {
    gauss(degree / 2 + 1)
}

/// Polyquad rule on the unit triangle, exact for polynomials of total degree up to `strength`.
pub fn triangle(strength: usize) -> Result<QuadraturePair2d, QuadratureError> {
    polyquad::triangle(strength).map(convert_quadrature_rule_from_2d_f64)
}

/// Collapsed tensor-product Gauss rule on the unit triangle.
///
/// The unit square is mapped onto the triangle by `(s, t) -> (s, (1 - s) t)`. The rule is exact
/// for polynomials of total degree up to `strength` and exists for every strength.
pub fn collapsed_gauss(strength: usize) -> QuadraturePair2d {
    // The Jacobian (1 - s) raises the degree of the integrand in s by one
    let num_points = (strength + 3) / 2;
    let (square_weights, square_points) = tensor::quadrilateral_gauss(num_points);
    izip!(square_weights, square_points)
        .map(|(w, [x, y])| {
            let (s, t) = (0.5 * (x + 1.0), 0.5 * (y + 1.0));
            // w / 4 on the unit square, doubled to normalize by the triangle area
            (0.5 * w * (1.0 - s), Point2::new(s, (1.0 - s) * t))
        })
        .unzip()
}

/// Maps a normalized rule on `[0, 1]` to the segment from `a` to `b`.
///
/// The returned weights sum to the length of the segment.
pub fn segment_quadrature(rule: &QuadraturePair1d, a: &Point2<f64>, b: &Point2<f64>) -> QuadraturePair2d {
    let (weights, points) = rule;
    let length = (b - a).norm();
    izip!(weights, points)
        .map(|(w, t)| (w * length, a + (b - a) * *t))
        .unzip()
}

/// Maps a normalized rule on the reference triangle to the triangle `abc`.
///
/// The returned weights sum to the *signed* area of the triangle.
pub fn triangle_quadrature(rule: &QuadraturePair2d, [a, b, c]: [&Point2<f64>; 3]) -> QuadraturePair2d {
    let (weights, points) = rule;
    let ab: Vector2<f64> = b - a;
    let ac: Vector2<f64> = c - a;
    let signed_area = 0.5 * (ab.x * ac.y - ab.y * ac.x);
    izip!(weights, points)
        .map(|(w, xi)| (w * signed_area, a + ab * xi.x + ac * xi.y))
        .unzip()
}

/// Physical quadrature for a polygonal cell, constructed by fanning the cell into triangles
/// from its barycenter.
///
/// Triangle weights are signed, so the rule integrates exactly with the strength of the
/// triangle rule for any simple polygon, even when some fan triangles are inverted.
pub fn polygon_quadrature<M>(mesh: &M, cell: usize, rule: &QuadraturePair2d) -> QuadraturePair2d
where
    M: ?Sized + PolygonalMesh,
{
    let center = mesh.cell_barycenter(cell);
    let num_edges = mesh.number_of_edges_of_cell(cell);
    let mut weights = Vec::with_capacity(num_edges * rule.0.len());
    let mut points = Vec::with_capacity(num_edges * rule.0.len());
    for local_edge in 0..num_edges {
        let [a, b] = mesh.cell_edge_endpoints(cell, local_edge);
        let (w, x) = triangle_quadrature(rule, [&center, &a, &b]);
        weights.extend(w);
        points.extend(x);
    }
    (weights, points)
}
