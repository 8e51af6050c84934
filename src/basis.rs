//! Scaled monomial bases on polygonal cells and polynomial bases on edges.
//!
//! The scaled monomials of a cell $K$ with barycenter $x_K$ and size $h_K$ are
//! $m_\alpha(x) = ((x - x_K) / h_K)^\alpha$, ordered by total degree and, within a degree, by
//! descending $x$-exponent: $1, x, y, x^2, xy, y^2, \dots$.
//!
//! The basis of an edge $e$ with midpoint $x_e$, unit tangent $t_e$ and length $|e|$ is
//! $\phi_n(x) = ((x - x_e) \cdot t_e / |e|)^n$. The tangent is the global edge tangent, so both
//! cells sharing an edge see the same edge basis.
use crate::mesh::PolygonalMesh;
use crate::quadrature::{gauss_for_degree, segment_quadrature, Quadrature};
use nalgebra::{DMatrix, Point2};

/// The dimension of the space of bivariate polynomials of total degree at most `degree`.
pub const fn polynomial_dim(degree: usize) -> usize {
    (degree + 1) * (degree + 2) / 2
}

/// The dimension of polynomials of total degree at most `degree - k`, or zero if `k > degree`.
pub const fn lowered_polynomial_dim(degree: usize, k: usize) -> usize {
    if k > degree {
        0
    } else {
        polynomial_dim(degree - k)
    }
}

/// The index of the monomial $x^a y^b$ in the ordering of scaled monomials.
pub const fn monomial_index(a: usize, b: usize) -> usize {
    let d = a + b;
    d * (d + 1) / 2 + b
}

/// The exponents `(a, b)` of the monomial $x^a y^b$ with the given index.
pub fn monomial_exponents(index: usize) -> (usize, usize) {
    let d = monomial_degree(index);
    let b = index - d * (d + 1) / 2;
    (d - b, b)
}

/// The total degree of the monomial with the given index.
pub fn monomial_degree(index: usize) -> usize {
    let mut d = 0;
    while polynomial_dim(d) <= index {
        d += 1;
    }
    d
}

/// Maps each monomial $m_k$ of degree at most `degree - 1` to the monomials of degree at most
/// `degree` whose first derivatives are multiples of it.
///
/// For $m_k = x^a y^b$, `x[k] = (i, a + 1)` with $m_i = x^{a+1} y^b$, so that
/// $\partial_x m_i = (a + 1) / h \, m_k$ for scaled monomials. Likewise `y[k] = (j, b + 1)` with
/// $m_j = x^a y^{b+1}$.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstDerivativeMap {
    pub x: Vec<(usize, f64)>,
    pub y: Vec<(usize, f64)>,
}

/// Maps each monomial $m_k$ of degree at most `degree - 2` to the monomials of degree at most
/// `degree` whose second derivatives are multiples of it.
///
/// For $m_k = x^a y^b$: `xx[k]` refers to $x^{a+2} y^b$ with coefficient $(a+2)(a+1)$,
/// `yy[k]` to $x^a y^{b+2}$ with coefficient $(b+2)(b+1)$ and `xy[k]` to $x^{a+1} y^{b+1}$
/// with coefficient $(a+1)(b+1)$.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondDerivativeMap {
    pub xx: Vec<(usize, f64)>,
    pub yy: Vec<(usize, f64)>,
    pub xy: Vec<(usize, f64)>,
}

pub fn first_derivative_map(degree: usize) -> FirstDerivativeMap {
    let n = lowered_polynomial_dim(degree, 1);
    let (x, y): (Vec<_>, Vec<_>) = (0..n)
        .map(|k| {
            let (a, b) = monomial_exponents(k);
            let x_parent = (monomial_index(a + 1, b), (a + 1) as f64);
            let y_parent = (monomial_index(a, b + 1), (b + 1) as f64);
            (x_parent, y_parent)
        })
        .unzip();
    FirstDerivativeMap { x, y }
}

pub fn second_derivative_map(degree: usize) -> SecondDerivativeMap {
    let n = lowered_polynomial_dim(degree, 2);
    let mut map = SecondDerivativeMap {
        xx: Vec::with_capacity(n),
        yy: Vec::with_capacity(n),
        xy: Vec::with_capacity(n),
    };
    for k in 0..n {
        let (a, b) = monomial_exponents(k);
        let (af, bf) = (a as f64, b as f64);
        map.xx
            .push((monomial_index(a + 2, b), (af + 2.0) * (af + 1.0)));
        map.yy
            .push((monomial_index(a, b + 2), (bf + 2.0) * (bf + 1.0)));
        map.xy
            .push((monomial_index(a + 1, b + 1), (af + 1.0) * (bf + 1.0)));
    }
    map
}

/// Polynomial bases on the cells and edges of a polygonal mesh.
pub trait MonomialBasis {
    /// The center $x_K$ of the scaled monomials of the cell.
    fn cell_center(&self, cell: usize) -> Point2<f64>;

    /// The scaling $h_K$ of the scaled monomials of the cell.
    fn cell_scale(&self, cell: usize) -> f64;

    /// Evaluates all cell monomials of total degree at most `degree` at `x`.
    ///
    /// # Panics
    ///
    /// Panics if `output.len() != polynomial_dim(degree)`.
    fn populate_cell_basis(&self, cell: usize, degree: usize, x: &Point2<f64>, output: &mut [f64]);

    /// Evaluates the edge basis functions $\phi_0, \dots, \phi_{degree}$ at `x`.
    ///
    /// # Panics
    ///
    /// Panics if `output.len() != degree + 1`.
    fn populate_edge_basis(&self, edge: usize, degree: usize, x: &Point2<f64>, output: &mut [f64]);

    /// The matrix $\int_K m_i m_j$ for monomials of total degree at most `degree`.
    fn cell_mass_matrix(&self, cell: usize, degree: usize) -> DMatrix<f64>;

    /// The matrix $\int_e \phi_a \phi_b$ for edge basis functions of degree at most `degree`.
    fn edge_mass_matrix(&self, edge: usize, degree: usize) -> DMatrix<f64>;
}

/// Scaled monomials with respect to the cell barycenters and sizes of a mesh.
#[derive(Debug)]
pub struct ScaledMonomialSpace<'a, M: ?Sized> {
    mesh: &'a M,
}

impl<'a, M: ?Sized> Clone for ScaledMonomialSpace<'a, M> {
    fn clone(&self) -> Self {
        Self { mesh: self.mesh }
    }
}

impl<'a, M> ScaledMonomialSpace<'a, M>
where
    M: ?Sized + PolygonalMesh,
{
    pub fn new(mesh: &'a M) -> Self {
        Self { mesh }
    }

    pub fn mesh(&self) -> &'a M {
        self.mesh
    }

    /// Integrals $\int_K m_\alpha$ of all monomials of total degree at most `degree`.
    ///
    /// Every scaled monomial is homogeneous in $x - x_K$, so that
    /// $\int_K m_\alpha = \frac{1}{|\alpha| + 2} \int_{\partial K} m_\alpha (x - x_K) \cdot n$
    /// by the divergence theorem. Since $(x - x_K) \cdot n$ is constant along each edge, the
    /// integrals are exact for any simple polygon.
    pub fn cell_monomial_integrals(&self, cell: usize, degree: usize) -> Vec<f64> {
        let n = polynomial_dim(degree);
        let center = self.cell_center(cell);
        let rule = gauss_for_degree(degree);
        let mut integrals = vec![0.0; n];
        let mut m = vec![0.0; n];

        for local_edge in 0..self.mesh.number_of_edges_of_cell(cell) {
            let [a, b] = self.mesh.cell_edge_endpoints(cell, local_edge);
            let tangent = (b - a).normalize();
            let outward_normal = nalgebra::Vector2::new(tangent.y, -tangent.x);
            let offset = (a - center).dot(&outward_normal);

            let edge_quadrature = segment_quadrature(&rule, &a, &b);
            for (w, x) in edge_quadrature.weights().iter().zip(edge_quadrature.points()) {
                self.populate_cell_basis(cell, degree, x, &mut m);
                for (integral, m_i) in integrals.iter_mut().zip(&m) {
                    *integral += w * offset * m_i;
                }
            }
        }

        for (i, integral) in integrals.iter_mut().enumerate() {
            *integral /= (monomial_degree(i) + 2) as f64;
        }
        integrals
    }
}

impl<'a, M> MonomialBasis for ScaledMonomialSpace<'a, M>
where
    M: ?Sized + PolygonalMesh,
{
    fn cell_center(&self, cell: usize) -> Point2<f64> {
        self.mesh.cell_barycenter(cell)
    }

    fn cell_scale(&self, cell: usize) -> f64 {
        self.mesh.cell_size(cell)
    }

    fn populate_cell_basis(&self, cell: usize, degree: usize, x: &Point2<f64>, output: &mut [f64]) {
        assert_eq!(output.len(), polynomial_dim(degree), "Output buffer has wrong length");
        let h = self.cell_scale(cell);
        let xi = (x - self.cell_center(cell)) / h;
        output[0] = 1.0;
        // Each monomial of degree d is obtained from one of degree d - 1 by multiplying with
        // x (all but the last) or y (the last)
        for d in 1..=degree {
            let begin = polynomial_dim(d - 1);
            let prev_begin = begin - d;
            for b in 0..d {
                output[begin + b] = output[prev_begin + b] * xi.x;
            }
            output[begin + d] = output[prev_begin + d - 1] * xi.y;
        }
    }

    fn populate_edge_basis(&self, edge: usize, degree: usize, x: &Point2<f64>, output: &mut [f64]) {
        assert_eq!(output.len(), degree + 1, "Output buffer has wrong length");
        let t = (x - self.mesh.edge_barycenter(edge)).dot(&self.mesh.edge_unit_tangent(edge))
            / self.mesh.edge_length(edge);
        output[0] = 1.0;
        for n in 1..=degree {
            output[n] = output[n - 1] * t;
        }
    }

    fn cell_mass_matrix(&self, cell: usize, degree: usize) -> DMatrix<f64> {
        let integrals = self.cell_monomial_integrals(cell, 2 * degree);
        let n = polynomial_dim(degree);
        DMatrix::from_fn(n, n, |i, j| {
            let (a_i, b_i) = monomial_exponents(i);
            let (a_j, b_j) = monomial_exponents(j);
            integrals[monomial_index(a_i + a_j, b_i + b_j)]
        })
    }

    fn edge_mass_matrix(&self, edge: usize, degree: usize) -> DMatrix<f64> {
        let length = self.mesh.edge_length(edge);
        // int_{-1/2}^{1/2} s^k ds vanishes for odd k
        DMatrix::from_fn(degree + 1, degree + 1, |a, b| {
            let k = a + b;
            if k % 2 == 1 {
                0.0
            } else {
                length * 0.5f64.powi(k as i32) / (k + 1) as f64
            }
        })
    }
}
