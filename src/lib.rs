//! Reduced divergence-free nonconforming virtual element spaces on polygonal meshes.
//!
//! The central type is [`VirtualElementSpace`](crate::space::VirtualElementSpace), which
//! precomputes all per-cell projector data for a vector-valued space of order $p \geq 2$
//! and assembles global sparse operators from it.
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

pub mod assembly;
pub mod basis;
pub mod dof;
pub mod error;
pub mod mesh;
pub mod quadrature;
pub mod space;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate fenris_nested_vec as nested_vec;
pub extern crate nalgebra_sparse;

/// Errors that can occur while building or using a virtual element space.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum VemError {
    /// The requested polynomial order is not supported.
    InvalidOrder { order: usize },
    /// The edge-to-cell connectivity of the mesh is inconsistent.
    InvalidTopology { edge: usize, reason: String },
    /// A per-cell dense system could not be solved.
    SingularCellSystem { cell: usize },
    /// A global vector has an unexpected length.
    DimensionMismatch { expected: usize, actual: usize },
}

impl Display for VemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOrder { order } => {
                write!(f, "polynomial order must be at least 2, but got {order}")
            }
            Self::InvalidTopology { edge, reason } => {
                write!(f, "invalid topology at edge {edge}: {reason}")
            }
            Self::SingularCellSystem { cell } => {
                write!(f, "local system of cell {cell} is singular or ill-conditioned")
            }
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "expected vector of length {expected}, but got length {actual}")
            }
        }
    }
}

impl Error for VemError {}
