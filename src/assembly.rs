//! Assembly of global matrices and vectors from per-cell contributions.
//!
//! Element assemblers in [`local`] describe the connectivity and local matrices or vectors of
//! each cell, and the assemblers in [`global`] scatter them into global data structures.
pub mod global;
pub mod local;
