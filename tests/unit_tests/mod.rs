mod basis;
mod dof;
mod mesh;
