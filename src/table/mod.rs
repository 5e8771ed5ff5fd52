//! Grid and table types shared by the loader, the pipeline and the collaborators.

pub mod clean;
pub mod column;
pub mod grid;
