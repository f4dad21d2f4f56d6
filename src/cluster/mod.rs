//! Recursive bipartitioning of cells into genotype subpopulations.

mod divide;
mod em;
mod spectral;

pub use divide::{divide, DivideContext};
pub use em::expectation_maximization;
pub use spectral::{spectral_bipartition, Partition};
