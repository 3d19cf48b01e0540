//! Spectral indices
//!
//! Named indices chosen by band role, plus generic ratio and normalized
//! difference entries for every other band pair.

pub mod registry;
pub mod calculator;

pub use registry::{registry, IndexCategory, IndexDefinition, IndexFormula};
pub use calculator::{ComputedIndex, FormulaKind, IndexPlan};
