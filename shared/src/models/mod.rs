//! Domain models for Batchtrace

mod catalog;
mod formulation;
mod inventory;
mod lot;
mod recipe;

pub use catalog::*;
pub use formulation::*;
pub use inventory::*;
pub use lot::*;
pub use recipe::*;
