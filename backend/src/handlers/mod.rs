//! HTTP request handlers

pub mod catalog;
pub mod formulation;
pub mod health;
pub mod ingredient_batch;
pub mod inventory;
pub mod production;
pub mod recipe;
pub mod reporting;
pub mod traceability;

pub use catalog::*;
pub use formulation::*;
pub use health::*;
pub use ingredient_batch::*;
pub use inventory::*;
pub use production::*;
pub use recipe::*;
pub use reporting::*;
pub use traceability::*;
