//! Shared domain types and the lot allocation engine for Batchtrace
//!
//! Everything in this crate is pure: no I/O and no clock access. The backend
//! loads a snapshot, runs the engine here, and persists the outcome inside a
//! single transaction. The WASM crate reuses the same code for client-side
//! previews.

pub mod allocation;
pub mod compatibility;
pub mod flatten;
pub mod models;
pub mod production;
pub mod types;
pub mod validation;

pub use allocation::*;
pub use compatibility::*;
pub use flatten::*;
pub use models::*;
pub use production::*;
pub use types::*;
pub use validation::*;
