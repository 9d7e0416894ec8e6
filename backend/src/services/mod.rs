//! Business logic services for Batchtrace

pub mod catalog;
pub mod db;
pub mod formulation;
pub mod ingredient_batch;
pub mod inventory;
pub mod production;
pub mod recipe;
pub mod reporting;
pub mod traceability;

pub use catalog::CatalogService;
pub use formulation::FormulationService;
pub use ingredient_batch::IngredientBatchService;
pub use inventory::InventoryService;
pub use production::ProductionService;
pub use recipe::RecipeService;
pub use reporting::ReportingService;
pub use traceability::TraceabilityService;
