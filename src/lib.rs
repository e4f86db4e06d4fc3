pub mod api;
pub mod commands;
pub mod config;
pub mod database;
pub mod food;
pub mod providers;

// Re-export commonly used items
pub use config::{AppConfig, GenerationSettings};
pub use database::Database;
pub use food::generation::{AssembledRecipe, GenerationError, GenerationRequest, RecipeAssembler};
pub use providers::{CompletionClient, CompletionRequest, TransportError};
