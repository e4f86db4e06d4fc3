pub mod spoonacular;

// Re-export common types
pub use spoonacular::{IngredientMatch, SpoonacularClient, SpoonacularError};
