pub mod database;

pub use database::Database;
pub use database::DatabaseError;
pub use database::{RecipePage, RecipeQuery, StoredRecipe};
