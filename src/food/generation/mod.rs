//! Recipe generation: prompt the model, pull a recipe out of its reply,
//! estimate calories when the model left them out, and fill defaults.

pub mod assembler;
pub mod error;
pub mod estimator;
pub mod extractor;
pub mod prompt;

pub use assembler::{AssembledRecipe, GenerationRequest, RecipeAssembler, RecipeDraft};
pub use error::{
    ExtractionError, GenerationCause, GenerationError, GenerationErrorKind, GenerationStage,
    TransportError, ValidationError,
};
pub use estimator::{CalorieEstimate, CalorieEstimator};
pub use extractor::{extract_recipe, ParsedRecipe};
