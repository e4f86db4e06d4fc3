use std::fmt;
use thiserror::Error;

pub use crate::providers::traits::TransportError;

/// Caller-supplied input the pipeline refuses before talking to the model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("At least one ingredient is required")]
    NoIngredients,
    #[error("Ingredient {0} is blank")]
    BlankIngredient(usize),
}

/// The model's reply could not be turned into a recipe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no JSON object found")]
    NoJsonObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field {field} must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Where a generation call was when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Building,
    AwaitingCompletion,
    Extracting,
    EstimatingCalories,
    Assembled,
    Failed,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStage::Building => "building",
            GenerationStage::AwaitingCompletion => "awaiting completion",
            GenerationStage::Extracting => "extracting",
            GenerationStage::EstimatingCalories => "estimating calories",
            GenerationStage::Assembled => "assembled",
            GenerationStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum GenerationCause {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    Validation,
    Extraction,
    Transport,
}

/// The only error that leaves the generation pipeline.
#[derive(Error, Debug)]
#[error("Failed to generate recipe while {stage}: {cause}")]
pub struct GenerationError {
    pub stage: GenerationStage,
    #[source]
    pub cause: GenerationCause,
}

impl GenerationError {
    pub fn new(stage: GenerationStage, cause: impl Into<GenerationCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> GenerationErrorKind {
        match self.cause {
            GenerationCause::Validation(_) => GenerationErrorKind::Validation,
            GenerationCause::Extraction(_) => GenerationErrorKind::Extraction,
            GenerationCause::Transport(_) => GenerationErrorKind::Transport,
        }
    }

    /// Message for end users. Never carries model text, response bodies or
    /// credentials.
    pub fn public_message(&self) -> String {
        match &self.cause {
            GenerationCause::Validation(e) => e.to_string(),
            GenerationCause::Extraction(e) => format!("Failed to generate recipe: {}", e),
            GenerationCause::Transport(e) => {
                format!("Failed to generate recipe: completion service {}", e.kind())
            }
        }
    }
}

impl From<ValidationError> for GenerationError {
    fn from(err: ValidationError) -> Self {
        GenerationError::new(GenerationStage::Building, err)
    }
}
