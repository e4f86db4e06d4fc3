use crate::config::GenerationSettings;
use crate::providers::traits::{CompletionClient, CompletionRequest};
use super::error::{GenerationCause, GenerationError, GenerationStage, ValidationError};
use super::estimator::CalorieEstimator;
use super::extractor::{extract_recipe, ParsedRecipe};
use super::prompt::{build_generation_prompt, CHEF_ROLE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ingredients and an optional dietary preference, checked once up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    ingredients: Vec<String>,
    preferences: Option<String>,
}

impl GenerationRequest {
    pub fn new(ingredients: Vec<String>, preferences: Option<String>) -> Result<Self, ValidationError> {
        if ingredients.is_empty() {
            return Err(ValidationError::NoIngredients);
        }

        let ingredients = ingredients
            .into_iter()
            .enumerate()
            .map(|(index, ingredient)| {
                let trimmed = ingredient.trim();
                if trimmed.is_empty() {
                    Err(ValidationError::BlankIngredient(index))
                } else {
                    Ok(trimmed.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let preferences = preferences
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Ok(Self { ingredients, preferences })
    }

    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    pub fn preferences(&self) -> Option<&str> {
        self.preferences.as_deref()
    }
}

/// A generated recipe with every default filled in, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledRecipe {
    pub name: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub estimated_calories: f64,
    pub estimated_time: String,
    pub servings: u32,
    pub image: String,
    #[serde(rename = "ai_generated")]
    pub ai_generated: bool,
    pub diets: Vec<String>,
}

impl AssembledRecipe {
    pub fn from_parsed(
        parsed: ParsedRecipe,
        estimated_calories: f64,
        preferences: Option<&str>,
        settings: &GenerationSettings,
    ) -> Self {
        let minutes = parsed
            .estimated_time_minutes
            .unwrap_or(settings.default_time_minutes);
        let image = image_url(&settings.image_template, &parsed.name);

        Self {
            name: parsed.name,
            ingredients: parsed.ingredients,
            instructions: parsed.instructions,
            estimated_calories,
            estimated_time: format!("{} mins", minutes),
            servings: parsed.servings.unwrap_or(settings.default_servings),
            image,
            ai_generated: true,
            diets: preferences.map(|p| vec![p.to_string()]).unwrap_or_default(),
        }
    }
}

/// A recipe as a user wrote it; everything past the first three fields is
/// optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeDraft {
    pub name: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub estimated_calories: Option<f64>,
    pub estimated_time: Option<String>,
    pub servings: Option<u32>,
    pub image: Option<String>,
    pub diets: Vec<String>,
}

/// Placeholder picture URL keyed on the recipe name, words joined by `+`.
pub fn image_url(template: &str, recipe_name: &str) -> String {
    let query = recipe_name
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("+");
    template.replace("{query}", &query)
}

/// Tracks one call through its stages; terminal on the first failure.
struct GenerationRun {
    stage: GenerationStage,
}

impl GenerationRun {
    fn start() -> Self {
        Self {
            stage: GenerationStage::Building,
        }
    }

    fn enter(&mut self, next: GenerationStage) {
        log::debug!("Recipe generation: {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, cause: impl Into<GenerationCause>) -> GenerationError {
        let failed_at = self.stage;
        self.enter(GenerationStage::Failed);
        GenerationError::new(failed_at, cause)
    }
}

pub struct RecipeAssembler {
    client: Arc<dyn CompletionClient>,
    estimator: CalorieEstimator,
    settings: GenerationSettings,
}

impl RecipeAssembler {
    pub fn new(client: Arc<dyn CompletionClient>, settings: GenerationSettings) -> Self {
        let estimator = CalorieEstimator::new(client.clone(), &settings);
        Self {
            client,
            estimator,
            settings,
        }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Builds a user-written record with the same defaults generation uses.
    /// No model call is made.
    pub fn author(&self, draft: RecipeDraft) -> AssembledRecipe {
        let image = draft
            .image
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| image_url(&self.settings.image_template, draft.name.trim()));

        AssembledRecipe {
            name: draft.name.trim().to_string(),
            ingredients: draft.ingredients.iter().map(|i| i.trim().to_string()).collect(),
            instructions: draft.instructions,
            estimated_calories: draft.estimated_calories.unwrap_or(0.0),
            estimated_time: draft
                .estimated_time
                .unwrap_or_else(|| format!("{} mins", self.settings.default_time_minutes)),
            servings: draft.servings.unwrap_or(self.settings.default_servings),
            image,
            ai_generated: false,
            diets: draft.diets,
        }
    }

    /// Validates raw caller input, then generates. Invalid input never
    /// reaches the completion service.
    pub async fn generate_for(
        &self,
        ingredients: Vec<String>,
        preferences: Option<String>,
    ) -> Result<AssembledRecipe, GenerationError> {
        let request = GenerationRequest::new(ingredients, preferences)?;
        self.generate(&request).await
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<AssembledRecipe, GenerationError> {
        let mut run = GenerationRun::start();

        let completion = CompletionRequest::new(CHEF_ROLE, build_generation_prompt(request))
            .with_temperature(self.settings.recipe_temperature)
            .with_max_tokens(self.settings.recipe_max_tokens);

        run.enter(GenerationStage::AwaitingCompletion);
        let raw = match self.client.complete(&completion).await {
            Ok(raw) => raw,
            Err(e) => return Err(run.fail(e)),
        };

        run.enter(GenerationStage::Extracting);
        log::debug!("Raw recipe completion: {}", raw);
        let parsed = match extract_recipe(&raw) {
            Ok(parsed) => parsed,
            Err(e) => return Err(run.fail(e)),
        };

        let calories = match parsed.estimated_calories {
            Some(calories) => calories,
            None => {
                run.enter(GenerationStage::EstimatingCalories);
                self.estimator
                    .estimate(&parsed.name, &parsed.ingredients)
                    .await
                    .as_stored()
            }
        };

        let recipe = AssembledRecipe::from_parsed(parsed, calories, request.preferences(), &self.settings);
        run.enter(GenerationStage::Assembled);
        log::info!(
            "Generated recipe '{}' ({} kcal) with {}",
            recipe.name,
            recipe.estimated_calories,
            self.client.model_name()
        );

        Ok(recipe)
    }
}
