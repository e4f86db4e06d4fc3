use crate::config::GenerationSettings;
use crate::providers::traits::{CompletionClient, CompletionRequest};
use super::prompt::{build_calorie_prompt, NUTRITIONIST_ROLE};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalorieEstimate {
    Estimated(u64),
    Unavailable,
}

impl CalorieEstimate {
    /// Value written to the recipe record. Unavailable is stored as zero,
    /// the same as a genuine zero estimate.
    pub fn as_stored(self) -> f64 {
        match self {
            CalorieEstimate::Estimated(calories) => calories as f64,
            CalorieEstimate::Unavailable => 0.0,
        }
    }
}

/// First run of ASCII digits in `text`. No sign, no decimals.
pub fn parse_calories(text: &str) -> CalorieEstimate {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    match digits.parse::<u64>() {
        Ok(calories) => CalorieEstimate::Estimated(calories),
        Err(_) => CalorieEstimate::Unavailable,
    }
}

/// Best-effort second opinion on calories. Never fails outward.
pub struct CalorieEstimator {
    client: Arc<dyn CompletionClient>,
    temperature: f32,
    max_tokens: u16,
}

impl CalorieEstimator {
    pub fn new(client: Arc<dyn CompletionClient>, settings: &GenerationSettings) -> Self {
        Self {
            client,
            temperature: settings.calorie_temperature,
            max_tokens: settings.calorie_max_tokens,
        }
    }

    pub async fn estimate(&self, recipe_name: &str, ingredients: &[String]) -> CalorieEstimate {
        let request = CompletionRequest::new(NUTRITIONIST_ROLE, build_calorie_prompt(recipe_name, ingredients))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        match self.client.complete(&request).await {
            Ok(text) => {
                let estimate = parse_calories(&text);
                if estimate == CalorieEstimate::Unavailable {
                    log::warn!("No calorie figure in estimator reply for '{}'", recipe_name);
                    log::debug!("Estimator reply: {}", text);
                }
                estimate
            }
            Err(e) => {
                log::warn!("Error estimating calories for '{}': {}", recipe_name, e);
                CalorieEstimate::Unavailable
            }
        }
    }
}
