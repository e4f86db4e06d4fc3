use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SPOONACULAR_BASE_URL: &str = "https://api.spoonacular.com";

#[derive(Error, Debug)]
pub enum SpoonacularError {
    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API request failed with status: {0}")]
    Status(u16),
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// One hit from `findByIngredients`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngredientMatch {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub used_ingredient_count: u32,
    #[serde(default)]
    pub missed_ingredient_count: u32,
    #[serde(default)]
    pub likes: u32,
}

#[derive(Debug)]
pub struct SpoonacularClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl SpoonacularClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, SPOONACULAR_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Recipes that use as many of `ingredients` as possible.
    pub async fn find_by_ingredients(
        &self,
        ingredients: &[String],
        number: u32,
    ) -> Result<Vec<IngredientMatch>, SpoonacularError> {
        let url = format!("{}/recipes/findByIngredients", self.base_url);
        let params = search_params(&self.api_key, ingredients, number);

        let response = self.client.get(&url).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(SpoonacularError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_matches(&body)
    }
}

fn search_params(api_key: &str, ingredients: &[String], number: u32) -> Vec<(&'static str, String)> {
    let joined = ingredients
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .collect::<Vec<_>>()
        .join(",");

    vec![
        ("apiKey", api_key.to_string()),
        ("ingredients", joined),
        ("number", number.to_string()),
        // 1 = maximize used ingredients
        ("ranking", "1".to_string()),
    ]
}

fn parse_matches(body: &str) -> Result<Vec<IngredientMatch>, SpoonacularError> {
    serde_json::from_str(body).map_err(|e| SpoonacularError::Parse(e.to_string()))
}
