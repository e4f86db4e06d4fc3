use crate::food::config::FoodConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_IMAGE_TEMPLATE: &str = "https://source.unsplash.com/random/800x600/?{query}";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingVar(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// The OpenAI API through `async-openai`.
    OpenAI,
    /// Any OpenAI-shaped chat-completions endpoint through plain HTTP.
    Compatible,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    /// Upper bound for a single completion call.
    pub request_timeout: Duration,
}

impl ProviderConfig {
    pub fn from_lookup<F>(provider: &str, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = provider.trim().to_lowercase();
        let prefix = provider.to_uppercase();

        let api_key_var = format!("{}_API_KEY", prefix);
        let api_key = lookup(&api_key_var).ok_or(ConfigError::MissingVar(api_key_var))?;

        let (kind, default_url, default_model) = match provider.as_str() {
            "openai" => (ProviderKind::OpenAI, "https://api.openai.com/v1", "gpt-3.5-turbo"),
            "deepseek" => (
                ProviderKind::Compatible,
                "https://api.deepseek.com/v1/chat/completions",
                "deepseek-chat",
            ),
            "openrouter" => (
                ProviderKind::Compatible,
                "https://openrouter.ai/api/v1/chat/completions",
                "openai/gpt-3.5-turbo",
            ),
            "mistral" => (
                ProviderKind::Compatible,
                "https://api.mistral.ai/v1/chat/completions",
                "mistral-small-latest",
            ),
            _ => (ProviderKind::Compatible, "", ""),
        };

        let api_url = lookup(&format!("{}_API_URL", prefix))
            .or_else(|| non_empty(default_url))
            .ok_or_else(|| ConfigError::MissingVar(format!("{}_API_URL", prefix)))?;

        let model = lookup(&format!("{}_MODEL", prefix))
            .or_else(|| non_empty(default_model))
            .ok_or_else(|| ConfigError::MissingVar(format!("{}_MODEL", prefix)))?;

        Ok(Self {
            name: provider,
            kind,
            api_key,
            api_url,
            model,
            request_timeout: Duration::from_secs(parse_or(lookup, "COMPLETION_TIMEOUT_SECS", 60)),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Knobs for the recipe-generation pipeline, handed to the assembler at
/// construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub recipe_temperature: f32,
    pub recipe_max_tokens: u16,
    pub calorie_temperature: f32,
    pub calorie_max_tokens: u16,
    pub default_time_minutes: u32,
    pub default_servings: u32,
    /// URL with a `{query}` slot for the recipe name.
    pub image_template: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            recipe_temperature: 0.7,
            recipe_max_tokens: 1000,
            calorie_temperature: 0.3,
            calorie_max_tokens: 50,
            default_time_minutes: 30,
            default_servings: 4,
            image_template: DEFAULT_IMAGE_TEMPLATE.to_string(),
        }
    }
}

impl GenerationSettings {
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            recipe_temperature: parse_or(lookup, "RECIPE_TEMPERATURE", defaults.recipe_temperature),
            recipe_max_tokens: parse_or(lookup, "RECIPE_MAX_TOKENS", defaults.recipe_max_tokens),
            calorie_temperature: parse_or(lookup, "CALORIE_TEMPERATURE", defaults.calorie_temperature),
            calorie_max_tokens: parse_or(lookup, "CALORIE_MAX_TOKENS", defaults.calorie_max_tokens),
            default_time_minutes: defaults.default_time_minutes,
            default_servings: defaults.default_servings,
            image_template: lookup("RECIPE_IMAGE_TEMPLATE").unwrap_or(defaults.image_template),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub generation: GenerationSettings,
    pub database_path: String,
    pub generation_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub food: FoodConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_name = lookup("COMPLETION_PROVIDER").unwrap_or_else(|| "openai".to_string());

        Ok(Self {
            provider: ProviderConfig::from_lookup(&provider_name, lookup)?,
            generation: GenerationSettings::from_lookup(lookup),
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "data/recipes.db".to_string()),
            generation_timeout: Duration::from_secs(parse_or(lookup, "GENERATION_TIMEOUT_SECS", 60)),
            max_concurrent_requests: parse_or(lookup, "MAX_CONCURRENT_REQUESTS", 64usize).max(1),
            food: FoodConfig::from_lookup(lookup),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring unparsable {}={:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}
