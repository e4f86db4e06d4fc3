#[derive(Debug, Clone, Default)]
pub struct FoodConfig {
    pub spoonacular_api_key: Option<String>,
}

impl FoodConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            spoonacular_api_key: lookup("SPOONACULAR_API_KEY").filter(|key| !key.trim().is_empty()),
        }
    }
}
