use crate::database::Database;
use crate::food::api::{IngredientMatch, SpoonacularClient};
use crate::food::generation::RecipeAssembler;
use anyhow::{anyhow, Result};
use colored::Colorize;

/// Splits `"egg, flour ,milk"` into trimmed, non-empty items.
pub fn parse_ingredient_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runs the generation pipeline once and renders the record as pretty JSON,
/// persisting it first when a database is given.
pub async fn generate(
    assembler: &RecipeAssembler,
    db: Option<&Database>,
    ingredients: &str,
    preferences: Option<String>,
) -> Result<String> {
    let recipe = assembler
        .generate_for(parse_ingredient_list(ingredients), preferences)
        .await
        .map_err(|e| anyhow!(e.public_message()))?;

    let rendered = match db {
        Some(db) => serde_json::to_string_pretty(&db.insert_recipe(&recipe, "cli").await?)?,
        None => serde_json::to_string_pretty(&recipe)?,
    };

    Ok(rendered)
}

pub async fn search(client: &SpoonacularClient, ingredients: &str, number: u32) -> Result<String> {
    let ingredients = parse_ingredient_list(ingredients);
    if ingredients.is_empty() {
        return Err(anyhow!("Please specify at least one ingredient to search with."));
    }

    let matches = client.find_by_ingredients(&ingredients, number).await?;
    Ok(render_matches(&matches))
}

pub fn render_matches(matches: &[IngredientMatch]) -> String {
    if matches.is_empty() {
        return "No recipes found for those ingredients.".to_string();
    }

    let mut output = String::from("Recipes you can make:\n");
    for m in matches {
        output.push_str(&format!(
            "• {} (uses {}, missing {}, {} likes)\n",
            m.title.bold(),
            m.used_ingredient_count.to_string().green(),
            m.missed_ingredient_count.to_string().yellow(),
            m.likes
        ));
    }
    output
}
