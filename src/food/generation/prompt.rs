use super::assembler::GenerationRequest;

pub const CHEF_ROLE: &str = "You are a professional chef providing detailed, accurate recipes.";

pub const NUTRITIONIST_ROLE: &str = "You are a nutrition expert providing accurate calorie estimations.";

const RESPONSE_SHAPE: &str = "Format the response as a JSON object with the following structure: \
{\"name\": \"Recipe Name\", \"ingredients\": [\"ingredient 1\", \"ingredient 2\", ...], \
\"instructions\": \"Step-by-step instructions\", \
\"estimatedCalories\": approximate_calories_as_number, \
\"estimatedTime\": cooking_time_in_minutes, \"servings\": number_of_servings}";

pub fn build_generation_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Generate a recipe using these ingredients: {}",
        request.ingredients().join(", ")
    );

    if let Some(preferences) = request.preferences() {
        prompt.push_str(&format!("\nDietary preferences/requirements: {}", preferences));
    }

    prompt.push('\n');
    prompt.push_str(RESPONSE_SHAPE);
    prompt
}

pub fn build_calorie_prompt(recipe_name: &str, ingredients: &[String]) -> String {
    format!(
        "Estimate the total calories in this recipe called '{}' with these ingredients: {}. \
         Return only a number representing the total calories.",
        recipe_name,
        ingredients.join(", ")
    )
}
