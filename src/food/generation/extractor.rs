//! Turns free-form model output into a [`ParsedRecipe`].
//!
//! Models are asked for a bare JSON object but routinely wrap it in prose or
//! markdown fences, so the object is located in two stages: the whole reply
//! first, then the span from the first `{` to the last `}`.

use super::error::ExtractionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured recipe as the model described it, before defaults are filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecipe {
    pub name: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub estimated_calories: Option<f64>,
    pub estimated_time_minutes: Option<u32>,
    pub servings: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonCandidate {
    Parsed(Map<String, Value>),
    NotFound,
}

pub fn locate_json_object(raw: &str) -> JsonCandidate {
    let text = raw.trim();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return JsonCandidate::Parsed(map);
    }

    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => return JsonCandidate::NotFound,
    };

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => JsonCandidate::Parsed(map),
        _ => JsonCandidate::NotFound,
    }
}

pub fn extract_recipe(raw: &str) -> Result<ParsedRecipe, ExtractionError> {
    let object = match locate_json_object(raw) {
        JsonCandidate::Parsed(map) => map,
        JsonCandidate::NotFound => return Err(ExtractionError::NoJsonObject),
    };

    let name = required_string(&object, "name")?;
    let ingredients = required_ingredients(&object)?;
    let instructions = required_string(&object, "instructions")?;

    Ok(ParsedRecipe {
        name,
        ingredients,
        instructions,
        estimated_calories: optional_number(&object, "estimatedCalories"),
        estimated_time_minutes: optional_minutes(&object, "estimatedTime"),
        servings: optional_quantity(&object, "servings"),
    })
}

fn present<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, ExtractionError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ExtractionError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn required_string(object: &Map<String, Value>, field: &'static str) -> Result<String, ExtractionError> {
    present(object, field)?
        .as_str()
        .map(str::to_string)
        .ok_or(ExtractionError::InvalidField {
            field,
            expected: "a string",
        })
}

// A bare string is rejected rather than promoted to a one-item list.
fn required_ingredients(object: &Map<String, Value>) -> Result<Vec<String>, ExtractionError> {
    const FIELD: &str = "ingredients";
    let invalid = ExtractionError::InvalidField {
        field: FIELD,
        expected: "a list of strings",
    };

    let items = present(object, FIELD)?.as_array().ok_or(invalid.clone())?;
    if items.is_empty() {
        return Err(ExtractionError::MissingField(FIELD));
    }

    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or(invalid.clone()))
        .collect()
}

/// Numbers, or strings holding a number. Anything else, including negative
/// and non-finite values, counts as absent.
fn optional_number(object: &Map<String, Value>, field: &str) -> Option<f64> {
    let number = match object.get(field)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if number.is_finite() && number >= 0.0 {
        Some(number)
    } else {
        None
    }
}

/// Minutes from a number or from text like `"45 minutes"` or `"1.5 hours"`.
fn optional_minutes(object: &Map<String, Value>, field: &str) -> Option<u32> {
    if let Some(minutes) = optional_number(object, field) {
        return Some(to_count(minutes));
    }

    let text = object.get(field)?.as_str()?;
    let number = leading_number(text)?;
    let lower = text.to_ascii_lowercase();
    let minutes = if lower.contains("hour") || lower.contains("hr") {
        number * 60.0
    } else {
        number
    };
    Some(to_count(minutes))
}

/// A count from a number or from text like `"4 people"`.
fn optional_quantity(object: &Map<String, Value>, field: &str) -> Option<u32> {
    optional_number(object, field)
        .or_else(|| leading_number(object.get(field)?.as_str()?))
        .map(to_count)
}

/// First number in free text: a digit run with an optional fraction.
fn leading_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].trim_end_matches('.').parse().ok()
}

fn to_count(value: f64) -> u32 {
    value.round().min(u32::MAX as f64) as u32
}
