//! Boundary for recipe extraction.
//!
//! Extractors turn page text (or a recipe file) into a loosely shaped JSON
//! payload. Everything they hand back goes through [`validate_payload`] so
//! the rest of the crate only ever sees a checked [`ExtractedRecipe`].

use serde::Serialize;
use serde_json::Value;

use crate::models::{Ingredient, UNNAMED_INGREDIENT};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("OPENAI_API_KEY not set")]
    MissingApiKey,
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("Extraction request failed: {0}")]
    Provider(String),
    #[error("No content returned by the extraction model")]
    EmptyResponse,
    #[error("Extraction returned invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid recipe structure: {0}")]
    InvalidStructure(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecipe {
    pub title: String,
    pub instructions: String,
    pub ingredients: Vec<Ingredient>,
}

/// Something that can turn raw recipe text into a structured recipe.
///
/// Called synchronously; slow implementations should be driven from a
/// background thread.
pub trait RecipeExtractor: Send + Sync {
    fn extract(&self, page_text: &str) -> Result<ExtractedRecipe, ExtractError>;
}

/// Parse an extractor's JSON text and validate it.
pub fn parse_payload(content: &str) -> Result<ExtractedRecipe, ExtractError> {
    let value: Value = serde_json::from_str(content)?;
    validate_payload(value)
}

/// Coerce a loosely typed payload into an [`ExtractedRecipe`].
///
/// A title and an ingredient array are required. Ingredient fields are
/// coerced leniently: missing names get a placeholder, quantities are parsed
/// from numbers or numeric strings, and essentiality defaults to true.
pub fn validate_payload(value: Value) -> Result<ExtractedRecipe, ExtractError> {
    let Value::Object(mut obj) = value else {
        return Err(ExtractError::InvalidStructure("expected a JSON object"));
    };

    let title = match obj.remove("title") {
        Some(Value::String(t)) if !t.trim().is_empty() => t.trim().to_string(),
        _ => return Err(ExtractError::InvalidStructure("missing title")),
    };
    let Some(Value::Array(raw_ingredients)) = obj.remove("ingredients") else {
        return Err(ExtractError::InvalidStructure("ingredients must be a list"));
    };
    let instructions = match obj.remove("instructions") {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };

    let ingredients = raw_ingredients
        .into_iter()
        .filter_map(|raw| match raw {
            Value::Object(fields) => Some(coerce_ingredient(&fields)),
            _ => None,
        })
        .collect();

    Ok(ExtractedRecipe {
        title,
        instructions,
        ingredients,
    })
}

fn coerce_ingredient(fields: &serde_json::Map<String, Value>) -> Ingredient {
    let name = match fields.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => UNNAMED_INGREDIENT.to_string(),
    };
    let qty = match fields.get("qty") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|q| q.is_finite());
    let unit = match fields.get("unit") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let is_essential = fields.get("is_essential").is_none_or(truthy);

    Ingredient {
        name,
        qty,
        unit,
        is_essential,
    }
}

/// JSON truthiness, with null meaning "not stated" and so true.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => true,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
    }
}
