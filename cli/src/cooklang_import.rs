use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use larder_core::extract::{ExtractError, ExtractedRecipe, RecipeExtractor, validate_payload};

/// Reads recipes written in Cooklang (`.cook` files).
pub struct CooklangExtractor {
    fallback_title: Option<String>,
}

impl CooklangExtractor {
    /// `fallback_title` is used when the recipe has no `title` metadata.
    #[must_use]
    pub fn new(fallback_title: Option<String>) -> Self {
        Self { fallback_title }
    }

    /// Read a `.cook` file, titling it after the file stem if needed.
    pub fn from_file(file: &Path) -> Result<(Self, String)> {
        let input = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read file: {}", file.display()))?;
        let stem = file.file_stem().and_then(|s| s.to_str()).map(String::from);
        Ok((Self::new(stem), input))
    }
}

impl RecipeExtractor for CooklangExtractor {
    fn extract(&self, page_text: &str) -> Result<ExtractedRecipe, ExtractError> {
        let (recipe, _report) = cooklang::parse(page_text)
            .into_result()
            .map_err(|e| ExtractError::Provider(format!("Failed to parse Cooklang file: {e}")))?;

        let title = recipe
            .metadata
            .title()
            .map(String::from)
            .or_else(|| self.fallback_title.clone());

        let converter = cooklang::Converter::default();
        let ingredients: Vec<Value> = recipe
            .group_ingredients(&converter)
            .iter()
            .map(ingredient_json)
            .collect();

        validate_payload(json!({
            "title": title,
            "instructions": instruction_lines(page_text),
            "ingredients": ingredients,
        }))
    }
}

fn ingredient_json(gi: &cooklang::ingredient_list::GroupedIngredient<'_>) -> Value {
    // Only the first quantity is kept; text amounts like "a pinch" carry no number.
    let (qty, unit) = gi
        .quantity
        .iter()
        .next()
        .map_or((None, None), |qty: &cooklang::Quantity| {
            let value = match qty.value() {
                cooklang::Value::Number(n) => Some(n.value()),
                cooklang::Value::Range { start, .. } => Some(start.value()),
                cooklang::Value::Text(_) => None,
            };
            (value, qty.unit().map(String::from))
        });

    json!({
        "name": gi.ingredient.display_name().to_string(),
        "qty": qty,
        "unit": unit,
        "is_essential": true,
    })
}

/// Step text: every line that is not metadata, front matter or a comment.
fn instruction_lines(input: &str) -> String {
    let mut lines = input.lines().map(str::trim).peekable();
    if lines.peek() == Some(&"---") {
        lines.next();
        for line in lines.by_ref() {
            if line == "---" {
                break;
            }
        }
    }
    lines
        .filter(|l| !l.is_empty() && !l.starts_with(">>") && !l.starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PANCAKES: &str = "Whisk @flour{200%g} with @eggs{2} and @milk{300%ml}.
-- rest the batter if you can
Fry in a #pan{} and season with @salt{}.
";

    #[test]
    fn test_extracts_ingredients() {
        let extractor = CooklangExtractor::new(Some("pancakes".to_string()));
        let recipe = extractor.extract(PANCAKES).unwrap();
        assert_eq!(recipe.title, "pancakes");

        let names: Vec<&str> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["flour", "eggs", "milk", "salt"]);
        assert_eq!(recipe.ingredients[0].qty, Some(200.0));
        assert_eq!(recipe.ingredients[0].unit.as_deref(), Some("g"));
        assert_eq!(recipe.ingredients[1].qty, Some(2.0));
        assert_eq!(recipe.ingredients[1].unit, None);
        assert_eq!(recipe.ingredients[3].qty, None);
        assert!(recipe.ingredients.iter().all(|i| i.is_essential));
    }

    #[test]
    fn test_no_title_is_rejected() {
        let extractor = CooklangExtractor::new(None);
        assert!(matches!(
            extractor.extract(PANCAKES),
            Err(ExtractError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_instruction_lines_skip_metadata() {
        let text = "---\ntitle: Soup\n---\n>> servings: 2\nChop @leek{1}.\n\n-- note\nSimmer.";
        assert_eq!(instruction_lines(text), "Chop @leek{1}.\nSimmer.");
    }

    #[test]
    fn test_from_file_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weeknight dal.cook");
        std::fs::write(&path, "Simmer @lentils{200%g} until soft.").unwrap();

        let (extractor, input) = CooklangExtractor::from_file(&path).unwrap();
        let recipe = extractor.extract(&input).unwrap();
        assert_eq!(recipe.title, "weeknight dal");
        assert_eq!(recipe.ingredients.len(), 1);
        assert_eq!(recipe.instructions, "Simmer @lentils{200%g} until soft.");
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(CooklangExtractor::from_file(Path::new("/nonexistent/x.cook")).is_err());
    }
}
