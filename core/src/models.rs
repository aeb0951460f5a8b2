use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title of the sentinel recipe that free-text meals are logged against.
pub const QUICK_NOTE_TITLE: &str = "Quick note";

/// User id recorded on meals when the caller has no better one.
pub const DEFAULT_USER_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Name given to extracted ingredients that arrive without one.
pub const UNNAMED_INGREDIENT: &str = "Unnamed ingredient";

pub const SUGGESTED_TAGS: &[&str] = &["Quick", "Comfort", "Healthy"];

/// Key used for every ingredient/staple name comparison: trimmed and lowercased.
///
/// No other folding happens, so "olive oil" and "oil" stay distinct.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PantryStatus {
    Full,
    Half,
    Low,
    Out,
}

impl PantryStatus {
    pub const ALL: [PantryStatus; 4] = [Self::Full, Self::Half, Self::Low, Self::Out];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "Full",
            Self::Half => "Half",
            Self::Low => "Low",
            Self::Out => "Out",
        }
    }

    /// 0 for Full up to 3 for Out.
    #[must_use]
    pub fn depletion_level(self) -> u8 {
        match self {
            Self::Full => 0,
            Self::Half => 1,
            Self::Low => 2,
            Self::Out => 3,
        }
    }

    /// Full and Half count as "in stock" for coverage.
    #[must_use]
    pub fn is_adequate(self) -> bool {
        matches!(self, Self::Full | Self::Half)
    }
}

impl fmt::Display for PantryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PantryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().to_lowercase() == lower)
            .ok_or_else(|| {
                anyhow::anyhow!("Invalid pantry status '{s}'. Must be one of: Full, Half, Low, Out")
            })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub qty: Option<f64>,
    pub unit: Option<String>,
    #[serde(default = "default_true")]
    pub is_essential: bool,
}

impl Ingredient {
    #[must_use]
    pub fn essential(name: &str) -> Self {
        Self {
            name: name.to_string(),
            qty: None,
            unit: None,
            is_essential: true,
        }
    }

    #[must_use]
    pub fn optional(name: &str) -> Self {
        Self {
            is_essential: false,
            ..Self::essential(name)
        }
    }

    #[must_use]
    pub fn with_qty(mut self, qty: f64, unit: Option<&str>) -> Self {
        self.qty = Some(qty);
        self.unit = unit.map(String::from);
        self
    }

    #[must_use]
    pub fn name_key(&self) -> String {
        normalize_name(&self.name)
    }

    /// Shopping-list quantity text: "2 cups", "2", "pinch" or nothing.
    #[must_use]
    pub fn quantity_text(&self) -> Option<String> {
        let unit = self.unit.as_deref().map(str::trim).filter(|u| !u.is_empty());
        match (self.qty, unit) {
            (Some(q), Some(u)) => Some(format!("{q} {u}")),
            (Some(q), None) => Some(q.to_string()),
            (None, Some(u)) => Some(u.to_string()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub instructions: String,
    pub ingredients: Vec<Ingredient>,
    pub source_url: Option<String>,
    pub edit_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Recipe {
    #[must_use]
    pub fn is_quick_note(&self) -> bool {
        self.title == QUICK_NOTE_TITLE
    }

    /// Distinct normalized ingredient names, blanks skipped.
    #[must_use]
    pub fn ingredient_keys(&self) -> HashSet<String> {
        self.ingredients
            .iter()
            .map(Ingredient::name_key)
            .filter(|k| !k.is_empty())
            .collect()
    }

    #[must_use]
    pub fn contains_ingredient(&self, key: &str) -> bool {
        self.ingredients.iter().any(|i| i.name_key() == key)
    }

    pub fn essentials(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients.iter().filter(|i| i.is_essential)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewRecipe {
    pub title: String,
    pub instructions: String,
    pub ingredients: Vec<Ingredient>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PantryStaple {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub status: PantryStatus,
    pub last_restocked: Option<String>,
    pub frequency_rank: i64,
    pub marked_stocked_at: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealHistory {
    pub id: i64,
    pub uuid: String,
    pub recipe_id: i64,
    pub user_id: String,
    pub consumed_at: DateTime<Utc>,
    pub note: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    // Joined for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMealLog {
    pub recipe_id: i64,
    pub user_id: String,
    pub consumed_at: DateTime<Utc>,
    pub note: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListItem {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub qty: Option<String>,
    pub checked: bool,
    pub recipe_id: Option<i64>,
    pub added_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeMealCount {
    pub recipe: Recipe,
    pub meal_count: usize,
}

pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        bail!("Recipe title must not be empty");
    }
    if normalize_name(title) == normalize_name(QUICK_NOTE_TITLE) {
        bail!("'{QUICK_NOTE_TITLE}' is reserved for free-text meals");
    }
    Ok(title.to_string())
}

/// Trim ingredient names and units, dropping ingredients with blank names.
#[must_use]
pub fn clean_ingredients(ingredients: Vec<Ingredient>) -> Vec<Ingredient> {
    ingredients
        .into_iter()
        .filter_map(|mut i| {
            let name = i.name.trim();
            if name.is_empty() {
                return None;
            }
            i.name = name.to_string();
            i.unit = i
                .unit
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty());
            i.qty = i.qty.filter(|q| q.is_finite());
            Some(i)
        })
        .collect()
}

/// Trim tags and drop blanks and repeats, keeping first-seen order.
#[must_use]
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}
