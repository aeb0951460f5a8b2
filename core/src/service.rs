use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rand::Rng;

use crate::db::Database;
use crate::depletion::{StatusChange, plan_depletion};
use crate::extract::{ExtractedRecipe, RecipeExtractor};
use crate::frequency::{FrequencyScore, frequency_scores};
use crate::models::{
    Ingredient, MealHistory, NewMealLog, NewRecipe, PantryStaple, PantryStatus, QUICK_NOTE_TITLE,
    Recipe, RecipeMealCount, ShoppingListItem, clean_ingredients, normalize_name, normalize_tags,
    validate_title,
};
use crate::picker;
use crate::pipeline::{DeriveStep, Pipeline, StepRunner, WriteReport};
use crate::suggest::{self, MealOccurrence, Suggestions};

pub const DEFAULT_FAVORITES_LIMIT: usize = 8;
/// How far back "cook what I had last Monday" looks.
pub const REUSE_LOOKBACK_MONTHS: u32 = 2;

/// Convert a local wall-clock time to UTC, taking the earlier reading in a DST fold.
fn from_local(local: NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(&local)
        .earliest()
        .map_or_else(|| local.and_utc(), |dt| dt.with_timezone(&Utc))
}

fn local_start_of_day(date: NaiveDate) -> DateTime<Utc> {
    from_local(date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Timestamp used for meals logged against a date rather than a moment.
#[must_use]
pub fn local_noon(date: NaiveDate) -> DateTime<Utc> {
    from_local(date.and_hms_opt(12, 0, 0).unwrap_or_default())
}

#[must_use]
pub fn local_date(ts: &DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

pub struct LarderService {
    db: Database,
}

impl LarderService {
    pub fn open(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    // --- Recipes ---

    /// Save a recipe, then create staples for its ingredients and refresh ranks.
    pub fn create_recipe(&self, recipe: NewRecipe) -> Result<WriteReport<Recipe>> {
        let title = validate_title(&recipe.title)?;
        let source_url = recipe
            .source_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let stored = self.db.insert_recipe(&NewRecipe {
            title,
            instructions: recipe.instructions.trim().to_string(),
            ingredients: clean_ingredients(recipe.ingredients),
            source_url,
        })?;
        tracing::info!(recipe_id = stored.id, title = %stored.title, "recipe saved");

        let pipeline = Pipeline::new()
            .then(DeriveStep::EnsureStaples {
                recipe_id: stored.id,
            })
            .then(DeriveStep::FrequencyRanks);
        Ok(pipeline.run(self, stored))
    }

    /// Extract a recipe from page text and save it. Nothing is written if
    /// extraction fails.
    pub fn import_recipe(
        &self,
        extractor: &dyn RecipeExtractor,
        page_text: &str,
        source_url: Option<&str>,
    ) -> Result<WriteReport<Recipe>> {
        let extracted = extractor.extract(page_text)?;
        self.save_extracted_recipe(extracted, source_url)
    }

    pub fn save_extracted_recipe(
        &self,
        recipe: ExtractedRecipe,
        source_url: Option<&str>,
    ) -> Result<WriteReport<Recipe>> {
        self.create_recipe(NewRecipe {
            title: recipe.title,
            instructions: recipe.instructions,
            ingredients: recipe.ingredients,
            source_url: source_url.map(String::from),
        })
    }

    /// Replace a recipe's ingredient list and count the edit.
    pub fn update_recipe_ingredients(
        &self,
        recipe_id: i64,
        ingredients: Vec<Ingredient>,
    ) -> Result<WriteReport<Recipe>> {
        self.ingredient_recipe(recipe_id)?;
        let recipe = self
            .db
            .replace_recipe_ingredients(recipe_id, &clean_ingredients(ingredients))?;

        let pipeline = Pipeline::new()
            .then(DeriveStep::EnsureStaples { recipe_id })
            .then(DeriveStep::FrequencyRanks)
            .then(DeriveStep::Depletion { recipe_id });
        Ok(pipeline.run(self, recipe))
    }

    /// A real recipe; the Quick-note sentinel carries no ingredients.
    fn ingredient_recipe(&self, id: i64) -> Result<Recipe> {
        let recipe = self.db.get_recipe(id)?;
        if recipe.is_quick_note() {
            bail!("'{QUICK_NOTE_TITLE}' has no ingredients");
        }
        Ok(recipe)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Recipe> {
        self.db.get_recipe(id)
    }

    pub fn get_recipe_by_title(&self, title: &str) -> Result<Recipe> {
        self.db.get_recipe_by_title(title)
    }

    /// Case-insensitive title lookup that never returns the quick-note recipe.
    pub fn find_recipe_by_title(&self, title: &str) -> Result<Option<Recipe>> {
        Ok(self
            .db
            .find_recipe_by_title(title)?
            .filter(|r| !r.is_quick_note()))
    }

    pub fn list_recipes(&self, search: Option<&str>) -> Result<Vec<Recipe>> {
        match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(query) => self.db.search_recipes(query),
            None => self.db.list_recipes(),
        }
    }

    /// Catalog recipes with their lifetime meal counts, in catalog order.
    pub fn recipe_meal_counts(&self, search: Option<&str>) -> Result<Vec<RecipeMealCount>> {
        let counts = self.db.meal_counts_by_recipe()?;
        Ok(self
            .list_recipes(search)?
            .into_iter()
            .map(|recipe| RecipeMealCount {
                meal_count: counts.get(&recipe.id).copied().unwrap_or(0),
                recipe,
            })
            .collect())
    }

    /// Most-cooked recipes first.
    pub fn favorites(&self, search: Option<&str>, limit: usize) -> Result<Vec<RecipeMealCount>> {
        let mut recipes = self.recipe_meal_counts(search)?;
        recipes.sort_by(|a, b| b.meal_count.cmp(&a.meal_count));
        recipes.truncate(limit);
        Ok(recipes)
    }

    // --- Meals ---

    /// Record a meal, then update staple depletion and frequency ranks.
    ///
    /// Fails only if the meal itself could not be recorded.
    pub fn log_meal(&self, log: NewMealLog) -> Result<WriteReport<MealHistory>> {
        let recipe = self.db.get_recipe(log.recipe_id)?;
        let log = NewMealLog {
            note: log
                .note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            tags: normalize_tags(log.tags),
            ..log
        };
        let meal = self.db.insert_meal(&log)?;
        tracing::info!(meal_id = meal.id, recipe = %recipe.title, "meal logged");

        let pipeline = Pipeline::new()
            .then(DeriveStep::Depletion {
                recipe_id: recipe.id,
            })
            .then(DeriveStep::FrequencyRanks);
        Ok(pipeline.run(self, meal))
    }

    /// Log a free-text meal against the quick-note recipe.
    pub fn log_quick_note(
        &self,
        note: &str,
        user_id: &str,
        consumed_at: DateTime<Utc>,
        tags: Vec<String>,
    ) -> Result<WriteReport<MealHistory>> {
        let note = note.trim();
        if note.is_empty() {
            bail!("Quick note must not be empty");
        }
        let sentinel = self.quick_note_recipe()?;
        self.log_meal(NewMealLog {
            recipe_id: sentinel.id,
            user_id: user_id.to_string(),
            consumed_at,
            note: Some(note.to_string()),
            tags,
        })
    }

    pub fn quick_note_recipe(&self) -> Result<Recipe> {
        if let Some(recipe) = self.db.find_recipe_by_title(QUICK_NOTE_TITLE)? {
            return Ok(recipe);
        }
        self.db.insert_recipe(&NewRecipe {
            title: QUICK_NOTE_TITLE.to_string(),
            ..NewRecipe::default()
        })
    }

    /// Log again the latest real meal eaten on the same weekday before `date`.
    ///
    /// Returns `None` when nothing was cooked on that weekday in the lookback.
    pub fn reuse_last_weekday_meal(
        &self,
        date: NaiveDate,
        user_id: &str,
    ) -> Result<Option<WriteReport<MealHistory>>> {
        let start = date
            .checked_sub_months(Months::new(REUSE_LOOKBACK_MONTHS))
            .context("Date out of range")?;
        let previous = self
            .db
            .list_meals_between(&local_start_of_day(start), &local_start_of_day(date))?
            .into_iter()
            .find(|m| {
                m.recipe_title.as_deref() != Some(QUICK_NOTE_TITLE)
                    && local_date(&m.consumed_at).weekday() == date.weekday()
            });
        let Some(previous) = previous else {
            return Ok(None);
        };
        self.log_meal(NewMealLog {
            recipe_id: previous.recipe_id,
            user_id: user_id.to_string(),
            consumed_at: local_noon(date),
            note: None,
            tags: previous.tags,
        })
        .map(Some)
    }

    /// Meals eaten on the local calendar day `date`, newest first.
    pub fn meals_on(&self, date: NaiveDate) -> Result<Vec<MealHistory>> {
        let next = date + Duration::days(1);
        self.db
            .list_meals_between(&local_start_of_day(date), &local_start_of_day(next))
    }

    pub fn recent_meals(&self, limit: usize) -> Result<Vec<MealHistory>> {
        self.db.list_meals(Some(limit))
    }

    // --- Pantry ---

    pub fn list_staples(&self) -> Result<Vec<PantryStaple>> {
        self.db.list_staples()
    }

    pub fn get_staple(&self, id: i64) -> Result<PantryStaple> {
        self.db.get_staple(id)
    }

    pub fn find_staple(&self, name: &str) -> Result<Option<PantryStaple>> {
        self.db.find_staple_by_name(name)
    }

    pub fn get_staple_by_name(&self, name: &str) -> Result<PantryStaple> {
        self.find_staple(name)?
            .with_context(|| format!("Staple '{}' not found", name.trim()))
    }

    /// Staples to restock, most urgent first.
    pub fn stock_up(&self) -> Result<Vec<PantryStaple>> {
        self.db.list_stock_up()
    }

    pub fn mark_staple_stocked(&self, id: i64) -> Result<PantryStaple> {
        let staple = self.db.mark_staple_stocked(id)?;
        tracing::info!(staple = %staple.name, "marked stocked");
        Ok(staple)
    }

    pub fn set_staple_status(&self, id: i64, status: PantryStatus) -> Result<PantryStaple> {
        self.db.update_staple_status(id, status)
    }

    /// Re-run one derived-data step, typically one a [`WriteReport`] listed as failed.
    pub fn retry_step(&self, step: DeriveStep) -> Result<()> {
        self.run_step(step)
    }

    /// Create missing staples for a recipe's ingredients. Returns how many were new.
    pub fn ensure_staples(&self, recipe_id: i64) -> Result<usize> {
        let Some(recipe) = self.db.find_recipe(recipe_id)? else {
            return Ok(0);
        };
        let mut created = 0;
        let mut seen = HashSet::new();
        for ingredient in &recipe.ingredients {
            let key = ingredient.name_key();
            if key.is_empty() || !seen.insert(key) {
                continue;
            }
            if self.db.insert_staple(&ingredient.name)?.is_some() {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Apply the depletion rules for a recipe that was just eaten.
    pub fn run_depletion(&self, recipe_id: i64) -> Result<Vec<StatusChange>> {
        let Some(recipe) = self.db.find_recipe(recipe_id)? else {
            return Ok(Vec::new());
        };
        if recipe.ingredients.is_empty() {
            return Ok(Vec::new());
        }
        let changes = plan_depletion(
            &recipe,
            &self.db.list_staples()?,
            &self.db.list_recipes()?,
            &self.db.meal_recipe_ids()?,
        );
        for change in &changes {
            self.db.update_staple_status(change.staple_id, change.to)?;
            tracing::info!(
                staple = %change.name,
                from = %change.from,
                to = %change.to,
                meals = change.meal_count,
                "staple depleted"
            );
        }
        Ok(changes)
    }

    pub fn recompute_frequency_ranks(&self) -> Result<Vec<FrequencyScore>> {
        let scores = frequency_scores(
            &self.db.list_staples()?,
            &self.db.list_recipes()?,
            &self.db.meal_recipe_ids()?,
        );
        for score in &scores {
            self.db.set_frequency_rank(score.staple_id, score.score)?;
        }
        Ok(scores)
    }

    // --- Decisions ---

    pub fn suggest(&self, date: NaiveDate) -> Result<Suggestions> {
        let history: Vec<MealOccurrence> = self
            .db
            .list_meals(None)?
            .iter()
            .map(|m| MealOccurrence {
                recipe_id: m.recipe_id,
                consumed: m.consumed_at.with_timezone(&Local).naive_local(),
            })
            .collect();
        Ok(suggest::suggest(
            date,
            &history,
            &self.db.list_recipes()?,
            &self.db.list_staples()?,
        ))
    }

    pub fn surprise<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Option<Recipe>> {
        let catalog = self.db.list_recipes()?;
        let staples = self.db.list_staples()?;
        Ok(picker::surprise(&catalog, &staples, rng).cloned())
    }

    // --- Shopping list ---

    pub fn shopping_list(&self) -> Result<Vec<ShoppingListItem>> {
        self.db.list_shopping_items()
    }

    pub fn add_shopping_item(&self, name: &str, qty: Option<&str>) -> Result<ShoppingListItem> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Item name must not be empty");
        }
        let qty = qty.map(str::trim).filter(|q| !q.is_empty());
        self.db.insert_shopping_item(name, qty, None)
    }

    /// Add a recipe's ingredients, or only those named in `only`, to the list.
    pub fn add_recipe_to_shopping_list(
        &self,
        recipe_id: i64,
        only: Option<&[String]>,
    ) -> Result<Vec<ShoppingListItem>> {
        let recipe = self.ingredient_recipe(recipe_id)?;
        let wanted: Option<HashSet<String>> =
            only.map(|names| names.iter().map(|n| normalize_name(n)).collect());

        let mut added = Vec::new();
        for ingredient in &recipe.ingredients {
            if wanted
                .as_ref()
                .is_some_and(|w| !w.contains(&ingredient.name_key()))
            {
                continue;
            }
            let qty = ingredient.quantity_text();
            added.push(self.db.insert_shopping_item(
                &ingredient.name,
                qty.as_deref(),
                Some(recipe.id),
            )?);
        }
        Ok(added)
    }

    pub fn set_shopping_item_checked(&self, id: i64, checked: bool) -> Result<bool> {
        self.db.set_shopping_item_checked(id, checked)
    }

    pub fn remove_shopping_item(&self, id: i64) -> Result<bool> {
        self.db.delete_shopping_item(id)
    }

    pub fn clear_checked_items(&self) -> Result<usize> {
        self.db.clear_checked_shopping_items()
    }
}

impl StepRunner for LarderService {
    fn run_step(&self, step: DeriveStep) -> Result<()> {
        match step {
            DeriveStep::EnsureStaples { recipe_id } => self.ensure_staples(recipe_id).map(drop),
            DeriveStep::Depletion { recipe_id } => self.run_depletion(recipe_id).map(drop),
            DeriveStep::FrequencyRanks => self.recompute_frequency_ranks().map(drop),
        }
    }
}
