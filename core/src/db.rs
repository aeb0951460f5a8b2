use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ffi, params};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::models::{
    Ingredient, MealHistory, NewMealLog, NewRecipe, PantryStaple, PantryStatus, QUICK_NOTE_TITLE,
    Recipe, ShoppingListItem, normalize_name,
};

const RECIPE_COLUMNS: &str =
    "id, uuid, title, instructions, ingredients, source_url, edit_count, created_at, updated_at";

const MEAL_COLUMNS: &str = "m.id, m.uuid, m.recipe_id, m.user_id, m.consumed_at, m.note, m.tags, m.created_at, r.title";

const STAPLE_COLUMNS: &str = "id, uuid, name, status, last_restocked, frequency_rank, marked_stocked_at, updated_at";

const SHOPPING_COLUMNS: &str = "id, uuid, name, qty, checked, recipe_id, added_at";

pub struct Database {
    conn: Connection,
}

/// Canonical storage form for meal timestamps. Fixed width so text order is time order.
fn timestamp_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Only UNIQUE failures; CHECK, NOT NULL and foreign key failures are real errors.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    instructions TEXT NOT NULL DEFAULT '',
                    ingredients TEXT NOT NULL DEFAULT '[]',
                    source_url TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id),
                    user_id TEXT NOT NULL,
                    consumed_at TEXT NOT NULL,
                    note TEXT,
                    tags TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS pantry_staples (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    name_key TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL DEFAULT 'Full'
                        CHECK (status IN ('Full', 'Half', 'Low', 'Out')),
                    last_restocked TEXT,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_meal_history_consumed_at ON meal_history(consumed_at);
                CREATE INDEX IF NOT EXISTS idx_meal_history_recipe ON meal_history(recipe_id);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "ALTER TABLE recipes ADD COLUMN edit_count INTEGER NOT NULL DEFAULT 0;
                 ALTER TABLE pantry_staples ADD COLUMN frequency_rank INTEGER NOT NULL DEFAULT 0;
                 ALTER TABLE pantry_staples ADD COLUMN marked_stocked_at TEXT;

                 CREATE TABLE IF NOT EXISTS shopping_list_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    qty TEXT,
                    checked INTEGER NOT NULL DEFAULT 0,
                    recipe_id INTEGER REFERENCES recipes(id) ON DELETE SET NULL,
                    added_at TEXT NOT NULL
                 );

                 CREATE INDEX IF NOT EXISTS idx_shopping_list_added_at ON shopping_list_items(added_at);

                 PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            uuid: row.get(1)?,
            title: row.get(2)?,
            instructions: row.get(3)?,
            ingredients: json_column(row, 4)?,
            source_url: row.get(5)?,
            edit_count: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealHistory> {
        let consumed_at: String = row.get(4)?;
        let consumed_at = DateTime::parse_from_rfc3339(&consumed_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);
        Ok(MealHistory {
            id: row.get(0)?,
            uuid: row.get(1)?,
            recipe_id: row.get(2)?,
            user_id: row.get(3)?,
            consumed_at,
            note: row.get(5)?,
            tags: json_column(row, 6)?,
            created_at: row.get(7)?,
            recipe_title: row.get(8)?,
        })
    }

    fn staple_from_row(row: &rusqlite::Row) -> rusqlite::Result<PantryStaple> {
        let status: String = row.get(3)?;
        let status = status
            .parse::<PantryStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
        Ok(PantryStaple {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            status,
            last_restocked: row.get(4)?,
            frequency_rank: row.get(5)?,
            marked_stocked_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn shopping_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingListItem> {
        Ok(ShoppingListItem {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            qty: row.get(3)?,
            checked: row.get(4)?,
            recipe_id: row.get(5)?,
            added_at: row.get(6)?,
        })
    }

    // --- Recipes ---

    pub fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let ingredients = serde_json::to_string(&recipe.ingredients)?;
        self.conn.execute(
            "INSERT INTO recipes (uuid, title, instructions, ingredients, source_url, edit_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
            params![
                uuid,
                recipe.title,
                recipe.instructions,
                ingredients,
                recipe.source_url,
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_recipe(id)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Recipe> {
        self.find_recipe(id)?.context("Recipe not found")
    }

    pub fn find_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::recipe_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn find_recipe_by_title(&self, title: &str) -> Result<Option<Recipe>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE LOWER(TRIM(title)) = ?1 ORDER BY id LIMIT 1"
        ))?;
        let mut rows = stmt.query(params![normalize_name(title)])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::recipe_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_recipe_by_title(&self, title: &str) -> Result<Recipe> {
        self.find_recipe_by_title(title)?
            .with_context(|| format!("Recipe '{}' not found", title.trim()))
    }

    /// Catalog recipes in creation order, the quick-note sentinel excluded.
    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE title != ?1 ORDER BY id"
        ))?;
        let recipes = stmt
            .query_map(params![QUICK_NOTE_TITLE], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    pub fn search_recipes(&self, query: &str) -> Result<Vec<Recipe>> {
        let escaped = query
            .trim()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes
             WHERE title != ?1 AND title LIKE ?2 ESCAPE '\\'
             ORDER BY id"
        ))?;
        let recipes = stmt
            .query_map(params![QUICK_NOTE_TITLE, pattern], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    /// Replace the ingredient list and count the edit.
    pub fn replace_recipe_ingredients(&self, id: i64, ingredients: &[Ingredient]) -> Result<Recipe> {
        let now = Local::now().to_rfc3339();
        let json = serde_json::to_string(ingredients)?;
        let changed = self.conn.execute(
            "UPDATE recipes SET ingredients = ?1, edit_count = edit_count + 1, updated_at = ?2
             WHERE id = ?3",
            params![json, now, id],
        )?;
        if changed == 0 {
            anyhow::bail!("Recipe not found");
        }
        self.get_recipe(id)
    }

    // --- Meal history ---

    pub fn insert_meal(&self, meal: &NewMealLog) -> Result<MealHistory> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let tags = serde_json::to_string(&meal.tags)?;
        self.conn.execute(
            "INSERT INTO meal_history (uuid, recipe_id, user_id, consumed_at, note, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                uuid,
                meal.recipe_id,
                meal.user_id,
                timestamp_text(&meal.consumed_at),
                meal.note,
                tags,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_meal(id)
    }

    pub fn get_meal(&self, id: i64) -> Result<MealHistory> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {MEAL_COLUMNS} FROM meal_history m
                     LEFT JOIN recipes r ON r.id = m.recipe_id
                     WHERE m.id = ?1"
                ),
                params![id],
                Self::meal_from_row,
            )
            .context("Meal not found")
    }

    /// Meals newest first; `limit` of `None` returns the whole log.
    pub fn list_meals(&self, limit: Option<usize>) -> Result<Vec<MealHistory>> {
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_COLUMNS} FROM meal_history m
             LEFT JOIN recipes r ON r.id = m.recipe_id
             ORDER BY m.consumed_at DESC, m.id DESC
             LIMIT ?1"
        ))?;
        let meals = stmt
            .query_map(params![limit], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    /// Meals with `start <= consumed_at < end`, newest first.
    pub fn list_meals_between(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<MealHistory>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_COLUMNS} FROM meal_history m
             LEFT JOIN recipes r ON r.id = m.recipe_id
             WHERE m.consumed_at >= ?1 AND m.consumed_at < ?2
             ORDER BY m.consumed_at DESC, m.id DESC"
        ))?;
        let meals = stmt
            .query_map(
                params![timestamp_text(start), timestamp_text(end)],
                Self::meal_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    /// Recipe id of every logged meal, one entry per meal.
    pub fn meal_recipe_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT recipe_id FROM meal_history ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn meal_counts_by_recipe(&self) -> Result<HashMap<i64, usize>> {
        let mut stmt = self
            .conn
            .prepare("SELECT recipe_id, COUNT(*) FROM meal_history GROUP BY recipe_id")?;
        let counts = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((id, usize::try_from(count).unwrap_or(0)))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    // --- Pantry staples ---

    /// Insert a staple at status Full. Returns `None` when a staple with the
    /// same normalized name already exists.
    pub fn insert_staple(&self, name: &str) -> Result<Option<PantryStaple>> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Staple name must not be empty");
        }
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let inserted = self.conn.execute(
            "INSERT INTO pantry_staples (uuid, name, name_key, status, updated_at)
             VALUES (?1, ?2, ?3, 'Full', ?4)",
            params![uuid, name, normalize_name(name), now],
        );
        match inserted {
            Ok(_) => {
                let id = self.conn.last_insert_rowid();
                Ok(Some(self.get_staple(id)?))
            }
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_staple(&self, id: i64) -> Result<PantryStaple> {
        self.conn
            .query_row(
                &format!("SELECT {STAPLE_COLUMNS} FROM pantry_staples WHERE id = ?1"),
                params![id],
                Self::staple_from_row,
            )
            .context("Staple not found")
    }

    pub fn find_staple_by_name(&self, name: &str) -> Result<Option<PantryStaple>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STAPLE_COLUMNS} FROM pantry_staples WHERE name_key = ?1"
        ))?;
        let mut rows = stmt.query(params![normalize_name(name)])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::staple_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_staples(&self) -> Result<Vec<PantryStaple>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STAPLE_COLUMNS} FROM pantry_staples ORDER BY name_key"
        ))?;
        let staples = stmt
            .query_map([], Self::staple_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(staples)
    }

    /// Low and Out staples: Out first, then by frequency rank, highest first.
    pub fn list_stock_up(&self) -> Result<Vec<PantryStaple>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STAPLE_COLUMNS} FROM pantry_staples
             WHERE status IN ('Low', 'Out')
             ORDER BY CASE status WHEN 'Out' THEN 0 ELSE 1 END, frequency_rank DESC, name_key"
        ))?;
        let staples = stmt
            .query_map([], Self::staple_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(staples)
    }

    pub fn update_staple_status(&self, id: i64, status: PantryStatus) -> Result<PantryStaple> {
        let now = Local::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE pantry_staples SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, id],
        )?;
        if changed == 0 {
            anyhow::bail!("Staple not found");
        }
        self.get_staple(id)
    }

    pub fn mark_staple_stocked(&self, id: i64) -> Result<PantryStaple> {
        let now = Local::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE pantry_staples
             SET status = 'Full', marked_stocked_at = ?1, last_restocked = ?1, updated_at = ?1
             WHERE id = ?2",
            params![now, id],
        )?;
        if changed == 0 {
            anyhow::bail!("Staple not found");
        }
        self.get_staple(id)
    }

    pub fn set_frequency_rank(&self, id: i64, rank: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE pantry_staples SET frequency_rank = ?1 WHERE id = ?2",
            params![rank, id],
        )?;
        Ok(())
    }

    // --- Shopping list ---

    pub fn insert_shopping_item(
        &self,
        name: &str,
        qty: Option<&str>,
        recipe_id: Option<i64>,
    ) -> Result<ShoppingListItem> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO shopping_list_items (uuid, name, qty, checked, recipe_id, added_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
            params![uuid, name, qty, recipe_id, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_shopping_item(id)
    }

    pub fn get_shopping_item(&self, id: i64) -> Result<ShoppingListItem> {
        self.conn
            .query_row(
                &format!("SELECT {SHOPPING_COLUMNS} FROM shopping_list_items WHERE id = ?1"),
                params![id],
                Self::shopping_item_from_row,
            )
            .context("Shopping list item not found")
    }

    pub fn list_shopping_items(&self) -> Result<Vec<ShoppingListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SHOPPING_COLUMNS} FROM shopping_list_items ORDER BY added_at DESC, id DESC"
        ))?;
        let items = stmt
            .query_map([], Self::shopping_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn set_shopping_item_checked(&self, id: i64, checked: bool) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE shopping_list_items SET checked = ?1 WHERE id = ?2",
            params![checked, id],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_shopping_item(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM shopping_list_items WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn clear_checked_shopping_items(&self) -> Result<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM shopping_list_items WHERE checked = 1", [])?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_recipe(title: &str, names: &[&str]) -> NewRecipe {
        NewRecipe {
            title: title.to_string(),
            instructions: "Cook it.".to_string(),
            ingredients: names.iter().map(|n| Ingredient::essential(n)).collect(),
            source_url: None,
        }
    }

    fn meal_at(recipe_id: i64, ts: DateTime<Utc>) -> NewMealLog {
        NewMealLog {
            recipe_id,
            user_id: crate::models::DEFAULT_USER_ID.to_string(),
            consumed_at: ts,
            note: None,
            tags: vec![],
        }
    }

    #[test]
    fn test_insert_and_get_recipe() {
        let db = Database::open_in_memory().unwrap();
        let mut new = sample_recipe("Tacos", &["beef", "cheese"]);
        new.ingredients[1].is_essential = false;
        new.ingredients[0].qty = Some(500.0);
        new.ingredients[0].unit = Some("g".to_string());
        let recipe = db.insert_recipe(&new).unwrap();

        assert_eq!(recipe.title, "Tacos");
        assert_eq!(recipe.edit_count, 0);
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].qty, Some(500.0));
        assert!(!recipe.ingredients[1].is_essential);

        let fetched = db.get_recipe(recipe.id).unwrap();
        assert_eq!(fetched.ingredients, recipe.ingredients);
        assert!(!fetched.uuid.is_empty());
    }

    #[test]
    fn test_get_recipe_missing() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_recipe(42).is_err());
        assert!(db.find_recipe(42).unwrap().is_none());
    }

    #[test]
    fn test_recipe_by_title_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        db.insert_recipe(&sample_recipe("Chili Con Carne", &["beans"]))
            .unwrap();
        let found = db.get_recipe_by_title("  chili con carne ").unwrap();
        assert_eq!(found.title, "Chili Con Carne");
        assert!(db.get_recipe_by_title("chili").is_err());
    }

    #[test]
    fn test_list_recipes_excludes_quick_note() {
        let db = Database::open_in_memory().unwrap();
        db.insert_recipe(&sample_recipe(QUICK_NOTE_TITLE, &[])).unwrap();
        db.insert_recipe(&sample_recipe("Soup", &["leek"])).unwrap();
        db.insert_recipe(&sample_recipe("Salad", &["lettuce"])).unwrap();

        let titles: Vec<String> = db.list_recipes().unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["Soup", "Salad"]);
    }

    #[test]
    fn test_search_recipes_escapes_wildcards() {
        let db = Database::open_in_memory().unwrap();
        db.insert_recipe(&sample_recipe("100% Rye", &["rye"])).unwrap();
        db.insert_recipe(&sample_recipe("Rye Toast", &["rye"])).unwrap();

        assert_eq!(db.search_recipes("rye").unwrap().len(), 2);
        let pct = db.search_recipes("0%").unwrap();
        assert_eq!(pct.len(), 1);
        assert_eq!(pct[0].title, "100% Rye");
    }

    #[test]
    fn test_replace_ingredients_counts_edits() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db
            .insert_recipe(&sample_recipe("Stew", &["beef", "carrot"]))
            .unwrap();
        let edited = db
            .replace_recipe_ingredients(recipe.id, &[Ingredient::essential("beef")])
            .unwrap();
        assert_eq!(edited.edit_count, 1);
        assert_eq!(edited.ingredients.len(), 1);

        let edited = db.replace_recipe_ingredients(recipe.id, &[]).unwrap();
        assert_eq!(edited.edit_count, 2);
        assert!(db.replace_recipe_ingredients(999, &[]).is_err());
    }

    #[test]
    fn test_insert_staple_duplicate_is_none() {
        let db = Database::open_in_memory().unwrap();
        let first = db.insert_staple("Quinoa").unwrap().unwrap();
        assert_eq!(first.status, PantryStatus::Full);
        assert_eq!(first.frequency_rank, 0);

        assert!(db.insert_staple("quinoa").unwrap().is_none());
        assert!(db.insert_staple("  QUINOA ").unwrap().is_none());
        assert_eq!(db.list_staples().unwrap().len(), 1);
    }

    #[test]
    fn test_only_unique_failures_count_as_duplicates() {
        let db = Database::open_in_memory().unwrap();
        db.insert_staple("rice").unwrap();
        let insert = |name_key: &str, status: &str| {
            db.conn
                .execute(
                    "INSERT INTO pantry_staples (uuid, name, name_key, status, updated_at)
                     VALUES (?1, ?2, ?2, ?3, 'now')",
                    params![Uuid::new_v4().to_string(), name_key, status],
                )
                .unwrap_err()
        };

        assert!(is_unique_violation(&insert("rice", "Full")));
        assert!(!is_unique_violation(&insert("beans", "Plenty")));
    }

    #[test]
    fn test_insert_staple_blank_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_staple("  ").is_err());
    }

    #[test]
    fn test_find_staple_by_normalized_name() {
        let db = Database::open_in_memory().unwrap();
        db.insert_staple("Olive Oil").unwrap();
        assert!(db.find_staple_by_name(" olive oil ").unwrap().is_some());
        assert!(db.find_staple_by_name("OLIVE OIL").unwrap().is_some());
        assert!(db.find_staple_by_name("oil").unwrap().is_none());
    }

    #[test]
    fn test_mark_staple_stocked() {
        let db = Database::open_in_memory().unwrap();
        let staple = db.insert_staple("rice").unwrap().unwrap();
        db.update_staple_status(staple.id, PantryStatus::Out).unwrap();

        let stocked = db.mark_staple_stocked(staple.id).unwrap();
        assert_eq!(stocked.status, PantryStatus::Full);
        assert!(stocked.marked_stocked_at.is_some());
        assert_eq!(stocked.marked_stocked_at, stocked.last_restocked);
        assert!(db.mark_staple_stocked(999).is_err());
    }

    #[test]
    fn test_stock_up_ordering() {
        let db = Database::open_in_memory().unwrap();
        for name in ["salt", "flour", "eggs", "milk"] {
            db.insert_staple(name).unwrap();
        }
        let flour = db.find_staple_by_name("flour").unwrap().unwrap();
        let eggs = db.find_staple_by_name("eggs").unwrap().unwrap();
        let milk = db.find_staple_by_name("milk").unwrap().unwrap();
        db.update_staple_status(flour.id, PantryStatus::Low).unwrap();
        db.update_staple_status(eggs.id, PantryStatus::Low).unwrap();
        db.update_staple_status(milk.id, PantryStatus::Out).unwrap();
        db.set_frequency_rank(eggs.id, 10).unwrap();
        db.set_frequency_rank(flour.id, 24).unwrap();

        let names: Vec<String> = db
            .list_stock_up()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["milk", "flour", "eggs"]);
    }

    #[test]
    fn test_meal_round_trip_and_ordering() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.insert_recipe(&sample_recipe("Curry", &["rice"])).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 8, 18, 0, 0).unwrap();

        let mut log = meal_at(recipe.id, early);
        log.tags = vec!["Comfort".to_string()];
        log.note = Some("extra spicy".to_string());
        let first = db.insert_meal(&log).unwrap();
        db.insert_meal(&meal_at(recipe.id, late)).unwrap();

        assert_eq!(first.consumed_at, early);
        assert_eq!(first.tags, vec!["Comfort"]);
        assert_eq!(first.recipe_title.as_deref(), Some("Curry"));

        let meals = db.list_meals(None).unwrap();
        assert_eq!(meals.len(), 2);
        assert_eq!(meals[0].consumed_at, late);
        assert_eq!(db.list_meals(Some(1)).unwrap().len(), 1);

        let window = db
            .list_meals_between(&early, &Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap())
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, first.id);
    }

    #[test]
    fn test_meal_requires_existing_recipe() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_meal(&meal_at(77, Utc::now())).is_err());
    }

    #[test]
    fn test_meal_counts_by_recipe() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_recipe(&sample_recipe("A", &["x"])).unwrap();
        let b = db.insert_recipe(&sample_recipe("B", &["y"])).unwrap();
        let now = Utc::now();
        db.insert_meal(&meal_at(a.id, now)).unwrap();
        db.insert_meal(&meal_at(a.id, now)).unwrap();
        db.insert_meal(&meal_at(b.id, now)).unwrap();

        let counts = db.meal_counts_by_recipe().unwrap();
        assert_eq!(counts.get(&a.id), Some(&2));
        assert_eq!(counts.get(&b.id), Some(&1));
        assert_eq!(db.meal_recipe_ids().unwrap(), vec![a.id, a.id, b.id]);
    }

    #[test]
    fn test_shopping_list_crud() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db.insert_recipe(&sample_recipe("Pie", &["apples"])).unwrap();
        let milk = db.insert_shopping_item("milk", Some("1 l"), None).unwrap();
        let apples = db
            .insert_shopping_item("apples", None, Some(recipe.id))
            .unwrap();
        db.insert_shopping_item("milk", None, None).unwrap();

        assert!(!milk.checked);
        assert_eq!(apples.recipe_id, Some(recipe.id));
        let items = db.list_shopping_items().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name, "milk");
        assert_eq!(items[0].qty, None);

        assert!(db.set_shopping_item_checked(milk.id, true).unwrap());
        assert!(db.get_shopping_item(milk.id).unwrap().checked);
        assert!(!db.set_shopping_item_checked(999, true).unwrap());

        assert_eq!(db.clear_checked_shopping_items().unwrap(), 1);
        assert!(db.delete_shopping_item(apples.id).unwrap());
        assert!(!db.delete_shopping_item(apples.id).unwrap());
        assert_eq!(db.list_shopping_items().unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("larder.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_staple("salt").unwrap();
        }
        let db = Database::open(&path).unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
        assert_eq!(db.list_staples().unwrap().len(), 1);
    }
}
