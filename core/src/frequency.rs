use std::collections::HashMap;

use serde::Serialize;

use crate::models::{PantryStaple, Recipe, normalize_name};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyScore {
    pub staple_id: i64,
    pub name: String,
    pub recipes_containing: usize,
    pub meals_containing: usize,
    pub score: i64,
}

/// Popularity of every named staple: recipes using it times meals of those recipes.
///
/// A full recomputation over the catalog and history. The quick-note sentinel
/// is ignored even if passed in.
#[must_use]
pub fn frequency_scores(
    staples: &[PantryStaple],
    catalog: &[Recipe],
    meal_recipe_ids: &[i64],
) -> Vec<FrequencyScore> {
    let recipes: Vec<&Recipe> = catalog.iter().filter(|r| !r.is_quick_note()).collect();

    let mut meals_per_recipe: HashMap<i64, usize> = HashMap::new();
    for id in meal_recipe_ids {
        *meals_per_recipe.entry(*id).or_default() += 1;
    }

    staples
        .iter()
        .filter_map(|staple| {
            let key = normalize_name(&staple.name);
            if key.is_empty() {
                return None;
            }
            let using: Vec<&&Recipe> = recipes
                .iter()
                .filter(|r| r.contains_ingredient(&key))
                .collect();
            let meals_containing: usize = using
                .iter()
                .map(|r| meals_per_recipe.get(&r.id).copied().unwrap_or(0))
                .sum();
            let recipes_containing = using.len();
            let score = i64::try_from(recipes_containing * meals_containing).unwrap_or(i64::MAX);
            Some(FrequencyScore {
                staple_id: staple.id,
                name: staple.name.clone(),
                recipes_containing,
                meals_containing,
                score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{quick_note, recipe, staple};
    use crate::models::PantryStatus;

    fn score_of(scores: &[FrequencyScore], name: &str) -> i64 {
        scores.iter().find(|s| s.name == name).unwrap().score
    }

    #[test]
    fn test_flour_scores_recipes_times_meals() {
        let catalog = vec![
            recipe(1, "Bread", &["flour", "yeast"]),
            recipe(2, "Pancakes", &["Flour", "milk"]),
            recipe(3, "Pizza", &["flour "]),
            recipe(4, "Cake", &["FLOUR", "sugar"]),
            recipe(5, "Salad", &["lettuce"]),
        ];
        let meals = [1, 1, 2, 3, 4, 4, 5, 5];
        let staples = [staple(1, "flour", PantryStatus::Full)];

        let scores = frequency_scores(&staples, &catalog, &meals);
        assert_eq!(scores[0].recipes_containing, 4);
        assert_eq!(scores[0].meals_containing, 6);
        assert_eq!(scores[0].score, 24);
    }

    #[test]
    fn test_zero_when_either_factor_zero() {
        let catalog = vec![recipe(1, "Bread", &["flour"])];
        let staples = [
            staple(1, "flour", PantryStatus::Full),
            staple(2, "saffron", PantryStatus::Full),
        ];
        let scores = frequency_scores(&staples, &catalog, &[]);
        assert_eq!(score_of(&scores, "flour"), 0);
        assert_eq!(score_of(&scores, "saffron"), 0);

        let scores = frequency_scores(&staples, &catalog, &[1, 1]);
        assert_eq!(score_of(&scores, "flour"), 2);
        assert_eq!(score_of(&scores, "saffron"), 0);
    }

    #[test]
    fn test_blank_staples_skipped() {
        let staples = [
            staple(1, "  ", PantryStatus::Full),
            staple(2, "rice", PantryStatus::Low),
        ];
        let scores = frequency_scores(&staples, &[], &[]);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].staple_id, 2);
    }

    #[test]
    fn test_quick_note_ignored() {
        let mut note = quick_note(9);
        note.ingredients.push(crate::models::Ingredient::essential("rice"));
        let staples = [staple(1, "rice", PantryStatus::Full)];
        let scores = frequency_scores(&staples, &[note], &[9, 9, 9]);
        assert_eq!(scores[0].score, 0);
    }
}
