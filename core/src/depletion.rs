use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{PantryStaple, PantryStatus, Recipe, normalize_name};

/// Lifetime meals at which a staple is considered half used.
pub const HALF_AFTER_MEALS: usize = 3;
/// Lifetime meals at which a staple is considered low.
pub const LOW_AFTER_MEALS: usize = 5;

/// Map a lifetime meal count to a staple status.
///
/// Below [`HALF_AFTER_MEALS`] the current status is kept. Never yields `Out`.
#[must_use]
pub fn status_from_meal_count(meal_count: usize, current: PantryStatus) -> PantryStatus {
    if meal_count >= LOW_AFTER_MEALS {
        PantryStatus::Low
    } else if meal_count >= HALF_AFTER_MEALS {
        PantryStatus::Half
    } else {
        current
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub staple_id: i64,
    pub name: String,
    pub from: PantryStatus,
    pub to: PantryStatus,
    pub meal_count: usize,
}

/// Number of logged meals whose recipe uses the ingredient `key`.
#[must_use]
pub fn meal_count_for(
    key: &str,
    meal_recipe_ids: &[i64],
    recipes_by_id: &HashMap<i64, &Recipe>,
) -> usize {
    meal_recipe_ids
        .iter()
        .filter(|id| {
            recipes_by_id
                .get(id)
                .is_some_and(|r| r.contains_ingredient(key))
        })
        .count()
}

/// Status updates owed after a meal of `recipe` was logged.
///
/// Only ingredients that already have a staple are considered, and a staple
/// only ever moves towards depleted: a higher meal count never restocks it.
#[must_use]
pub fn plan_depletion(
    recipe: &Recipe,
    staples: &[PantryStaple],
    catalog: &[Recipe],
    meal_recipe_ids: &[i64],
) -> Vec<StatusChange> {
    let staples_by_key: HashMap<String, &PantryStaple> = staples
        .iter()
        .map(|s| (normalize_name(&s.name), s))
        .collect();
    let recipes_by_id: HashMap<i64, &Recipe> = catalog.iter().map(|r| (r.id, r)).collect();

    let keys: BTreeSet<String> = recipe.ingredient_keys().into_iter().collect();
    let mut changes = Vec::new();
    for key in keys {
        let Some(staple) = staples_by_key.get(&key) else {
            continue;
        };
        let meal_count = meal_count_for(&key, meal_recipe_ids, &recipes_by_id);
        let next = status_from_meal_count(meal_count, staple.status);
        if next.depletion_level() > staple.status.depletion_level() {
            changes.push(StatusChange {
                staple_id: staple.id,
                name: staple.name.clone(),
                from: staple.status,
                to: next,
                meal_count,
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{recipe, staple};

    #[test]
    fn test_status_from_meal_count_thresholds() {
        for current in PantryStatus::ALL {
            assert_eq!(status_from_meal_count(0, current), current);
            assert_eq!(status_from_meal_count(2, current), current);
            assert_eq!(status_from_meal_count(3, current), PantryStatus::Half);
            assert_eq!(status_from_meal_count(4, current), PantryStatus::Half);
            assert_eq!(status_from_meal_count(5, current), PantryStatus::Low);
            assert_eq!(status_from_meal_count(50, current), PantryStatus::Low);
        }
    }

    #[test]
    fn test_status_from_meal_count_never_out() {
        for count in 0..20 {
            assert_ne!(
                status_from_meal_count(count, PantryStatus::Full),
                PantryStatus::Out
            );
        }
    }

    #[test]
    fn test_garlic_goes_half_then_low() {
        let pasta = recipe(1, "Pasta", &["Garlic", "pasta"]);
        let catalog = vec![pasta.clone()];
        let mut garlic = staple(10, "garlic", PantryStatus::Full);

        let changes = plan_depletion(&pasta, &[garlic.clone()], &catalog, &[1, 1]);
        assert!(changes.is_empty());

        let changes = plan_depletion(&pasta, &[garlic.clone()], &catalog, &[1, 1, 1]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].to, PantryStatus::Half);
        assert_eq!(changes[0].meal_count, 3);

        garlic.status = PantryStatus::Half;
        let changes = plan_depletion(&pasta, &[garlic.clone()], &catalog, &[1; 5]);
        assert_eq!(changes[0].from, PantryStatus::Half);
        assert_eq!(changes[0].to, PantryStatus::Low);

        garlic.status = PantryStatus::Low;
        assert!(plan_depletion(&pasta, &[garlic], &catalog, &[1; 9]).is_empty());
    }

    #[test]
    fn test_count_spans_every_recipe_with_ingredient() {
        let pasta = recipe(1, "Pasta", &["garlic"]);
        let stir_fry = recipe(2, "Stir fry", &[" GARLIC "]);
        let salad = recipe(3, "Salad", &["lettuce"]);
        let catalog = vec![pasta.clone(), stir_fry, salad];
        let staples = [staple(10, "Garlic", PantryStatus::Full)];

        let changes = plan_depletion(&pasta, &staples, &catalog, &[1, 2, 3, 3, 2]);
        assert_eq!(changes[0].meal_count, 3);
        assert_eq!(changes[0].to, PantryStatus::Half);
    }

    #[test]
    fn test_untracked_ingredients_skipped() {
        let pasta = recipe(1, "Pasta", &["garlic"]);
        let catalog = vec![pasta.clone()];
        assert!(plan_depletion(&pasta, &[], &catalog, &[1; 6]).is_empty());
    }

    #[test]
    fn test_recipe_without_ingredients_is_noop() {
        let empty = recipe(1, "Toast", &[]);
        let staples = [staple(10, "bread", PantryStatus::Full)];
        assert!(plan_depletion(&empty, &staples, &[empty.clone()], &[1; 6]).is_empty());
    }

    #[test]
    fn test_out_is_not_restored() {
        let pasta = recipe(1, "Pasta", &["garlic"]);
        let staples = [staple(10, "garlic", PantryStatus::Out)];
        assert!(plan_depletion(&pasta, &staples, &[pasta.clone()], &[1; 6]).is_empty());
    }

    #[test]
    fn test_partial_name_does_not_match() {
        let dressing = recipe(1, "Dressing", &["olive oil"]);
        let staples = [staple(10, "oil", PantryStatus::Full)];
        assert!(plan_depletion(&dressing, &staples, &[dressing.clone()], &[1; 6]).is_empty());
    }
}
