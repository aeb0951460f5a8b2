use rand::Rng;
use serde::Serialize;

use crate::coverage::{Coverage, EmptyEssentials, PantryIndex};
use crate::models::{PantryStaple, Recipe};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Candidate<'a> {
    pub recipe: &'a Recipe,
    /// Coverage ratio, at least the coverage threshold.
    pub weight: f64,
}

/// Recipes the pantry can cover, weighted by how well it covers them.
///
/// Recipes without essentials give no signal and are left out, as are
/// recipes under the coverage threshold.
#[must_use]
pub fn eligible_pool<'a>(catalog: &'a [Recipe], staples: &[PantryStaple]) -> Vec<Candidate<'a>> {
    let pantry = PantryIndex::new(staples);
    catalog
        .iter()
        .filter(|r| !r.is_quick_note())
        .filter_map(|recipe| {
            let coverage = Coverage::of(recipe, &pantry);
            if !coverage.meets_threshold(EmptyEssentials::Ineligible) {
                return None;
            }
            let weight = coverage.ratio(EmptyEssentials::Ineligible)?;
            Some(Candidate { recipe, weight })
        })
        .collect()
}

/// Draw one candidate with probability proportional to its weight.
pub fn pick_weighted<'a, R: Rng + ?Sized>(
    pool: &[Candidate<'a>],
    rng: &mut R,
) -> Option<&'a Recipe> {
    let total: f64 = pool.iter().map(|c| c.weight).sum();
    if pool.is_empty() || total <= 0.0 {
        return None;
    }
    let roll = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for candidate in pool {
        cumulative += candidate.weight;
        if cumulative > roll {
            return Some(candidate.recipe);
        }
    }
    // Rounding can leave the roll a hair above the final sum.
    pool.last().map(|c| c.recipe)
}

/// Pick something to cook at random, or `None` when nothing is covered.
pub fn surprise<'a, R: Rng + ?Sized>(
    catalog: &'a [Recipe],
    staples: &[PantryStaple],
    rng: &mut R,
) -> Option<&'a Recipe> {
    pick_weighted(&eligible_pool(catalog, staples), rng)
}
