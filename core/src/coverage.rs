use std::collections::HashMap;

use serde::Serialize;

use crate::models::{PantryStaple, PantryStatus, Recipe, normalize_name};

/// Minimum share of essentials in stock for a recipe to count as cookable.
pub const COVERAGE_THRESHOLD: f64 = 0.8;

/// What a recipe with no essential ingredients scores.
///
/// The day-of-week suggestions treat such a recipe as fully covered, while
/// the weighted picker has nothing to weigh it by and leaves it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyEssentials {
    FullyCovered,
    Ineligible,
}

/// Staple statuses keyed by normalized name.
#[derive(Debug, Default)]
pub struct PantryIndex {
    statuses: HashMap<String, PantryStatus>,
}

impl PantryIndex {
    #[must_use]
    pub fn new(staples: &[PantryStaple]) -> Self {
        let statuses = staples
            .iter()
            .map(|s| (normalize_name(&s.name), s.status))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { statuses }
    }

    #[must_use]
    pub fn status(&self, name: &str) -> Option<PantryStatus> {
        self.statuses.get(&normalize_name(name)).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coverage {
    /// Essentials whose staple is Full or Half. Untracked names never count.
    pub ok: usize,
    pub total: usize,
}

impl Coverage {
    #[must_use]
    pub fn of(recipe: &Recipe, pantry: &PantryIndex) -> Self {
        let mut ok = 0;
        let mut total = 0;
        for ingredient in recipe.essentials() {
            total += 1;
            if pantry
                .status(&ingredient.name)
                .is_some_and(PantryStatus::is_adequate)
            {
                ok += 1;
            }
        }
        Self { ok, total }
    }

    /// `None` means the recipe is not eligible at all under `policy`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(self, policy: EmptyEssentials) -> Option<f64> {
        if self.total == 0 {
            return match policy {
                EmptyEssentials::FullyCovered => Some(1.0),
                EmptyEssentials::Ineligible => None,
            };
        }
        Some(self.ok as f64 / self.total as f64)
    }

    #[must_use]
    pub fn meets_threshold(self, policy: EmptyEssentials) -> bool {
        self.ratio(policy).is_some_and(|r| r >= COVERAGE_THRESHOLD)
    }

    /// True when the recipe has essentials and too few of them are stocked.
    #[must_use]
    pub fn is_low(self) -> bool {
        self.total > 0 && !self.meets_threshold(EmptyEssentials::FullyCovered)
    }
}
