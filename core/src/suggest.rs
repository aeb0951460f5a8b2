//! Day-of-week recipe suggestions.
//!
//! Looks at what was cooked on the same weekday over the last two weeks and
//! proposes the first of those recipes the pantry can cover, plus a short
//! list of alternatives. Pure and deterministic: identical inputs give an
//! identical primary and alternative ordering.

use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::coverage::{Coverage, EmptyEssentials, PantryIndex};
use crate::models::{PantryStaple, Recipe};

pub const LOOKBACK_DAYS: i64 = 14;
pub const MAX_ALTERNATIVES: usize = 5;
/// How many of the top weekday candidates may appear as alternatives.
pub const WEEKDAY_ALTERNATIVES: usize = 3;

pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// A logged meal as the engine sees it, with the time in the household's local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealOccurrence {
    pub recipe_id: i64,
    pub consumed: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionReason {
    /// Regularly cooked on this weekday and the pantry covers it.
    Weekday {
        weekday: &'static str,
        on_weekday: usize,
        recent: usize,
    },
    /// Regularly cooked on this weekday but essentials are running low.
    WeekdayLowStock {
        weekday: &'static str,
        on_weekday: usize,
    },
    RecentHistory { meal_count: usize },
    LowStock,
}

impl fmt::Display for SuggestionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekday {
                weekday,
                on_weekday,
                recent,
            } => write!(
                f,
                "You often have this on {weekday}s. Cooked {on_weekday}\u{d7} on {weekday}s, {recent}\u{d7} in the last 2 weeks."
            ),
            Self::WeekdayLowStock {
                weekday,
                on_weekday,
            } => write!(
                f,
                "Uses staples you're low on, consider restocking. Cooked {on_weekday}\u{d7} on {weekday}s."
            ),
            Self::RecentHistory { meal_count } => {
                write!(f, "Cooked {meal_count}\u{d7} in recent history.")
            }
            Self::LowStock => f.write_str("Uses staples you're low on."),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub recipe: Recipe,
    pub coverage: Coverage,
    pub reason: SuggestionReason,
    pub message: String,
}

impl Suggestion {
    fn new(recipe: &Recipe, coverage: Coverage, reason: SuggestionReason) -> Self {
        Self {
            recipe: recipe.clone(),
            coverage,
            message: reason.to_string(),
            reason,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Suggestions {
    Available {
        primary: Option<Suggestion>,
        alternatives: Vec<Suggestion>,
    },
    /// Not enough history or catalog to say anything.
    NothingToSuggest,
}

impl Suggestions {
    #[must_use]
    pub fn primary(&self) -> Option<&Suggestion> {
        match self {
            Self::Available { primary, .. } => primary.as_ref(),
            Self::NothingToSuggest => None,
        }
    }

    #[must_use]
    pub fn alternatives(&self) -> &[Suggestion] {
        match self {
            Self::Available { alternatives, .. } => alternatives,
            Self::NothingToSuggest => &[],
        }
    }
}

#[derive(Default)]
struct Counts {
    on_weekday: usize,
    recent: usize,
}

#[must_use]
pub fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_sunday() as usize
}

/// Suggest what to cook on `target`.
///
/// `history` may arrive in any order; meals whose recipe is not in `catalog`
/// (quick notes, deleted recipes) are ignored. The window covers the
/// [`LOOKBACK_DAYS`] days before `target` through the end of `target`.
#[must_use]
pub fn suggest(
    target: NaiveDate,
    history: &[MealOccurrence],
    catalog: &[Recipe],
    staples: &[PantryStaple],
) -> Suggestions {
    let catalog: Vec<&Recipe> = catalog.iter().filter(|r| !r.is_quick_note()).collect();
    let by_id: HashMap<i64, &Recipe> = catalog.iter().map(|r| (r.id, *r)).collect();
    let pantry = PantryIndex::new(staples);
    let coverage_of = |r: &Recipe| Coverage::of(r, &pantry);

    let mut meals: Vec<&MealOccurrence> = history
        .iter()
        .filter(|m| by_id.contains_key(&m.recipe_id))
        .collect();
    meals.sort_by(|a, b| b.consumed.cmp(&a.consumed));

    let dow = weekday_index(target);
    let weekday = DAY_NAMES[dow];
    let window_start = target - Duration::days(LOOKBACK_DAYS);

    let mut counts: HashMap<i64, Counts> = HashMap::new();
    let mut weekday_order: Vec<i64> = Vec::new();
    let mut lifetime: HashMap<i64, usize> = HashMap::new();
    for meal in &meals {
        *lifetime.entry(meal.recipe_id).or_default() += 1;

        let day = meal.consumed.date();
        if day < window_start || day > target {
            continue;
        }
        let entry = counts.entry(meal.recipe_id).or_default();
        entry.recent += 1;
        if weekday_index(day) == dow {
            if entry.on_weekday == 0 {
                weekday_order.push(meal.recipe_id);
            }
            entry.on_weekday += 1;
        }
    }

    // Stable: equal counts keep most-recent-first order.
    weekday_order.sort_by(|a, b| counts[b].on_weekday.cmp(&counts[a].on_weekday));
    let candidates: Vec<&Recipe> = weekday_order.iter().map(|id| by_id[id]).collect();

    let primary = if candidates.is_empty() {
        catalog
            .iter()
            .filter(|r| coverage_of(r).meets_threshold(EmptyEssentials::FullyCovered))
            .fold(None::<(&Recipe, usize)>, |best, r| {
                let n = lifetime.get(&r.id).copied().unwrap_or(0);
                match best {
                    Some((_, best_n)) if best_n >= n => best,
                    _ => Some((*r, n)),
                }
            })
            .map(|(r, meal_count)| {
                Suggestion::new(r, coverage_of(r), SuggestionReason::RecentHistory { meal_count })
            })
    } else {
        let covered = candidates
            .iter()
            .find(|r| coverage_of(r).meets_threshold(EmptyEssentials::FullyCovered));
        let on_weekday = |r: &Recipe| counts[&r.id].on_weekday;
        match covered {
            Some(r) => Some(Suggestion::new(
                r,
                coverage_of(r),
                SuggestionReason::Weekday {
                    weekday,
                    on_weekday: on_weekday(r),
                    recent: counts[&r.id].recent,
                },
            )),
            None => {
                let r = candidates[0];
                Some(Suggestion::new(
                    r,
                    coverage_of(r),
                    SuggestionReason::WeekdayLowStock {
                        weekday,
                        on_weekday: on_weekday(r),
                    },
                ))
            }
        }
    };

    let primary_id = primary.as_ref().map(|p| p.recipe.id);
    let mut alternatives: Vec<Suggestion> = Vec::new();
    let taken = |alts: &[Suggestion], id: i64| {
        primary_id == Some(id) || alts.iter().any(|a| a.recipe.id == id)
    };

    for r in candidates.iter().take(WEEKDAY_ALTERNATIVES) {
        if taken(&alternatives, r.id) {
            continue;
        }
        let coverage = coverage_of(r);
        let on_weekday = counts[&r.id].on_weekday;
        let reason = if coverage.is_low() {
            SuggestionReason::WeekdayLowStock {
                weekday,
                on_weekday,
            }
        } else {
            SuggestionReason::Weekday {
                weekday,
                on_weekday,
                recent: counts[&r.id].recent,
            }
        };
        alternatives.push(Suggestion::new(r, coverage, reason));
    }

    for r in &catalog {
        if alternatives.len() >= MAX_ALTERNATIVES {
            break;
        }
        if taken(&alternatives, r.id) {
            continue;
        }
        let coverage = coverage_of(r);
        let reason = if coverage.is_low() {
            SuggestionReason::LowStock
        } else {
            SuggestionReason::RecentHistory {
                meal_count: lifetime.get(&r.id).copied().unwrap_or(0),
            }
        };
        alternatives.push(Suggestion::new(r, coverage, reason));
    }

    if primary.is_none() && alternatives.is_empty() {
        return Suggestions::NothingToSuggest;
    }
    Suggestions::Available {
        primary,
        alternatives,
    }
}
