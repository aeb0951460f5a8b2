use anyhow::Result;
use chrono::Utc;

use larder_core::models::NewMealLog;
use larder_core::service::LarderService;
use larder_core::suggest::{Suggestion, Suggestions};

use super::helpers::{parse_date, print_json, truncate};
use super::{exit_not_found, warn_failed_steps};

fn coverage_text(s: &Suggestion) -> String {
    let ok = s.coverage.ok;
    let total = s.coverage.total;
    if total == 0 {
        "no essentials".to_string()
    } else {
        format!("{ok}/{total} essentials in stock")
    }
}

pub(crate) fn cmd_suggest(svc: &LarderService, date: Option<String>, json: bool) -> Result<()> {
    let day = parse_date(date)?;
    let suggestions = svc.suggest(day)?;
    if json {
        return print_json(&suggestions);
    }
    if matches!(suggestions, Suggestions::NothingToSuggest) {
        exit_not_found(
            "Nothing to suggest yet. Add some recipes and log a few meals first.",
            json,
        );
    }

    let weekday = day.format("%A");
    println!("=== What to cook on {weekday}, {day} ===\n");
    if let Some(primary) = suggestions.primary() {
        let title = &primary.recipe.title;
        let coverage = coverage_text(primary);
        println!("  {title}  ({coverage})");
        println!("    {}", primary.message);
    }

    let alternatives = suggestions.alternatives();
    if !alternatives.is_empty() {
        println!("\n  Or maybe:");
        for alt in alternatives {
            let title = truncate(&alt.recipe.title, 35);
            let message = &alt.message;
            println!("    - {title}: {message}");
        }
    }
    Ok(())
}

pub(crate) fn cmd_surprise(svc: &LarderService, log: bool, user_id: &str, json: bool) -> Result<()> {
    let Some(recipe) = svc.surprise(&mut rand::rng())? else {
        exit_not_found(
            "Nothing you can cook right now. Restock with `larder pantry stocked <name>`.",
            json,
        );
    };

    if !log {
        if json {
            return print_json(&recipe);
        }
        let title = &recipe.title;
        println!("How about {title}?");
        return Ok(());
    }

    let report = svc.log_meal(NewMealLog {
        recipe_id: recipe.id,
        user_id: user_id.to_string(),
        consumed_at: Utc::now(),
        note: None,
        tags: Vec::new(),
    })?;
    warn_failed_steps(&report);
    if json {
        return print_json(&report);
    }
    let title = &recipe.title;
    println!("Cooking {title} tonight. Logged it for you.");
    Ok(())
}
