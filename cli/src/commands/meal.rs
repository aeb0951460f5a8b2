use anyhow::Result;
use chrono::{DateTime, Local, Utc};

use larder_core::models::{MealHistory, NewMealLog, QUICK_NOTE_TITLE, SUGGESTED_TAGS};
use larder_core::pipeline::WriteReport;
use larder_core::service::{LarderService, local_noon};

use super::helpers::{parse_date, print_json, print_meal_table};
use super::{exit_not_found, resolve_recipe, warn_failed_steps};

/// Meals logged for today are stamped now; other days at local noon.
fn consumed_at(date: Option<String>) -> Result<DateTime<Utc>> {
    let day = parse_date(date)?;
    if day == Local::now().date_naive() {
        Ok(Utc::now())
    } else {
        Ok(local_noon(day))
    }
}

fn print_logged(report: &WriteReport<MealHistory>, json: bool) -> Result<()> {
    warn_failed_steps(report);
    if json {
        return print_json(report);
    }
    let meal = &report.record;
    let what = if meal.recipe_title.as_deref() == Some(QUICK_NOTE_TITLE) {
        meal.note.as_deref()
    } else {
        meal.recipe_title.as_deref()
    }
    .unwrap_or("?");
    let when = meal.consumed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
    let id = meal.id;
    println!("Logged {what} at {when} (id: {id})");
    if meal.tags.is_empty() {
        let suggested = SUGGESTED_TAGS.join(", ");
        println!("Tip: tag meals with --tag (e.g. {suggested})");
    }
    Ok(())
}

pub(crate) fn cmd_log(
    svc: &LarderService,
    recipe: &str,
    date: Option<String>,
    tags: Vec<String>,
    note: Option<String>,
    user_id: &str,
    json: bool,
) -> Result<()> {
    let recipe = resolve_recipe(svc, recipe, json)?;
    let report = svc.log_meal(NewMealLog {
        recipe_id: recipe.id,
        user_id: user_id.to_string(),
        consumed_at: consumed_at(date)?,
        note,
        tags,
    })?;
    print_logged(&report, json)
}

pub(crate) fn cmd_note(
    svc: &LarderService,
    text: &str,
    date: Option<String>,
    tags: Vec<String>,
    user_id: &str,
    json: bool,
) -> Result<()> {
    let report = svc.log_quick_note(text, user_id, consumed_at(date)?, tags)?;
    print_logged(&report, json)
}

pub(crate) fn cmd_reuse(
    svc: &LarderService,
    date: Option<String>,
    user_id: &str,
    json: bool,
) -> Result<()> {
    let day = parse_date(date)?;
    match svc.reuse_last_weekday_meal(day, user_id)? {
        Some(report) => print_logged(&report, json),
        None => {
            let weekday = day.format("%A");
            exit_not_found(
                &format!("No meal found on a previous {weekday} in the last two months"),
                json,
            )
        }
    }
}

pub(crate) fn cmd_history(
    svc: &LarderService,
    date: Option<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let meals = match date {
        Some(d) => svc.meals_on(parse_date(Some(d))?)?,
        None => svc.recent_meals(limit)?,
    };
    if json {
        return print_json(&meals);
    }
    if meals.is_empty() {
        eprintln!("No meals logged");
        return Ok(());
    }
    print_meal_table(&meals);
    Ok(())
}
