use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::models::{Ingredient, MealHistory, PantryStaple, ShoppingListItem};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse `[?]name[=qty [unit]]`, e.g. "flour=2 cups", "?parsley", "salt=pinch".
///
/// A leading `?` marks the ingredient optional. When the amount does not
/// start with a number it is kept as the unit.
pub(crate) fn parse_ingredient(s: &str) -> Result<Ingredient> {
    let s = s.trim();
    let (optional, rest) = match s.strip_prefix('?') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (name, amount) = match rest.split_once('=') {
        Some((name, amount)) => (name.trim(), Some(amount.trim())),
        None => (rest.trim(), None),
    };
    if name.is_empty() {
        bail!("Invalid ingredient '{s}'. Use name, ?name or name=qty [unit]");
    }

    let mut ingredient = if optional {
        Ingredient::optional(name)
    } else {
        Ingredient::essential(name)
    };
    if let Some(amount) = amount.filter(|a| !a.is_empty()) {
        let (first, unit) = match amount.split_once(char::is_whitespace) {
            Some((first, unit)) => (first, Some(unit.trim())),
            None => (amount, None),
        };
        match first.parse::<f64>() {
            Ok(qty) if qty.is_finite() => {
                ingredient = ingredient.with_qty(qty, unit.filter(|u| !u.is_empty()));
            }
            _ => ingredient.unit = Some(amount.to_string()),
        }
    }
    Ok(ingredient)
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// "2 cups flour", "flour (optional)".
pub(crate) fn describe_ingredient(i: &Ingredient) -> String {
    let mut text = match i.quantity_text() {
        Some(q) => format!("{q} {}", i.name),
        None => i.name.clone(),
    };
    if !i.is_essential {
        text.push_str(" (optional)");
    }
    text
}

pub(crate) fn print_staple_table(staples: &[PantryStaple]) {
    #[derive(Tabled)]
    struct StapleRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Rank")]
        rank: i64,
        #[tabled(rename = "Restocked")]
        restocked: String,
    }

    let rows: Vec<StapleRow> = staples
        .iter()
        .map(|s| StapleRow {
            id: s.id,
            name: truncate(&s.name, 30),
            status: s.status.to_string(),
            rank: s.frequency_rank,
            restocked: s
                .last_restocked
                .as_deref()
                .map(|t| t.chars().take(10).collect())
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_meal_table(meals: &[MealHistory]) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "When")]
        when: String,
        #[tabled(rename = "Recipe")]
        recipe: String,
        #[tabled(rename = "Note")]
        note: String,
        #[tabled(rename = "Tags")]
        tags: String,
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: m.id,
            when: m
                .consumed_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            recipe: truncate(m.recipe_title.as_deref().unwrap_or("?"), 30),
            note: m.note.as_deref().map(|n| truncate(n, 30)).unwrap_or_default(),
            tags: m.tags.join(", "),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_shopping_table(items: &[ShoppingListItem]) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = " ")]
        checked: &'static str,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Qty")]
        qty: String,
    }

    let rows: Vec<ItemRow> = items
        .iter()
        .map(|i| ItemRow {
            id: i.id,
            checked: if i.checked { "x" } else { "" },
            name: truncate(&i.name, 35),
            qty: i.qty.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_parse_ingredient_plain() {
        let i = parse_ingredient(" garlic ").unwrap();
        assert_eq!(i.name, "garlic");
        assert!(i.is_essential);
        assert_eq!(i.qty, None);
    }

    #[test]
    fn test_parse_ingredient_with_amount() {
        let i = parse_ingredient("flour=2 cups").unwrap();
        assert_eq!(i.name, "flour");
        assert_eq!(i.qty, Some(2.0));
        assert_eq!(i.unit.as_deref(), Some("cups"));

        let i = parse_ingredient("eggs=3").unwrap();
        assert_eq!(i.qty, Some(3.0));
        assert_eq!(i.unit, None);

        let i = parse_ingredient("salt=a pinch").unwrap();
        assert_eq!(i.qty, None);
        assert_eq!(i.unit.as_deref(), Some("a pinch"));
    }

    #[test]
    fn test_parse_ingredient_optional() {
        let i = parse_ingredient("?parsley=1 bunch").unwrap();
        assert!(!i.is_essential);
        assert_eq!(i.name, "parsley");
        assert_eq!(i.qty, Some(1.0));
    }

    #[test]
    fn test_parse_ingredient_blank_name() {
        assert!(parse_ingredient("?").is_err());
        assert!(parse_ingredient("=2 cups").is_err());
    }

    #[test]
    fn test_describe_ingredient() {
        let i = Ingredient::optional("cilantro").with_qty(1.0, Some("handful"));
        assert_eq!(describe_ingredient(&i), "1 handful cilantro (optional)");
        assert_eq!(describe_ingredient(&Ingredient::essential("rice")), "rice");
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("nope"), r#"{"error":"nope"}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("日清カップヌードル", 8), "日清カップ...");
    }
}
