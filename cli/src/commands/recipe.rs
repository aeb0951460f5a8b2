use std::path::Path;

use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use crate::cooklang_import::CooklangExtractor;
use crate::openai::OpenAiExtractor;
use larder_core::models::{NewRecipe, Recipe, RecipeMealCount, normalize_name};
use larder_core::pipeline::WriteReport;
use larder_core::service::LarderService;

use super::helpers::{describe_ingredient, parse_ingredient, print_json, truncate};
use super::{exit_not_found, resolve_recipe, warn_failed_steps};

fn print_saved(report: &WriteReport<Recipe>, verb: &str, json: bool) -> Result<()> {
    warn_failed_steps(report);
    if json {
        return print_json(report);
    }
    let recipe = &report.record;
    let title = &recipe.title;
    let id = recipe.id;
    let count = recipe.ingredients.len();
    println!("{verb} recipe: {title} (id: {id}, {count} ingredients)");
    Ok(())
}

pub(crate) fn cmd_recipe_add(
    svc: &LarderService,
    title: &str,
    ingredients: &[String],
    instructions: Option<String>,
    source_url: Option<String>,
    json: bool,
) -> Result<()> {
    let ingredients = ingredients
        .iter()
        .map(|s| parse_ingredient(s))
        .collect::<Result<Vec<_>>>()?;
    let report = svc.create_recipe(NewRecipe {
        title: title.to_string(),
        instructions: instructions.unwrap_or_default(),
        ingredients,
        source_url,
    })?;
    print_saved(&report, "Created", json)
}

fn print_recipe_table(recipes: &[RecipeMealCount]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
        #[tabled(rename = "Essential")]
        essential: usize,
        #[tabled(rename = "Meals")]
        meals: usize,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.recipe.id,
            title: truncate(&r.recipe.title, 35),
            ingredients: r.recipe.ingredients.len(),
            essential: r.recipe.essentials().count(),
            meals: r.meal_count,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn cmd_recipe_list(svc: &LarderService, search: Option<&str>, json: bool) -> Result<()> {
    let recipes = svc.recipe_meal_counts(search)?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        std::process::exit(2);
    }
    if json {
        return print_json(&recipes);
    }
    print_recipe_table(&recipes);
    Ok(())
}

pub(crate) fn cmd_recipe_favorites(
    svc: &LarderService,
    search: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let favorites = svc.favorites(search, limit)?;
    if json {
        return print_json(&favorites);
    }
    if favorites.is_empty() {
        eprintln!("No recipes found");
        return Ok(());
    }
    print_recipe_table(&favorites);
    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &LarderService, title: &str, json: bool) -> Result<()> {
    let recipe = resolve_recipe(svc, title, json)?;
    if json {
        return print_json(&recipe);
    }

    let title = &recipe.title;
    println!("=== {title} ===");
    if let Some(url) = &recipe.source_url {
        println!("  Source: {url}");
    }
    let edits = recipe.edit_count;
    if edits > 0 {
        println!("  Edited {edits} time(s)");
    }

    println!("\n  INGREDIENTS:");
    for ingredient in &recipe.ingredients {
        println!("    - {}", describe_ingredient(ingredient));
    }

    if !recipe.instructions.is_empty() {
        println!("\n  INSTRUCTIONS:");
        for line in recipe.instructions.lines() {
            println!("    {line}");
        }
    }
    Ok(())
}

/// Drop ingredients named in `remove`, then add or replace those in `add`.
pub(crate) fn cmd_recipe_edit(
    svc: &LarderService,
    title: &str,
    remove: &[String],
    add: &[String],
    json: bool,
) -> Result<()> {
    if remove.is_empty() && add.is_empty() {
        anyhow::bail!("Nothing to change. Use --remove <name> or -i <ingredient>");
    }
    let recipe = resolve_recipe(svc, title, json)?;
    let added = add
        .iter()
        .map(|s| parse_ingredient(s))
        .collect::<Result<Vec<_>>>()?;

    let dropped: Vec<String> = remove
        .iter()
        .map(|n| normalize_name(n))
        .chain(added.iter().map(larder_core::models::Ingredient::name_key))
        .collect();
    let mut ingredients: Vec<_> = recipe
        .ingredients
        .into_iter()
        .filter(|i| !dropped.contains(&i.name_key()))
        .collect();
    ingredients.extend(added);

    let report = svc.update_recipe_ingredients(recipe.id, ingredients)?;
    print_saved(&report, "Updated", json)
}

pub(crate) async fn cmd_recipe_import(
    svc: &LarderService,
    extractor: &OpenAiExtractor,
    url: &str,
    json: bool,
) -> Result<()> {
    if !json {
        eprintln!("Fetching {url} ...");
    }
    let extracted = extractor.extract_url(url).await?;
    let report = svc.save_extracted_recipe(extracted, Some(url))?;
    print_saved(&report, "Imported", json)
}

pub(crate) fn cmd_recipe_import_cook(svc: &LarderService, file: &Path, json: bool) -> Result<()> {
    let (extractor, input) = CooklangExtractor::from_file(file)?;
    let report = svc.import_recipe(&extractor, &input, None)?;
    print_saved(&report, "Imported", json)
}

pub(crate) fn cmd_recipe_shop(
    svc: &LarderService,
    title: &str,
    only: &[String],
    json: bool,
) -> Result<()> {
    let recipe = resolve_recipe(svc, title, json)?;
    let only = (!only.is_empty()).then_some(only);
    let added = svc.add_recipe_to_shopping_list(recipe.id, only)?;
    if json {
        return print_json(&added);
    }
    if added.is_empty() {
        exit_not_found("No matching ingredients in recipe", json);
    }
    let count = added.len();
    let title = &recipe.title;
    println!("Added {count} item(s) from {title} to the shopping list");
    Ok(())
}
