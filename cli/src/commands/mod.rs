mod helpers;
mod meal;
mod pantry;
mod recipe;
mod shopping;
mod suggest;

use std::process;

use anyhow::Result;

use larder_core::models::Recipe;
use larder_core::pipeline::WriteReport;
use larder_core::service::LarderService;

use helpers::json_error;

pub(crate) use meal::{cmd_history, cmd_log, cmd_note, cmd_reuse};
pub(crate) use pantry::{
    cmd_pantry_list, cmd_pantry_recompute, cmd_pantry_set, cmd_pantry_stock_up,
    cmd_pantry_stocked,
};
pub(crate) use recipe::{
    cmd_recipe_add, cmd_recipe_edit, cmd_recipe_favorites, cmd_recipe_import,
    cmd_recipe_import_cook, cmd_recipe_list, cmd_recipe_shop, cmd_recipe_show,
};
pub(crate) use shopping::{
    cmd_shop_add, cmd_shop_check, cmd_shop_clear, cmd_shop_list, cmd_shop_remove,
};
pub(crate) use suggest::{cmd_suggest, cmd_surprise};

/// Report a missing record and exit with status 2.
pub(super) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

/// Look a recipe up by title, exiting with status 2 when there is none.
pub(super) fn resolve_recipe(svc: &LarderService, title: &str, json: bool) -> Result<Recipe> {
    match svc.find_recipe_by_title(title)? {
        Some(recipe) => Ok(recipe),
        None => exit_not_found(&format!("Recipe '{}' not found", title.trim()), json),
    }
}

/// Tell the user about derived data that could not be refreshed.
pub(super) fn warn_failed_steps<T>(report: &WriteReport<T>) {
    for outcome in report.derived.iter().filter(|o| !o.succeeded()) {
        let step = outcome.step;
        let error = outcome.error.as_deref().unwrap_or("unknown error");
        eprintln!("Warning: could not update {step}: {error}");
    }
}
