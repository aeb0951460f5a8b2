use anyhow::Result;

use larder_core::models::{PantryStaple, PantryStatus};
use larder_core::service::LarderService;

use super::exit_not_found;
use super::helpers::{print_json, print_staple_table};

fn resolve_staple(svc: &LarderService, name: &str, json: bool) -> Result<PantryStaple> {
    match svc.find_staple(name)? {
        Some(staple) => Ok(staple),
        None => exit_not_found(&format!("Staple '{}' not found", name.trim()), json),
    }
}

pub(crate) fn cmd_pantry_list(svc: &LarderService, json: bool) -> Result<()> {
    let staples = svc.list_staples()?;
    if json {
        return print_json(&staples);
    }
    if staples.is_empty() {
        eprintln!("Pantry is empty. Staples are added when you save recipes.");
        return Ok(());
    }
    print_staple_table(&staples);
    Ok(())
}

pub(crate) fn cmd_pantry_stock_up(svc: &LarderService, json: bool) -> Result<()> {
    let staples = svc.stock_up()?;
    if json {
        return print_json(&staples);
    }
    if staples.is_empty() {
        println!("Nothing to restock");
        return Ok(());
    }
    print_staple_table(&staples);
    Ok(())
}

pub(crate) fn cmd_pantry_stocked(svc: &LarderService, name: &str, json: bool) -> Result<()> {
    let staple = resolve_staple(svc, name, json)?;
    let staple = svc.mark_staple_stocked(staple.id)?;
    if json {
        return print_json(&staple);
    }
    let name = &staple.name;
    println!("Restocked {name}");
    Ok(())
}

pub(crate) fn cmd_pantry_set(
    svc: &LarderService,
    name: &str,
    status: &str,
    json: bool,
) -> Result<()> {
    let status: PantryStatus = status.parse()?;
    let staple = resolve_staple(svc, name, json)?;
    let previous = staple.status;
    let staple = svc.set_staple_status(staple.id, status)?;
    if json {
        return print_json(&staple);
    }
    let name = &staple.name;
    println!("{name}: {previous} -> {status}");
    Ok(())
}

pub(crate) fn cmd_pantry_recompute(svc: &LarderService, json: bool) -> Result<()> {
    let scores = svc.recompute_frequency_ranks()?;
    if json {
        return print_json(&scores);
    }
    let count = scores.len();
    println!("Recomputed frequency ranks for {count} staple(s)");
    Ok(())
}
