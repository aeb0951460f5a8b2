use anyhow::Result;

use larder_core::service::LarderService;

use super::exit_not_found;
use super::helpers::{print_json, print_shopping_table};

pub(crate) fn cmd_shop_list(svc: &LarderService, json: bool) -> Result<()> {
    let items = svc.shopping_list()?;
    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("Shopping list is empty");
        return Ok(());
    }
    print_shopping_table(&items);
    Ok(())
}

pub(crate) fn cmd_shop_add(
    svc: &LarderService,
    name: &str,
    qty: Option<&str>,
    json: bool,
) -> Result<()> {
    let item = svc.add_shopping_item(name, qty)?;
    if json {
        return print_json(&item);
    }
    let name = &item.name;
    let id = item.id;
    println!("Added {name} (id: {id})");
    Ok(())
}

pub(crate) fn cmd_shop_check(svc: &LarderService, id: i64, checked: bool, json: bool) -> Result<()> {
    if !svc.set_shopping_item_checked(id, checked)? {
        exit_not_found(&format!("Shopping list item {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "id": id, "checked": checked }));
    } else if checked {
        println!("Checked item {id}");
    } else {
        println!("Unchecked item {id}");
    }
    Ok(())
}

pub(crate) fn cmd_shop_remove(svc: &LarderService, id: i64, json: bool) -> Result<()> {
    if !svc.remove_shopping_item(id)? {
        exit_not_found(&format!("Shopping list item {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "removed": id }));
    } else {
        println!("Removed item {id}");
    }
    Ok(())
}

pub(crate) fn cmd_shop_clear(svc: &LarderService, json: bool) -> Result<()> {
    let removed = svc.clear_checked_items()?;
    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!("Cleared {removed} checked item(s)");
    }
    Ok(())
}
