//! Builders shared by the engine tests.

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{Ingredient, PantryStaple, PantryStatus, QUICK_NOTE_TITLE, Recipe};

/// Recipe whose ingredients are all essential.
pub fn recipe(id: i64, title: &str, essentials: &[&str]) -> Recipe {
    Recipe {
        id,
        uuid: String::new(),
        title: title.to_string(),
        instructions: String::new(),
        ingredients: essentials.iter().map(|n| Ingredient::essential(n)).collect(),
        source_url: None,
        edit_count: 0,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

pub fn quick_note(id: i64) -> Recipe {
    recipe(id, QUICK_NOTE_TITLE, &[])
}

pub fn staple(id: i64, name: &str, status: PantryStatus) -> PantryStaple {
    PantryStaple {
        id,
        uuid: String::new(),
        name: name.to_string(),
        status,
        last_restocked: None,
        frequency_rank: 0,
        marked_stocked_at: None,
        updated_at: String::new(),
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn evening(y: i32, m: u32, d: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(19, 0, 0).unwrap()
}
