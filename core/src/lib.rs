pub mod coverage;
pub mod db;
pub mod depletion;
pub mod extract;
pub mod frequency;
pub mod models;
pub mod picker;
pub mod pipeline;
pub mod service;
pub mod suggest;

#[cfg(test)]
mod fixtures;
