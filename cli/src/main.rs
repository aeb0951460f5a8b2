mod commands;
mod config;
mod cooklang_import;
mod openai;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_history, cmd_log, cmd_note, cmd_pantry_list, cmd_pantry_recompute, cmd_pantry_set,
    cmd_pantry_stock_up, cmd_pantry_stocked, cmd_recipe_add, cmd_recipe_edit,
    cmd_recipe_favorites, cmd_recipe_import, cmd_recipe_import_cook, cmd_recipe_list,
    cmd_recipe_shop, cmd_recipe_show, cmd_reuse, cmd_shop_add, cmd_shop_check, cmd_shop_clear,
    cmd_shop_list, cmd_shop_remove, cmd_suggest, cmd_surprise,
};
use crate::config::Config;
use crate::openai::OpenAiExtractor;
use larder_core::service::{DEFAULT_FAVORITES_LIMIT, LarderService};

#[derive(Parser)]
#[command(
    name = "larder",
    version,
    about = "Meal log, pantry tracker and dinner picker",
    long_about = "Log what you eat, let the pantry track itself, and get told what to cook."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Log a meal cooked from a recipe
    Log {
        /// Recipe title
        recipe: String,
        /// Date eaten (YYYY-MM-DD or today/yesterday/tomorrow, default: now)
        #[arg(long)]
        date: Option<String>,
        /// Tag for the meal (repeatable), e.g. Quick, Comfort, Healthy
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Free-text note
        #[arg(short, long)]
        note: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a free-text meal that has no recipe
    Note {
        /// What you ate
        text: String,
        /// Date eaten (YYYY-MM-DD or today/yesterday/tomorrow, default: now)
        #[arg(long)]
        date: Option<String>,
        /// Tag for the meal (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cook again what you had on the same weekday last time
    Reuse {
        /// Day to log for (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show logged meals
    History {
        /// Only meals eaten on this day
        #[arg(long)]
        date: Option<String>,
        /// Number of recent meals to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest what to cook based on your weekday habits and pantry
    Suggest {
        /// Day to plan for (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pick a random recipe the pantry can cover
    Surprise {
        /// Also log the picked recipe as eaten now
        #[arg(long)]
        log: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pantry staples
    Pantry {
        #[command(subcommand)]
        command: PantryCommands,
    },
    /// Shopping list
    Shop {
        #[command(subcommand)]
        command: ShopCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Add a recipe
    Add {
        /// Recipe title
        title: String,
        /// Ingredient as name, name=qty [unit], or ?name for optional (repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,
        /// Cooking instructions
        #[arg(long)]
        instructions: Option<String>,
        /// Where the recipe came from
        #[arg(long)]
        source_url: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recipes
    List {
        /// Only titles containing this text
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe
    Show {
        /// Recipe title
        title: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Most-cooked recipes
    Favorites {
        /// Only titles containing this text
        #[arg(short, long)]
        search: Option<String>,
        /// How many to show
        #[arg(short, long, default_value_t = DEFAULT_FAVORITES_LIMIT)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a recipe's ingredients
    Edit {
        /// Recipe title
        title: String,
        /// Ingredient name to remove (repeatable)
        #[arg(long)]
        remove: Vec<String>,
        /// Ingredient to add or replace (repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a recipe from a web page (needs OPENAI_API_KEY)
    Import {
        /// Page URL
        url: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a recipe from a Cooklang (.cook) file
    ImportCook {
        /// Path to the .cook file
        file: std::path::PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipe's ingredients to the shopping list
    Shop {
        /// Recipe title
        title: String,
        /// Only these ingredients (repeatable)
        #[arg(long)]
        only: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PantryCommands {
    /// List all staples
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Staples that are low or out, most urgent first
    StockUp {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a staple as restocked (Full)
    Stocked {
        /// Staple name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set a staple's status: Full, Half, Low, Out
    Set {
        /// Staple name
        name: String,
        /// New status
        status: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompute frequency ranks from the whole history
    Recompute {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ShopCommands {
    /// Show the shopping list
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an item
    Add {
        /// Item name
        name: String,
        /// Quantity text, e.g. "2 cups"
        #[arg(short, long)]
        qty: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Tick an item off
    Check {
        /// Item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Un-tick an item
    Uncheck {
        /// Item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item
    Remove {
        /// Item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove all checked items
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = LarderService::open(&config.db_path)?;
    let user_id = config.user_id.as_str();

    match cli.command {
        Commands::Recipe { command } => match command {
            RecipeCommands::Add {
                title,
                ingredients,
                instructions,
                source_url,
                json,
            } => cmd_recipe_add(&svc, &title, &ingredients, instructions, source_url, json),
            RecipeCommands::List { search, json } => cmd_recipe_list(&svc, search.as_deref(), json),
            RecipeCommands::Show { title, json } => cmd_recipe_show(&svc, &title, json),
            RecipeCommands::Favorites {
                search,
                limit,
                json,
            } => cmd_recipe_favorites(&svc, search.as_deref(), limit, json),
            RecipeCommands::Edit {
                title,
                remove,
                ingredients,
                json,
            } => cmd_recipe_edit(&svc, &title, &remove, &ingredients, json),
            RecipeCommands::Import { url, json } => {
                let extractor = OpenAiExtractor::new(config.extract.clone())?;
                cmd_recipe_import(&svc, &extractor, &url, json).await
            }
            RecipeCommands::ImportCook { file, json } => cmd_recipe_import_cook(&svc, &file, json),
            RecipeCommands::Shop { title, only, json } => {
                cmd_recipe_shop(&svc, &title, &only, json)
            }
        },
        Commands::Log {
            recipe,
            date,
            tags,
            note,
            json,
        } => cmd_log(&svc, &recipe, date, tags, note, user_id, json),
        Commands::Note {
            text,
            date,
            tags,
            json,
        } => cmd_note(&svc, &text, date, tags, user_id, json),
        Commands::Reuse { date, json } => cmd_reuse(&svc, date, user_id, json),
        Commands::History { date, limit, json } => cmd_history(&svc, date, limit, json),
        Commands::Suggest { date, json } => cmd_suggest(&svc, date, json),
        Commands::Surprise { log, json } => cmd_surprise(&svc, log, user_id, json),
        Commands::Pantry { command } => match command {
            PantryCommands::List { json } => cmd_pantry_list(&svc, json),
            PantryCommands::StockUp { json } => cmd_pantry_stock_up(&svc, json),
            PantryCommands::Stocked { name, json } => cmd_pantry_stocked(&svc, &name, json),
            PantryCommands::Set { name, status, json } => {
                cmd_pantry_set(&svc, &name, &status, json)
            }
            PantryCommands::Recompute { json } => cmd_pantry_recompute(&svc, json),
        },
        Commands::Shop { command } => match command {
            ShopCommands::List { json } => cmd_shop_list(&svc, json),
            ShopCommands::Add { name, qty, json } => {
                cmd_shop_add(&svc, &name, qty.as_deref(), json)
            }
            ShopCommands::Check { id, json } => cmd_shop_check(&svc, id, true, json),
            ShopCommands::Uncheck { id, json } => cmd_shop_check(&svc, id, false, json),
            ShopCommands::Remove { id, json } => cmd_shop_remove(&svc, id, json),
            ShopCommands::Clear { json } => cmd_shop_clear(&svc, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            let extractor = OpenAiExtractor::new(config.extract.clone())?;
            server::start_server(svc, extractor, user_id.to_string(), port, &bind, api_key).await
        }
    }
}
