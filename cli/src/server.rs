use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::openai::OpenAiExtractor;
use larder_core::extract::ExtractError;
use larder_core::models::{
    Ingredient, MealHistory, NewMealLog, NewRecipe, PantryStaple, PantryStatus, Recipe,
    ShoppingListItem, validate_title,
};
use larder_core::pipeline::WriteReport;
use larder_core::service::{LarderService, local_noon};
use larder_core::suggest::Suggestions;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB
const RECENT_MEALS_LIMIT: usize = 50;

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<LarderService>>,
    extractor: Arc<OpenAiExtractor>,
    user_id: String,
    api_key: Option<String>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, LarderService> {
        self.svc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateRecipeRequest {
    title: String,
    #[serde(default)]
    instructions: String,
    #[serde(default)]
    ingredients: Vec<Ingredient>,
    source_url: Option<String>,
}

#[derive(Deserialize)]
struct UpdateIngredientsRequest {
    ingredients: Vec<Ingredient>,
}

#[derive(Deserialize)]
struct RecipeShoppingRequest {
    only: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ImportRecipeRequest {
    url: String,
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

#[derive(Deserialize)]
struct MealsQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct CreateMealRequest {
    recipe_id: i64,
    consumed_at: Option<DateTime<Utc>>,
    date: Option<String>,
    note: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct QuickNoteRequest {
    note: String,
    consumed_at: Option<DateTime<Utc>>,
    date: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct ReuseRequest {
    date: Option<String>,
}

#[derive(Deserialize)]
struct SetStatusRequest {
    status: String,
}

#[derive(Deserialize)]
struct AddShoppingItemRequest {
    name: String,
    qty: Option<String>,
}

#[derive(Deserialize)]
struct UpdateShoppingItemRequest {
    checked: bool,
}

#[derive(Serialize)]
struct ClearedResponse {
    removed: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::MissingApiKey | ExtractError::Provider(_) => Self::Internal(err.into()),
            ExtractError::Fetch(_)
            | ExtractError::EmptyResponse
            | ExtractError::InvalidJson(_)
            | ExtractError::InvalidStructure(_) => Self::BadRequest(err.to_string()),
        }
    }
}

fn parse_day(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

/// An explicit timestamp wins, then local noon of `date`, then now.
fn meal_time(
    consumed_at: Option<DateTime<Utc>>,
    date: Option<&str>,
) -> Result<DateTime<Utc>, ApiError> {
    match (consumed_at, date) {
        (Some(ts), _) => Ok(ts),
        (None, Some(d)) => Ok(local_noon(parse_day(d)?)),
        (None, None) => Ok(Utc::now()),
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Recipes ---

async fn list_recipes(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    let recipes = state.svc().list_recipes(query.search.as_deref())?;
    Ok(Json(recipes))
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<WriteReport<Recipe>>), ApiError> {
    validate_title(&req.title).map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let report = state.svc().create_recipe(NewRecipe {
        title: req.title,
        instructions: req.instructions,
        ingredients: req.ingredients,
        source_url: req.source_url,
    })?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Recipe>, ApiError> {
    let recipe = state
        .svc()
        .get_recipe(id)
        .map_err(|_| ApiError::NotFound(format!("Recipe {id} not found")))?;
    Ok(Json(recipe))
}

/// Recipes whose ingredients may be edited or shopped for.
fn ingredient_recipe(svc: &LarderService, id: i64) -> Result<Recipe, ApiError> {
    let recipe = svc
        .get_recipe(id)
        .map_err(|_| ApiError::NotFound(format!("Recipe {id} not found")))?;
    if recipe.is_quick_note() {
        return Err(ApiError::BadRequest(format!(
            "Recipe {id} is the quick-note placeholder and has no ingredients"
        )));
    }
    Ok(recipe)
}

async fn update_recipe_ingredients(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateIngredientsRequest>,
) -> Result<Json<WriteReport<Recipe>>, ApiError> {
    let svc = state.svc();
    ingredient_recipe(&svc, id)?;
    let report = svc.update_recipe_ingredients(id, req.ingredients)?;
    Ok(Json(report))
}

async fn add_recipe_to_shopping_list(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<RecipeShoppingRequest>,
) -> Result<(StatusCode, Json<Vec<ShoppingListItem>>), ApiError> {
    let svc = state.svc();
    ingredient_recipe(&svc, id)?;
    let items = svc.add_recipe_to_shopping_list(id, req.only.as_deref())?;
    Ok((StatusCode::CREATED, Json(items)))
}

async fn import_recipe(
    State(state): State<AppState>,
    Json(req): Json<ImportRecipeRequest>,
) -> Result<(StatusCode, Json<WriteReport<Recipe>>), ApiError> {
    let url = req.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::BadRequest(
            "url must start with http:// or https://".to_string(),
        ));
    }

    // The store is not locked while the page is fetched and extracted.
    let extracted = state.extractor.extract_url(url).await?;
    let report = state.svc().save_extracted_recipe(extracted, Some(url))?;
    Ok((StatusCode::CREATED, Json(report)))
}

// --- Meals ---

async fn list_meals(
    State(state): State<AppState>,
    Query(query): Query<MealsQuery>,
) -> Result<Json<Vec<MealHistory>>, ApiError> {
    let meals = match query.date.as_deref() {
        Some(d) => {
            let day = parse_day(d)?;
            state.svc().meals_on(day)?
        }
        None => state.svc().recent_meals(RECENT_MEALS_LIMIT)?,
    };
    Ok(Json(meals))
}

async fn create_meal(
    State(state): State<AppState>,
    Json(req): Json<CreateMealRequest>,
) -> Result<(StatusCode, Json<WriteReport<MealHistory>>), ApiError> {
    let consumed_at = meal_time(req.consumed_at, req.date.as_deref())?;

    let svc = state.svc();
    svc.get_recipe(req.recipe_id).map_err(|_| {
        ApiError::BadRequest(format!("Recipe with id {} not found", req.recipe_id))
    })?;

    let report = svc.log_meal(NewMealLog {
        recipe_id: req.recipe_id,
        user_id: state.user_id.clone(),
        consumed_at,
        note: req.note,
        tags: req.tags,
    })?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn create_quick_note(
    State(state): State<AppState>,
    Json(req): Json<QuickNoteRequest>,
) -> Result<(StatusCode, Json<WriteReport<MealHistory>>), ApiError> {
    if req.note.trim().is_empty() {
        return Err(ApiError::BadRequest("note must not be empty".to_string()));
    }
    let consumed_at = meal_time(req.consumed_at, req.date.as_deref())?;
    let report = state
        .svc()
        .log_quick_note(&req.note, &state.user_id, consumed_at, req.tags)?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn reuse_meal(
    State(state): State<AppState>,
    Json(req): Json<ReuseRequest>,
) -> Result<(StatusCode, Json<WriteReport<MealHistory>>), ApiError> {
    let day = match req.date.as_deref() {
        Some(d) => parse_day(d)?,
        None => chrono::Local::now().date_naive(),
    };
    let report = state
        .svc()
        .reuse_last_weekday_meal(day, &state.user_id)?
        .ok_or_else(|| {
            let weekday = day.format("%A");
            ApiError::NotFound(format!("No meal found on a previous {weekday}"))
        })?;
    Ok((StatusCode::CREATED, Json(report)))
}

// --- Pantry ---

async fn list_staples(State(state): State<AppState>) -> Result<Json<Vec<PantryStaple>>, ApiError> {
    Ok(Json(state.svc().list_staples()?))
}

async fn stock_up(State(state): State<AppState>) -> Result<Json<Vec<PantryStaple>>, ApiError> {
    Ok(Json(state.svc().stock_up()?))
}

async fn mark_stocked(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PantryStaple>, ApiError> {
    let svc = state.svc();
    svc.get_staple(id)
        .map_err(|_| ApiError::NotFound(format!("Staple {id} not found")))?;
    Ok(Json(svc.mark_staple_stocked(id)?))
}

async fn set_staple_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<PantryStaple>, ApiError> {
    let status: PantryStatus = req
        .status
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let svc = state.svc();
    svc.get_staple(id)
        .map_err(|_| ApiError::NotFound(format!("Staple {id} not found")))?;
    Ok(Json(svc.set_staple_status(id, status)?))
}

// --- Decisions ---

async fn get_suggestions(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Suggestions>, ApiError> {
    let day = parse_day(&date)?;
    Ok(Json(state.svc().suggest(day)?))
}

/// `null` when nothing in the catalog is covered by the pantry.
async fn get_surprise(State(state): State<AppState>) -> Result<Json<Option<Recipe>>, ApiError> {
    let picked = state.svc().surprise(&mut rand::rng())?;
    Ok(Json(picked))
}

// --- Shopping list ---

async fn list_shopping(
    State(state): State<AppState>,
) -> Result<Json<Vec<ShoppingListItem>>, ApiError> {
    Ok(Json(state.svc().shopping_list()?))
}

async fn add_shopping_item(
    State(state): State<AppState>,
    Json(req): Json<AddShoppingItemRequest>,
) -> Result<(StatusCode, Json<ShoppingListItem>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    let item = state
        .svc()
        .add_shopping_item(&req.name, req.qty.as_deref())?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_shopping_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateShoppingItemRequest>,
) -> Result<StatusCode, ApiError> {
    if state.svc().set_shopping_item_checked(id, req.checked)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Shopping list item {id} not found")))
    }
}

async fn delete_shopping_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.svc().remove_shopping_item(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Shopping list item {id} not found")))
    }
}

async fn clear_checked(State(state): State<AppState>) -> Result<Json<ClearedResponse>, ApiError> {
    let removed = state.svc().clear_checked_items()?;
    Ok(Json(ClearedResponse { removed }))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route("/api/recipes/import", post(import_recipe))
        .route("/api/recipes/{id}", get(get_recipe))
        .route(
            "/api/recipes/{id}/ingredients",
            put(update_recipe_ingredients),
        )
        .route(
            "/api/recipes/{id}/shopping-list",
            post(add_recipe_to_shopping_list),
        )
        .route("/api/meals", get(list_meals).post(create_meal))
        .route("/api/meals/quick-note", post(create_quick_note))
        .route("/api/meals/reuse", post(reuse_meal))
        .route("/api/pantry", get(list_staples))
        .route("/api/pantry/stock-up", get(stock_up))
        .route("/api/pantry/{id}/stocked", post(mark_stocked))
        .route("/api/pantry/{id}/status", put(set_staple_status))
        .route("/api/suggestions/{date}", get(get_suggestions))
        .route("/api/surprise", get(get_surprise))
        .route(
            "/api/shopping-list",
            get(list_shopping).post(add_shopping_item),
        )
        .route(
            "/api/shopping-list/{id}",
            put(update_shopping_item).delete(delete_shopping_item),
        )
        .route("/api/shopping-list/clear-checked", post(clear_checked))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of the key, or a mask when it is too short to show.
fn key_preview(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub async fn start_server(
    svc: LarderService,
    extractor: OpenAiExtractor,
    user_id: String,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        extractor: Arc::new(extractor),
        user_id,
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        let preview = key_preview(key);
        eprintln!("API key: {preview} (see api_key file in data directory)");
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    tracing::info!(%bind, port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}
