use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::database::{Database, DatabaseError, RecipeQuery, StoredRecipe};
use crate::food::api::{IngredientMatch, SpoonacularClient, SpoonacularError};
use crate::food::generation::{
    AssembledRecipe, GenerationCause, GenerationError, GenerationErrorKind, GenerationRequest,
    GenerationStage, RecipeAssembler, RecipeDraft, TransportError,
};

/// Header carrying the caller's user id. Anonymous callers act as `system`,
/// both when creating and when touching existing recipes.
pub const USER_ID_HEADER: &str = "x-user-id";

const SYSTEM_USER: &str = "system";
const DEFAULT_SEARCH_RESULTS: u32 = 5;
const MAX_SEARCH_RESULTS: u32 = 20;

#[derive(Clone)]
pub struct AppState {
    assembler: Arc<RecipeAssembler>,
    db: Arc<Database>,
    spoonacular: Option<Arc<SpoonacularClient>>,
    generation_timeout: Duration,
}

impl AppState {
    pub fn new(
        assembler: RecipeAssembler,
        db: Database,
        spoonacular: Option<SpoonacularClient>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            assembler: Arc::new(assembler),
            db: Arc::new(db),
            spoonacular: spoonacular.map(Arc::new),
            generation_timeout,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRecipeRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 50))]
    ingredients: Vec<String>,
    #[validate(length(max = 500))]
    preferences: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecipeRequest {
    #[validate(length(min = 1, max = 200), custom = "not_blank")]
    name: String,
    #[validate(length(min = 1, max = 50), custom = "no_blank_items")]
    ingredients: Vec<String>,
    #[validate(custom = "not_blank")]
    instructions: String,
    #[validate(range(min = 0.0))]
    estimated_calories: Option<f64>,
    estimated_time: Option<String>,
    #[validate(range(min = 1))]
    servings: Option<u32>,
    image: Option<String>,
    #[serde(default)]
    diets: Vec<String>,
}

impl From<CreateRecipeRequest> for RecipeDraft {
    fn from(request: CreateRecipeRequest) -> Self {
        RecipeDraft {
            name: request.name,
            ingredients: request.ingredients,
            instructions: request.instructions,
            estimated_calories: request.estimated_calories,
            estimated_time: request.estimated_time,
            servings: request.servings,
            image: request.image,
            diets: request.diets,
        }
    }
}

/// Partial update; absent fields keep their stored value. Identity,
/// ownership and `ai_generated` cannot be changed.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecipeRequest {
    #[validate(length(min = 1, max = 200), custom = "not_blank")]
    name: Option<String>,
    #[validate(length(min = 1, max = 50), custom = "no_blank_items")]
    ingredients: Option<Vec<String>>,
    #[validate(custom = "not_blank")]
    instructions: Option<String>,
    #[validate(range(min = 0.0))]
    estimated_calories: Option<f64>,
    estimated_time: Option<String>,
    #[validate(range(min = 1))]
    servings: Option<u32>,
    image: Option<String>,
    diets: Option<Vec<String>>,
}

impl UpdateRecipeRequest {
    fn apply(self, recipe: &mut AssembledRecipe) {
        if let Some(name) = self.name {
            recipe.name = name.trim().to_string();
        }
        if let Some(ingredients) = self.ingredients {
            recipe.ingredients = ingredients.iter().map(|i| i.trim().to_string()).collect();
        }
        if let Some(instructions) = self.instructions {
            recipe.instructions = instructions;
        }
        if let Some(calories) = self.estimated_calories {
            recipe.estimated_calories = calories;
        }
        if let Some(time) = self.estimated_time {
            recipe.estimated_time = time;
        }
        if let Some(servings) = self.servings {
            recipe.servings = servings;
        }
        if let Some(image) = self.image {
            recipe.image = image;
        }
        if let Some(diets) = self.diets {
            recipe.diets = diets;
        }
    }
}

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}

fn no_blank_items(items: &[String]) -> Result<(), validator::ValidationError> {
    if items.iter().any(|item| item.trim().is_empty()) {
        return Err(validator::ValidationError::new("blank_item"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    search: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct IngredientSearchParams {
    #[serde(default)]
    ingredients: String,
    number: Option<u32>,
}

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    fn data_with_message(data: T, message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: Some(message.to_string()),
        })
    }
}

#[derive(Serialize)]
struct RecipeListResponse {
    success: bool,
    data: Vec<StoredRecipe>,
    total: u64,
    page: u32,
    limit: u32,
    pages: u64,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Spoonacular(#[from] SpoonacularError),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::InvalidBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::Generation(e) => {
                let status = match (&e.cause, e.kind()) {
                    (GenerationCause::Transport(TransportError::Timeout(_)), _) => StatusCode::GATEWAY_TIMEOUT,
                    (_, GenerationErrorKind::Transport) => StatusCode::BAD_GATEWAY,
                    (_, GenerationErrorKind::Validation | GenerationErrorKind::Extraction) => {
                        StatusCode::BAD_REQUEST
                    }
                };
                (status, e.public_message())
            }
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A storage error occurred".to_string(),
            ),
            ApiError::Spoonacular(_) => (
                StatusCode::BAD_GATEWAY,
                "Ingredient search is currently failing".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            log::error!("Request failed ({}): {}", status, self);
        } else {
            log::warn!("Request rejected ({}): {}", status, self);
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            message: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

/// Create and configure the API router. One concurrency limit is shared by
/// every route.
pub fn create_api(state: AppState, max_concurrent_requests: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/recipes",
            get(list_recipes_handler).post(create_recipe_handler),
        )
        .route("/api/recipes/generate-ai", post(generate_recipe_handler))
        .route(
            "/api/recipes/:id",
            get(get_recipe_handler)
                .put(update_recipe_handler)
                .delete(delete_recipe_handler),
        )
        .route("/api/ingredients/search", get(ingredient_search_handler))
        .layer(cors)
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests.max(1)))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "model": state.assembler.model_name(),
    }))
    .into_response()
}

fn caller_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(SYSTEM_USER)
        .to_string()
}

/// Loads a recipe and checks that `caller` created it.
async fn owned_recipe(
    state: &AppState,
    id: &str,
    caller: &str,
    action: &str,
) -> Result<StoredRecipe, ApiError> {
    let recipe = state
        .db
        .get_recipe(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Recipe not found".to_string()))?;

    if recipe.created_by != caller {
        return Err(ApiError::Forbidden(format!(
            "Not authorized to {} this recipe",
            action
        )));
    }
    Ok(recipe)
}

async fn generate_recipe_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateRecipeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    if request.ingredients.is_empty() {
        return Err(ApiError::BadRequest("Ingredients are required".to_string()));
    }
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let generation = GenerationRequest::new(request.ingredients, request.preferences)
        .map_err(GenerationError::from)?;

    let recipe = match tokio::time::timeout(state.generation_timeout, state.assembler.generate(&generation)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(GenerationError::new(
                GenerationStage::AwaitingCompletion,
                TransportError::Timeout(state.generation_timeout),
            )
            .into())
        }
    };

    let stored = state.db.insert_recipe(&recipe, &caller_id(&headers)).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::data_with_message(stored, "Recipe generated successfully"),
    ))
}

async fn list_recipes_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let defaults = RecipeQuery::default();
    let query = RecipeQuery {
        search: params.search,
        page: params.page.unwrap_or(defaults.page),
        limit: params.limit.unwrap_or(defaults.limit),
    };

    let page = state.db.list_recipes(&query).await?;

    Ok(Json(RecipeListResponse {
        success: true,
        data: page.recipes,
        total: page.total,
        page: page.page,
        limit: page.limit,
        pages: page.pages,
    }))
}

async fn create_recipe_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateRecipeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let recipe = state.assembler.author(request.into());
    let stored = state.db.insert_recipe(&recipe, &caller_id(&headers)).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::data_with_message(stored, "Recipe created successfully"),
    ))
}

async fn get_recipe_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.get_recipe(&id).await? {
        Some(recipe) => Ok(ApiResponse::data(recipe)),
        None => Err(ApiError::NotFound("Recipe not found".to_string())),
    }
}

async fn update_recipe_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<UpdateRecipeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(changes) = payload?;
    changes
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut stored = owned_recipe(&state, &id, &caller_id(&headers), "update").await?;
    changes.apply(&mut stored.recipe);

    if state.db.update_recipe(&id, &stored.recipe).await? {
        Ok(ApiResponse::data_with_message(stored, "Recipe updated successfully"))
    } else {
        Err(ApiError::NotFound("Recipe not found".to_string()))
    }
}

async fn delete_recipe_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    owned_recipe(&state, &id, &caller_id(&headers), "delete").await?;

    if state.db.delete_recipe(&id).await? {
        Ok(ApiResponse::data_with_message(json!({ "_id": id }), "Recipe deleted successfully"))
    } else {
        Err(ApiError::NotFound("Recipe not found".to_string()))
    }
}

async fn ingredient_search_handler(
    State(state): State<AppState>,
    Query(params): Query<IngredientSearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let client = state
        .spoonacular
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Ingredient search is not configured".to_string()))?;

    let ingredients: Vec<String> = params
        .ingredients
        .split(',')
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .map(str::to_string)
        .collect();
    if ingredients.is_empty() {
        return Err(ApiError::BadRequest("Ingredients are required".to_string()));
    }

    let number = params
        .number
        .unwrap_or(DEFAULT_SEARCH_RESULTS)
        .clamp(1, MAX_SEARCH_RESULTS);
    let matches: Vec<IngredientMatch> = client.find_by_ingredients(&ingredients, number).await?;

    Ok(ApiResponse::data(matches))
}
