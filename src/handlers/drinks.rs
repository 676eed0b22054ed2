use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;

use crate::auth::Principal;
use crate::database::models::{Drink, DrinkPatch, NewDrink, Recipe, ShortDrink};
use crate::database::DrinkStore;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// Body of `POST /drinks`
#[derive(Debug, Deserialize)]
pub struct CreateDrink {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

impl CreateDrink {
    fn validate(self) -> Result<NewDrink, ApiError> {
        match (self.title, self.recipe) {
            (Some(title), Some(recipe)) if !title.trim().is_empty() && !recipe.is_empty() => {
                Ok(NewDrink { title, recipe })
            }
            _ => Err(ApiError::bad_request("Missing required fields")),
        }
    }
}

fn parse_patch(body: &[u8]) -> Result<DrinkPatch, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Bad request, no data provided"));
    }

    let patch: DrinkPatch = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?;

    if patch.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
        return Err(ApiError::bad_request("Drink title must not be empty"));
    }
    if patch.recipe.as_ref().is_some_and(Recipe::is_empty) {
        return Err(ApiError::bad_request("Drink recipe must not be empty"));
    }
    Ok(patch)
}

/// An empty catalog is reported as 404, not as an empty list
async fn all_drinks(store: &dyn DrinkStore) -> Result<Vec<Drink>, ApiError> {
    let drinks = store.all().await?;
    if drinks.is_empty() {
        return Err(ApiError::not_found("resource not found"));
    }
    Ok(drinks)
}

/// GET /drinks - public list, short view
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<ShortDrink>> {
    let drinks = all_drinks(state.store.as_ref()).await?;
    Ok(ApiResponse::short_drinks(&drinks))
}

/// GET /drinks-detail - full recipes, requires `get:drinks-detail`
pub async fn detail(State(state): State<AppState>) -> ApiResult<Vec<Drink>> {
    let drinks = all_drinks(state.store.as_ref()).await?;
    Ok(ApiResponse::long_drinks(drinks))
}

/// POST /drinks - requires `post:drinks`
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateDrink>, JsonRejection>,
) -> ApiResult<Vec<Drink>> {
    let Json(payload) = payload?;
    let drink = state.store.create(payload.validate()?).await?;

    info!("{} created drink {} '{}'", principal.subject, drink.id, drink.title);
    Ok(ApiResponse::long_drinks(vec![drink]))
}

/// PATCH /drinks/:id - requires `patch:drinks`
///
/// The id is resolved before the body is read, so an unknown id is a 404
/// whatever the body contains.
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i32>, PathRejection>,
    body: Bytes,
) -> ApiResult<Vec<Drink>> {
    let Path(id) = id?;
    state.store.get(id).await?;

    let patch = parse_patch(&body)?;
    let drink = state.store.update(id, patch).await?;

    info!("{} updated drink {}", principal.subject, drink.id);
    Ok(ApiResponse::long_drinks(vec![drink]))
}

/// DELETE /drinks/:id - requires `delete:drinks`
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<i32> {
    let Path(id) = id?;
    state.store.delete(id).await?;

    info!("{} deleted drink {}", principal.subject, id);
    Ok(ApiResponse::deleted(id))
}
