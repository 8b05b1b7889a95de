use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};
use uuid::Uuid;

use super::dto::{
    GroceryItemView, GroceryListResponse, GrocerySections, SetCheckedRequest, SetOnHandRequest,
    REGENERATED_MESSAGE,
};
use super::error::GroceryError;
use super::services::RefreshOutcome;
use crate::{
    auth::AuthUser,
    plans::{handlers::plan_error, services::load_plan},
    state::AppState,
};

pub fn grocery_routes() -> Router<AppState> {
    Router::new()
        .route("/plans/:plan_id/grocery", get(get_grocery_list))
        .route("/plans/:plan_id/grocery/regenerate", post(regenerate_grocery_list))
        .route("/plans/:plan_id/grocery/check", post(set_checked))
        .route("/plans/:plan_id/grocery-items/:item_id/toggle", post(toggle_checked))
        .route("/plans/:plan_id/grocery-items/:item_id/on-hand", post(set_on_hand))
        .route("/plans/:plan_id/grocery-items/:item_id/move-to-main", post(move_to_main))
}

/// GET the plan's grocery list, silently regenerating it when stale.
#[instrument(skip(state))]
pub async fn get_grocery_list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<GroceryListResponse>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let refresh = state.grocery.ensure_fresh(&plan).await.map_err(grocery_error)?;
    let reason = match refresh.outcome {
        RefreshOutcome::Fresh => None,
        RefreshOutcome::Regenerated(reason) => Some(reason),
    };
    Ok(Json(GroceryListResponse {
        plan_id,
        regenerated: reason.is_some(),
        reason,
        message: None,
        sections: GrocerySections::from(refresh.items),
    }))
}

#[instrument(skip(state))]
pub async fn regenerate_grocery_list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<GroceryListResponse>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let items = state.grocery.regenerate(&plan).await.map_err(grocery_error)?;
    Ok(Json(GroceryListResponse {
        plan_id,
        regenerated: true,
        reason: None,
        message: Some(REGENERATED_MESSAGE.to_string()),
        sections: GrocerySections::from(items),
    }))
}

#[instrument(skip(state, body))]
pub async fn set_checked(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plan_id): Path<Uuid>,
    Json(body): Json<SetCheckedRequest>,
) -> Result<Json<Vec<GroceryItemView>>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let rows = state
        .grocery
        .set_checked(plan.id, &body.item_ids, body.is_checked)
        .await
        .map_err(grocery_error)?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn toggle_checked(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((plan_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<GroceryItemView>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let row = state
        .grocery
        .toggle_checked(plan.id, item_id)
        .await
        .map_err(grocery_error)?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, body))]
pub async fn set_on_hand(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((plan_id, item_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SetOnHandRequest>,
) -> Result<Json<GroceryItemView>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let row = state
        .grocery
        .set_on_hand(plan.id, item_id, body.is_on_hand)
        .await
        .map_err(grocery_error)?;
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
pub async fn move_to_main(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((plan_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<GroceryItemView>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let row = state
        .grocery
        .move_to_main(plan.id, item_id)
        .await
        .map_err(grocery_error)?;
    Ok(Json(row.into()))
}

fn grocery_error(e: GroceryError) -> (StatusCode, String) {
    let status = match e {
        GroceryError::ItemNotFound(_) => StatusCode::NOT_FOUND,
        GroceryError::Fetch(_) | GroceryError::Write(_) => {
            error!(error = %e, "grocery request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}
