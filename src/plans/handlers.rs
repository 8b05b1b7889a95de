use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, instrument};
use uuid::Uuid;

use super::dto::{
    AddSlotRequest, AdjustServingRequest, ClearSlotRequest, ClearSlotResponse, PlanDatesRequest,
    PlanDetails,
};
use super::services::{self, load_plan, PlanError};
use crate::{
    auth::AuthUser,
    state::AppState,
    store::{MealPlan, MealPlanItem},
};

pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans).post(create_plan))
        .route("/plans/:plan_id", get(get_plan).patch(update_plan).delete(delete_plan))
        .route("/plans/:plan_id/slots", post(add_slot))
        .route("/plans/:plan_id/slots/:slot_id", delete(remove_slot))
        .route("/plans/:plan_id/slots/:slot_id/serving", post(adjust_serving))
        .route("/plans/:plan_id/clear-slot", post(clear_slot))
}

/// Active plans of the caller: current first, then upcoming.
#[instrument(skip(state))]
pub async fn list_plans(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<MealPlan>>, (StatusCode, String)> {
    let today = OffsetDateTime::now_utc().date();
    let plans = services::list_active(state.store.as_ref(), user_id, today)
        .await
        .map_err(plan_error)?;
    Ok(Json(plans))
}

#[instrument(skip(state, body))]
pub async fn create_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<PlanDatesRequest>,
) -> Result<(StatusCode, Json<MealPlan>), (StatusCode, String)> {
    let plan = services::create_plan(state.store.as_ref(), user_id, body.into())
        .await
        .map_err(plan_error)?;
    Ok((StatusCode::CREATED, Json(plan)))
}

#[instrument(skip(state))]
pub async fn get_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<PlanDetails>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let slots = state
        .store
        .fetch_slots(plan.id)
        .await
        .map_err(|e| plan_error(e.into()))?;
    Ok(Json(PlanDetails { plan, slots }))
}

/// PATCH the plan's start, end, order and pickup dates.
#[instrument(skip(state, body))]
pub async fn update_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plan_id): Path<Uuid>,
    Json(body): Json<PlanDatesRequest>,
) -> Result<Json<MealPlan>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let updated = services::update_plan(state.store.as_ref(), &plan, body.into())
        .await
        .map_err(plan_error)?;
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plan_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    services::delete_plan(state.store.as_ref(), &plan)
        .await
        .map_err(plan_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn add_slot(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plan_id): Path<Uuid>,
    Json(body): Json<AddSlotRequest>,
) -> Result<(StatusCode, Json<MealPlanItem>), (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let slot = services::add_slot(state.store.as_ref(), &plan, body.into())
        .await
        .map_err(plan_error)?;
    Ok((StatusCode::CREATED, Json(slot)))
}

#[instrument(skip(state))]
pub async fn remove_slot(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((plan_id, slot_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    services::remove_slot(state.store.as_ref(), &plan, slot_id)
        .await
        .map_err(plan_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn clear_slot(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plan_id): Path<Uuid>,
    Json(body): Json<ClearSlotRequest>,
) -> Result<Json<ClearSlotResponse>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let removed = services::clear_slot(state.store.as_ref(), &plan, body.plan_date, body.meal_type)
        .await
        .map_err(plan_error)?;
    Ok(Json(ClearSlotResponse { removed }))
}

#[instrument(skip(state, body))]
pub async fn adjust_serving(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((plan_id, slot_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<AdjustServingRequest>,
) -> Result<Json<MealPlanItem>, (StatusCode, String)> {
    let plan = load_plan(state.store.as_ref(), user_id, plan_id)
        .await
        .map_err(plan_error)?;
    let slot = services::adjust_serving(state.store.as_ref(), &plan, slot_id, body.delta)
        .await
        .map_err(plan_error)?;
    Ok(Json(slot))
}

pub fn plan_error(e: PlanError) -> (StatusCode, String) {
    let status = match &e {
        PlanError::Invalid(_) => StatusCode::BAD_REQUEST,
        PlanError::NotFound | PlanError::SlotNotFound => StatusCode::NOT_FOUND,
        PlanError::Store(err) => {
            error!(error = %err, "plan request failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into());
        }
    };
    (status, e.to_string())
}
