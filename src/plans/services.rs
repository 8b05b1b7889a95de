use rust_decimal::{Decimal, RoundingStrategy};
use time::Date;
use tracing::info;
use uuid::Uuid;

use crate::store::{MealPlan, MealPlanItem, MealType, NewPlan, NewSlot, SlotType, Store};

/// Smallest serving multiplier reachable by stepping a slot down.
pub const MIN_SERVING: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("{0}")]
    Invalid(String),
    #[error("meal plan not found")]
    NotFound,
    #[error("meal slot not found")]
    SlotNotFound,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

fn invalid(msg: impl Into<String>) -> PlanError {
    PlanError::Invalid(msg.into())
}

/// Plans still running or yet to start: current ones first, then future ones,
/// each by start date.
pub fn order_active(plans: Vec<MealPlan>, today: Date) -> Vec<MealPlan> {
    let (mut current, mut future): (Vec<_>, Vec<_>) = plans
        .into_iter()
        .filter(|p| p.end_date >= today)
        .partition(|p| p.start_date <= today);
    current.sort_by_key(|p| p.start_date);
    future.sort_by_key(|p| p.start_date);
    current.extend(future);
    current
}

pub async fn list_active(
    store: &dyn Store,
    user_id: Uuid,
    today: Date,
) -> Result<Vec<MealPlan>, PlanError> {
    let plans = store.list_plans_ending_from(user_id, today).await?;
    Ok(order_active(plans, today))
}

pub async fn load_plan(
    store: &dyn Store,
    user_id: Uuid,
    plan_id: Uuid,
) -> Result<MealPlan, PlanError> {
    store
        .fetch_plan(user_id, plan_id)
        .await?
        .ok_or(PlanError::NotFound)
}

pub fn validate_new_plan(plan: &NewPlan) -> Result<(), PlanError> {
    if plan.start_date > plan.end_date {
        return Err(invalid("start date must not be after end date"));
    }
    Ok(())
}

pub async fn create_plan(
    store: &dyn Store,
    user_id: Uuid,
    plan: NewPlan,
) -> Result<MealPlan, PlanError> {
    validate_new_plan(&plan)?;
    let created = store.create_plan(user_id, &plan).await?;
    info!(plan_id = %created.id, %user_id, "meal plan created");
    Ok(created)
}

/// Moves the plan's dates. The new range has to keep every existing slot inside it.
pub async fn update_plan(
    store: &dyn Store,
    plan: &MealPlan,
    dates: NewPlan,
) -> Result<MealPlan, PlanError> {
    validate_new_plan(&dates)?;
    let slots = store.fetch_slots(plan.id).await?;
    if let Some(outside) = slots
        .iter()
        .find(|s| s.plan_date < dates.start_date || s.plan_date > dates.end_date)
    {
        return Err(invalid(format!(
            "a slot on {} would fall outside the new range",
            outside.plan_date
        )));
    }
    let updated = store
        .update_plan(plan.id, &dates)
        .await?
        .ok_or(PlanError::NotFound)?;
    info!(
        plan_id = %plan.id,
        start = %updated.start_date,
        end = %updated.end_date,
        "plan dates saved"
    );
    Ok(updated)
}

pub async fn delete_plan(store: &dyn Store, plan: &MealPlan) -> Result<(), PlanError> {
    if !store.delete_plan(plan.id).await? {
        return Err(PlanError::NotFound);
    }
    info!(plan_id = %plan.id, "meal plan deleted");
    Ok(())
}

/// A slot as requested by the user, before checks against its plan.
#[derive(Debug, Clone)]
pub struct SlotRequest {
    pub plan_date: Date,
    pub meal_type: MealType,
    pub slot_type: SlotType,
    pub recipe_id: Option<Uuid>,
    pub leftover_source_item_id: Option<Uuid>,
    pub serving_multiplier: Option<Decimal>,
    pub note: Option<String>,
}

pub async fn add_slot(
    store: &dyn Store,
    plan: &MealPlan,
    req: SlotRequest,
) -> Result<MealPlanItem, PlanError> {
    if !plan.contains(req.plan_date) {
        return Err(invalid("date is outside the plan's range"));
    }

    let serving_multiplier = match req.slot_type {
        SlotType::Cook => {
            if req.recipe_id.is_none() {
                return Err(invalid("a cook slot needs a recipe"));
            }
            let multiplier = req.serving_multiplier.unwrap_or(Decimal::ONE);
            if multiplier <= Decimal::ZERO {
                return Err(invalid("serving multiplier must be positive"));
            }
            multiplier
        }
        SlotType::Leftover | SlotType::EatOut => {
            if req.recipe_id.is_some() {
                return Err(invalid(format!("a {} slot has no recipe", req.slot_type)));
            }
            Decimal::ONE
        }
    };

    let leftover_source_item_id = match (req.slot_type, req.leftover_source_item_id) {
        (SlotType::Leftover, None) => {
            return Err(invalid("a leftover slot needs the cook slot it reuses"));
        }
        (SlotType::Leftover, Some(source_id)) => {
            let source = store
                .fetch_slot(plan.id, source_id)
                .await?
                .filter(|s| s.slot_type() == Some(SlotType::Cook))
                .ok_or_else(|| invalid("leftovers must come from a cook slot in this plan"))?;
            let cooked_at = (source.plan_date, source.meal_type());
            if cooked_at >= (req.plan_date, Some(req.meal_type)) {
                return Err(invalid("leftovers must come from an earlier meal"));
            }
            Some(source_id)
        }
        (_, Some(_)) => return Err(invalid("only leftover slots reference another slot")),
        (_, None) => None,
    };

    let note = req
        .note
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let slot = store
        .insert_slot(&NewSlot {
            meal_plan_id: plan.id,
            plan_date: req.plan_date,
            meal_type: req.meal_type,
            slot_type: req.slot_type,
            recipe_id: req.recipe_id,
            leftover_source_item_id,
            serving_multiplier,
            note,
        })
        .await?;
    info!(plan_id = %plan.id, slot_id = %slot.id, slot_type = %req.slot_type, "slot added");
    Ok(slot)
}

pub async fn remove_slot(
    store: &dyn Store,
    plan: &MealPlan,
    slot_id: Uuid,
) -> Result<(), PlanError> {
    if store.delete_slots(plan.id, &[slot_id]).await? == 0 {
        return Err(PlanError::SlotNotFound);
    }
    info!(plan_id = %plan.id, %slot_id, "slot removed");
    Ok(())
}

/// Empties one (day, meal) cell; returns how many slots went away.
pub async fn clear_slot(
    store: &dyn Store,
    plan: &MealPlan,
    plan_date: Date,
    meal_type: MealType,
) -> Result<u64, PlanError> {
    let removed = store.delete_slots_at(plan.id, plan_date, meal_type).await?;
    info!(plan_id = %plan.id, %plan_date, meal_type = meal_type.as_str(), removed, "slot cleared");
    Ok(removed)
}

/// `current + delta`, rounded to two places and never below [`MIN_SERVING`].
pub fn next_serving(current: Decimal, delta: Decimal) -> Decimal {
    (current + delta)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .max(MIN_SERVING)
        .normalize()
}

pub async fn adjust_serving(
    store: &dyn Store,
    plan: &MealPlan,
    slot_id: Uuid,
    delta: Decimal,
) -> Result<MealPlanItem, PlanError> {
    let slot = store
        .fetch_slot(plan.id, slot_id)
        .await?
        .ok_or(PlanError::SlotNotFound)?;
    if slot.slot_type() != Some(SlotType::Cook) {
        return Err(invalid("only cook slots have servings"));
    }
    let next = next_serving(slot.serving_multiplier, delta);
    let updated = store
        .update_serving(plan.id, slot_id, next)
        .await?
        .ok_or(PlanError::SlotNotFound)?;
    info!(plan_id = %plan.id, %slot_id, serving = %next, "serving updated");
    Ok(updated)
}
