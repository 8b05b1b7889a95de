use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::services::SlotRequest;
use crate::store::{MealPlan, MealPlanItem, MealType, NewPlan, SlotType};

/// Body of both plan creation and the date edit.
#[derive(Debug, Deserialize)]
pub struct PlanDatesRequest {
    pub start_date: Date,
    pub end_date: Date,
    pub order_date: Option<Date>,
    pub pickup_date: Option<Date>,
}

impl From<PlanDatesRequest> for NewPlan {
    fn from(r: PlanDatesRequest) -> Self {
        NewPlan {
            start_date: r.start_date,
            end_date: r.end_date,
            order_date: r.order_date,
            pickup_date: r.pickup_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddSlotRequest {
    pub plan_date: Date,
    pub meal_type: MealType,
    #[serde(default = "default_slot_type")]
    pub slot_type: SlotType,
    pub recipe_id: Option<Uuid>,
    pub leftover_source_item_id: Option<Uuid>,
    pub serving_multiplier: Option<Decimal>,
    pub note: Option<String>,
}

fn default_slot_type() -> SlotType {
    SlotType::Cook
}

impl From<AddSlotRequest> for SlotRequest {
    fn from(r: AddSlotRequest) -> Self {
        SlotRequest {
            plan_date: r.plan_date,
            meal_type: r.meal_type,
            slot_type: r.slot_type,
            recipe_id: r.recipe_id,
            leftover_source_item_id: r.leftover_source_item_id,
            serving_multiplier: r.serving_multiplier,
            note: r.note,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClearSlotRequest {
    pub plan_date: Date,
    pub meal_type: MealType,
}

#[derive(Debug, Serialize)]
pub struct ClearSlotResponse {
    pub removed: u64,
}

/// Signed step applied to a cook slot's serving multiplier.
#[derive(Debug, Deserialize)]
pub struct AdjustServingRequest {
    pub delta: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PlanDetails {
    #[serde(flatten)]
    pub plan: MealPlan,
    pub slots: Vec<MealPlanItem>,
}
