use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::staleness::StaleReason;
use crate::store::GroceryListItem;

pub const REGENERATED_MESSAGE: &str = "Grocery list regenerated from current meal plan.";

#[derive(Debug, Serialize)]
pub struct GroceryItemView {
    pub id: Uuid,
    pub ingredient_name: String,
    pub amount: Decimal,
    pub unit_code: String,
    pub is_pantry_staple: bool,
    pub is_on_hand: bool,
    pub is_checked: bool,
    /// e.g. "1.25 cup Flour"
    pub label: String,
}

impl From<GroceryListItem> for GroceryItemView {
    fn from(item: GroceryListItem) -> Self {
        let amount = item.amount.normalize();
        Self {
            label: format!("{} {} {}", amount, item.unit_code, item.ingredient_name),
            id: item.id,
            ingredient_name: item.ingredient_name,
            amount,
            unit_code: item.unit_code,
            is_pantry_staple: item.is_pantry_staple,
            is_on_hand: item.is_on_hand,
            is_checked: item.is_checked,
        }
    }
}

/// The list as shown: what to buy, pantry staples to double-check, and what is already at home.
#[derive(Debug, Default, Serialize)]
pub struct GrocerySections {
    pub main: Vec<GroceryItemView>,
    pub pantry: Vec<GroceryItemView>,
    pub on_hand: Vec<GroceryItemView>,
}

impl From<Vec<GroceryListItem>> for GrocerySections {
    fn from(items: Vec<GroceryListItem>) -> Self {
        let mut sections = GrocerySections::default();
        for item in items {
            let bucket = if item.is_on_hand {
                &mut sections.on_hand
            } else if item.is_pantry_staple {
                &mut sections.pantry
            } else {
                &mut sections.main
            };
            bucket.push(item.into());
        }
        for bucket in [
            &mut sections.main,
            &mut sections.pantry,
            &mut sections.on_hand,
        ] {
            bucket.sort_by_cached_key(|v| v.ingredient_name.to_lowercase());
        }
        sections
    }
}

#[derive(Debug, Serialize)]
pub struct GroceryListResponse {
    pub plan_id: Uuid,
    pub regenerated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StaleReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub sections: GrocerySections,
}

#[derive(Debug, Deserialize)]
pub struct SetCheckedRequest {
    pub item_ids: Vec<Uuid>,
    pub is_checked: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetOnHandRequest {
    pub is_on_hand: bool,
}
