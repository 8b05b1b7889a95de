use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;

use super::aggregate::MergedItem;
use super::error::GroceryError;
use super::source_key::{bucket_of, source_key};
use crate::store::{GroceryListItem, NewGroceryItem, Store};

/// What happens to per-item user state when a list is regenerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Every new row starts unchecked and not on hand.
    #[default]
    Reset,
    /// Rows whose bucket existed in the previous generation keep its
    /// checked, on-hand and pantry flags.
    CarryForward,
}

/// Stamps merged items with `version` and turns them into insertable rows.
pub fn build_rows(
    plan_id: Uuid,
    version: i32,
    merged: Vec<MergedItem>,
    previous: &[GroceryListItem],
    policy: ReconcilePolicy,
) -> Vec<NewGroceryItem> {
    let carried: HashMap<&str, &GroceryListItem> = match policy {
        ReconcilePolicy::Reset => HashMap::new(),
        ReconcilePolicy::CarryForward => previous
            .iter()
            .filter_map(|row| bucket_of(&row.source_key).map(|bucket| (bucket, row)))
            .collect(),
    };

    merged
        .into_iter()
        .map(|m| {
            let prior = carried.get(m.bucket_key.as_str());
            NewGroceryItem {
                meal_plan_id: plan_id,
                source_key: source_key(version, &m.bucket_key),
                is_pantry_staple: prior.map_or(m.is_pantry_staple, |p| p.is_pantry_staple),
                is_on_hand: prior.is_some_and(|p| p.is_on_hand),
                is_checked: prior.is_some_and(|p| p.is_checked),
                ingredient_name: m.ingredient_name,
                amount: m.amount,
                unit_code: m.unit_code,
            }
        })
        .collect()
}

/// Replaces the plan's grocery rows with `rows` and returns what the store now holds.
pub async fn reconcile(
    store: &dyn Store,
    plan_id: Uuid,
    rows: &[NewGroceryItem],
) -> Result<Vec<GroceryListItem>, GroceryError> {
    store
        .replace_grocery_items(plan_id, rows)
        .await
        .map_err(GroceryError::Write)?;
    store
        .fetch_grocery_items(plan_id)
        .await
        .map_err(GroceryError::Fetch)
}
