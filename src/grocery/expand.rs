use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::GroceryError;
use super::normalize::bucket_key;
use crate::store::{CookSlot, IngredientRow, Store};

/// One recipe ingredient scaled by the serving multiplier of one cook slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledIngredient {
    pub display_name: String,
    pub amount: Decimal,
    pub unit_code: String,
    pub is_pantry_staple: bool,
    pub bucket_key: String,
}

/// Missing or zero multipliers count as one serving.
pub fn effective_multiplier(multiplier: Option<Decimal>) -> Decimal {
    match multiplier {
        Some(m) if !m.is_zero() => m,
        _ => Decimal::ONE,
    }
}

/// Distinct recipe ids referenced by the slots, in first-seen order.
pub fn recipe_ids(slots: &[CookSlot]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    slots
        .iter()
        .filter_map(|s| s.recipe_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Expands every (slot, ingredient) pair; slots without a recipe contribute nothing.
pub fn expand(slots: &[CookSlot], ingredients: &[IngredientRow]) -> Vec<ScaledIngredient> {
    let mut by_recipe: HashMap<Uuid, Vec<&IngredientRow>> = HashMap::new();
    for ingredient in ingredients {
        by_recipe
            .entry(ingredient.recipe_id)
            .or_default()
            .push(ingredient);
    }

    let mut out = Vec::new();
    for slot in slots {
        let Some(recipe_id) = slot.recipe_id else {
            continue;
        };
        let Some(recipe_ingredients) = by_recipe.get(&recipe_id) else {
            continue;
        };
        let multiplier = effective_multiplier(slot.serving_multiplier);
        out.extend(recipe_ingredients.iter().map(|i| ScaledIngredient {
            display_name: i.name.trim().to_string(),
            amount: i.amount.saturating_mul(multiplier),
            unit_code: i.unit_code.clone(),
            is_pantry_staple: i.is_pantry_staple,
            bucket_key: bucket_key(&i.name, &i.unit_code, i.is_pantry_staple),
        }));
    }
    out
}

/// Reads the plan's cook slots and their recipes' ingredients, then expands them.
pub async fn load_scaled(
    store: &dyn Store,
    plan_id: Uuid,
) -> Result<Vec<ScaledIngredient>, GroceryError> {
    let slots = store
        .fetch_cook_slots(plan_id)
        .await
        .map_err(GroceryError::Fetch)?;
    let ids = recipe_ids(&slots);
    let ingredients = if ids.is_empty() {
        Vec::new()
    } else {
        store
            .fetch_ingredients(&ids)
            .await
            .map_err(GroceryError::Fetch)?
    };
    tracing::debug!(
        %plan_id,
        cook_slots = slots.len(),
        recipes = ids.len(),
        ingredients = ingredients.len(),
        "expanding plan"
    );
    Ok(expand(&slots, &ingredients))
}
