//! Deciding whether a loaded grocery list must be regenerated.
//!
//! A list is `Absent` (no rows), `Generated@V` (every row stamped with the
//! plan's current version V) or stale (some row stamped with an older
//! version). Absent lists are only regenerated when the plan has something to
//! cook; an empty list for a plan of leftovers and eat-outs is final.

use serde::Serialize;
use uuid::Uuid;

use super::error::GroceryError;
use super::source_key::is_stamped_with;
use crate::store::{GroceryListItem, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    /// No rows, yet the plan has cook slots.
    NeverGenerated,
    /// At least one row was stamped with a different plan version.
    VersionMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    Empty,
    Current,
    Outdated,
}

pub fn inspect(items: &[GroceryListItem], version: i32) -> Inspection {
    if items.is_empty() {
        Inspection::Empty
    } else if items.iter().all(|i| is_stamped_with(&i.source_key, version)) {
        Inspection::Current
    } else {
        Inspection::Outdated
    }
}

/// Why the list needs regenerating, or `None` when it can be shown as-is.
pub async fn detect(
    store: &dyn Store,
    plan_id: Uuid,
    items: &[GroceryListItem],
    version: i32,
) -> Result<Option<StaleReason>, GroceryError> {
    match inspect(items, version) {
        Inspection::Current => Ok(None),
        Inspection::Outdated => Ok(Some(StaleReason::VersionMismatch)),
        Inspection::Empty => {
            let cook_slots = store
                .count_cook_slots(plan_id)
                .await
                .map_err(GroceryError::Fetch)?;
            Ok((cook_slots > 0).then_some(StaleReason::NeverGenerated))
        }
    }
}
