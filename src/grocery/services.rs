use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::aggregate::aggregate;
use super::error::GroceryError;
use super::expand::load_scaled;
use super::guard::RegenerationGuard;
use super::reconcile::{build_rows, reconcile, ReconcilePolicy};
use super::staleness::{detect, StaleReason};
use crate::store::{GroceryListItem, ItemUpdate, MealPlan, Store};

/// How `ensure_fresh` got to the rows it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Fresh,
    Regenerated(StaleReason),
}

#[derive(Debug, Clone)]
pub struct Refresh {
    pub items: Vec<GroceryListItem>,
    pub outcome: RefreshOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Silent,
    Manual,
}

impl Trigger {
    fn as_str(&self) -> &'static str {
        match self {
            Trigger::Silent => "silent",
            Trigger::Manual => "manual",
        }
    }
}

#[derive(Clone)]
pub struct GroceryService {
    store: Arc<dyn Store>,
    guard: RegenerationGuard,
    policy: ReconcilePolicy,
}

impl GroceryService {
    pub fn new(store: Arc<dyn Store>, policy: ReconcilePolicy) -> Self {
        Self {
            store,
            guard: RegenerationGuard::new(),
            policy,
        }
    }

    /// Loads the plan's grocery list, regenerating it first when it is absent
    /// for a plan with cook slots or was generated for an older plan version.
    #[instrument(skip(self, plan), fields(plan_id = %plan.id))]
    pub async fn ensure_fresh(&self, plan: &MealPlan) -> Result<Refresh, GroceryError> {
        let (items, version) = self.load(plan.id).await?;
        if detect(self.store.as_ref(), plan.id, &items, version)
            .await?
            .is_none()
        {
            return Ok(Refresh {
                items,
                outcome: RefreshOutcome::Fresh,
            });
        }

        let _lock = self.guard.lock(plan.id).await;
        // another regeneration may have finished while we waited
        let (items, version) = self.load(plan.id).await?;
        let Some(reason) = detect(self.store.as_ref(), plan.id, &items, version).await? else {
            debug!(version, "list regenerated concurrently");
            return Ok(Refresh {
                items,
                outcome: RefreshOutcome::Fresh,
            });
        };
        debug!(version, ?reason, "grocery list is stale");

        let items = self.run(plan.id, Trigger::Silent, &items).await?;
        Ok(Refresh {
            items,
            outcome: RefreshOutcome::Regenerated(reason),
        })
    }

    /// User-requested regeneration from the plan's current slots.
    #[instrument(skip(self, plan), fields(plan_id = %plan.id))]
    pub async fn regenerate(&self, plan: &MealPlan) -> Result<Vec<GroceryListItem>, GroceryError> {
        let _lock = self.guard.lock(plan.id).await;
        let previous = match self.policy {
            ReconcilePolicy::Reset => Vec::new(),
            ReconcilePolicy::CarryForward => self.fetch_items(plan.id).await?,
        };
        self.run(plan.id, Trigger::Manual, &previous).await
    }

    async fn run(
        &self,
        plan_id: Uuid,
        trigger: Trigger,
        previous: &[GroceryListItem],
    ) -> Result<Vec<GroceryListItem>, GroceryError> {
        let store = self.store.as_ref();
        let version = store
            .fetch_plan_version(plan_id)
            .await
            .map_err(GroceryError::Fetch)?;
        let merged = aggregate(load_scaled(store, plan_id).await?);
        let rows = build_rows(plan_id, version, merged, previous, self.policy);
        let items = reconcile(store, plan_id, &rows).await?;
        info!(
            %plan_id,
            version,
            trigger = trigger.as_str(),
            rows = items.len(),
            "grocery list regenerated"
        );
        Ok(items)
    }

    async fn load(&self, plan_id: Uuid) -> Result<(Vec<GroceryListItem>, i32), GroceryError> {
        let items = self.fetch_items(plan_id).await?;
        let version = self
            .store
            .fetch_plan_version(plan_id)
            .await
            .map_err(GroceryError::Fetch)?;
        Ok((items, version))
    }

    async fn fetch_items(&self, plan_id: Uuid) -> Result<Vec<GroceryListItem>, GroceryError> {
        self.store
            .fetch_grocery_items(plan_id)
            .await
            .map_err(GroceryError::Fetch)
    }

    async fn update(
        &self,
        plan_id: Uuid,
        item_ids: &[Uuid],
        update: ItemUpdate,
    ) -> Result<Vec<GroceryListItem>, GroceryError> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .store
            .update_grocery_items(plan_id, item_ids, update)
            .await
            .map_err(GroceryError::Write)?;
        debug!(
            %plan_id,
            ?update,
            requested = item_ids.len(),
            updated = rows.len(),
            "grocery items updated"
        );
        Ok(rows)
    }

    async fn update_one(
        &self,
        plan_id: Uuid,
        item_id: Uuid,
        update: ItemUpdate,
    ) -> Result<GroceryListItem, GroceryError> {
        self.update(plan_id, &[item_id], update)
            .await?
            .into_iter()
            .next()
            .ok_or(GroceryError::ItemNotFound(item_id))
    }

    pub async fn toggle_checked(
        &self,
        plan_id: Uuid,
        item_id: Uuid,
    ) -> Result<GroceryListItem, GroceryError> {
        self.update_one(plan_id, item_id, ItemUpdate::ToggleChecked)
            .await
    }

    /// Checks or unchecks a group of rows at once ("check all").
    pub async fn set_checked(
        &self,
        plan_id: Uuid,
        item_ids: &[Uuid],
        is_checked: bool,
    ) -> Result<Vec<GroceryListItem>, GroceryError> {
        self.update(plan_id, item_ids, ItemUpdate::Checked(is_checked))
            .await
    }

    pub async fn set_on_hand(
        &self,
        plan_id: Uuid,
        item_id: Uuid,
        is_on_hand: bool,
    ) -> Result<GroceryListItem, GroceryError> {
        self.update_one(plan_id, item_id, ItemUpdate::OnHand(is_on_hand))
            .await
    }

    /// Demotes a pantry staple onto the main shopping list.
    pub async fn move_to_main(
        &self,
        plan_id: Uuid,
        item_id: Uuid,
    ) -> Result<GroceryListItem, GroceryError> {
        self.update_one(plan_id, item_id, ItemUpdate::MoveToMain)
            .await
    }
}
