use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    CookSlot, GroceryListItem, IngredientRow, ItemUpdate, MealPlan, MealPlanItem, MealType,
    NewGroceryItem, NewPlan, NewSlot, SlotType, Store,
};

/// Store calls that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    FetchCookSlots,
    CountCookSlots,
    FetchIngredients,
    FetchGroceryItems,
    DeleteGroceryItems,
    InsertGroceryItems,
}

#[derive(Default)]
struct Inner {
    plans: HashMap<Uuid, MealPlan>,
    slots: Vec<MealPlanItem>,
    ingredients: Vec<IngredientRow>,
    grocery: Vec<GroceryListItem>,
}

impl Inner {
    fn bump(&mut self, plan_id: Uuid) {
        if let Some(plan) = self.plans.get_mut(&plan_id) {
            plan.version += 1;
        }
    }
}

/// In-process [`Store`] with the same observable contract as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing: Mutex<HashSet<FailPoint>>,
    ingredient_fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    fn check(&self, point: FailPoint) -> anyhow::Result<()> {
        let failing = self
            .failing
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        if failing.contains(&point) {
            anyhow::bail!("injected failure at {point:?}");
        }
        Ok(())
    }

    pub fn fail_at(&self, point: FailPoint) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(point);
        }
    }

    pub fn heal(&self, point: FailPoint) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&point);
        }
    }

    /// Number of `fetch_ingredients` calls served so far.
    pub fn ingredient_fetches(&self) -> usize {
        self.ingredient_fetches.load(Ordering::SeqCst)
    }

    /// Inserts a plan as-is, keeping its id and version.
    pub fn seed_plan(&self, plan: MealPlan) -> anyhow::Result<()> {
        self.lock()?.plans.insert(plan.id, plan);
        Ok(())
    }

    /// Appends an ingredient to a recipe; order of calls is recipe order.
    pub fn seed_ingredient(
        &self,
        recipe_id: Uuid,
        name: &str,
        amount: Decimal,
        unit_code: &str,
        is_pantry_staple: bool,
    ) -> anyhow::Result<()> {
        self.lock()?.ingredients.push(IngredientRow {
            recipe_id,
            name: name.to_string(),
            amount,
            unit_code: unit_code.to_string(),
            is_pantry_staple,
        });
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_plan(&self, user_id: Uuid, plan_id: Uuid) -> anyhow::Result<Option<MealPlan>> {
        let inner = self.lock()?;
        Ok(inner
            .plans
            .get(&plan_id)
            .filter(|p| p.user_id == user_id)
            .cloned())
    }

    async fn list_plans_ending_from(
        &self,
        user_id: Uuid,
        from: Date,
    ) -> anyhow::Result<Vec<MealPlan>> {
        let inner = self.lock()?;
        let mut plans: Vec<MealPlan> = inner
            .plans
            .values()
            .filter(|p| p.user_id == user_id && p.end_date >= from)
            .cloned()
            .collect();
        plans.sort_by_key(|p| p.start_date);
        Ok(plans)
    }

    async fn create_plan(&self, user_id: Uuid, plan: &NewPlan) -> anyhow::Result<MealPlan> {
        let created = MealPlan {
            id: Uuid::new_v4(),
            user_id,
            start_date: plan.start_date,
            end_date: plan.end_date,
            order_date: plan.order_date,
            pickup_date: plan.pickup_date,
            version: 1,
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock()?.plans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_plan(
        &self,
        plan_id: Uuid,
        dates: &NewPlan,
    ) -> anyhow::Result<Option<MealPlan>> {
        let mut inner = self.lock()?;
        Ok(inner.plans.get_mut(&plan_id).map(|p| {
            p.start_date = dates.start_date;
            p.end_date = dates.end_date;
            p.order_date = dates.order_date;
            p.pickup_date = dates.pickup_date;
            p.clone()
        }))
    }

    async fn delete_plan(&self, plan_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.lock()?;
        let existed = inner.plans.remove(&plan_id).is_some();
        inner.slots.retain(|s| s.meal_plan_id != plan_id);
        inner.grocery.retain(|g| g.meal_plan_id != plan_id);
        Ok(existed)
    }

    async fn fetch_plan_version(&self, plan_id: Uuid) -> anyhow::Result<i32> {
        let inner = self.lock()?;
        inner
            .plans
            .get(&plan_id)
            .map(|p| p.version)
            .ok_or_else(|| anyhow::anyhow!("plan {plan_id} not found"))
    }

    async fn fetch_slot(
        &self,
        plan_id: Uuid,
        slot_id: Uuid,
    ) -> anyhow::Result<Option<MealPlanItem>> {
        let inner = self.lock()?;
        Ok(inner
            .slots
            .iter()
            .find(|s| s.id == slot_id && s.meal_plan_id == plan_id)
            .cloned())
    }

    async fn fetch_slots(&self, plan_id: Uuid) -> anyhow::Result<Vec<MealPlanItem>> {
        let inner = self.lock()?;
        let mut slots: Vec<MealPlanItem> = inner
            .slots
            .iter()
            .filter(|s| s.meal_plan_id == plan_id)
            .cloned()
            .collect();
        slots.sort_by(|a, b| {
            a.plan_date
                .cmp(&b.plan_date)
                .then_with(|| b.meal_type.cmp(&a.meal_type))
        });
        Ok(slots)
    }

    async fn insert_slot(&self, slot: &NewSlot) -> anyhow::Result<MealPlanItem> {
        let mut inner = self.lock()?;
        anyhow::ensure!(
            inner.plans.contains_key(&slot.meal_plan_id),
            "plan {} not found",
            slot.meal_plan_id
        );
        let item = MealPlanItem {
            id: Uuid::new_v4(),
            meal_plan_id: slot.meal_plan_id,
            plan_date: slot.plan_date,
            meal_type: slot.meal_type.as_str().to_string(),
            slot_type: slot.slot_type.as_str().to_string(),
            recipe_id: slot.recipe_id,
            leftover_source_item_id: slot.leftover_source_item_id,
            serving_multiplier: slot.serving_multiplier,
            note: slot.note.clone(),
        };
        inner.slots.push(item.clone());
        inner.bump(slot.meal_plan_id);
        Ok(item)
    }

    async fn delete_slots(&self, plan_id: Uuid, slot_ids: &[Uuid]) -> anyhow::Result<u64> {
        let mut inner = self.lock()?;
        let before = inner.slots.len();
        inner
            .slots
            .retain(|s| !(s.meal_plan_id == plan_id && slot_ids.contains(&s.id)));
        let removed = (before - inner.slots.len()) as u64;
        if removed > 0 {
            for s in inner.slots.iter_mut() {
                if s.leftover_source_item_id.is_some_and(|src| slot_ids.contains(&src)) {
                    s.leftover_source_item_id = None;
                }
            }
            inner.bump(plan_id);
        }
        Ok(removed)
    }

    async fn delete_slots_at(
        &self,
        plan_id: Uuid,
        plan_date: Date,
        meal_type: MealType,
    ) -> anyhow::Result<u64> {
        let ids: Vec<Uuid> = {
            let inner = self.lock()?;
            inner
                .slots
                .iter()
                .filter(|s| {
                    s.meal_plan_id == plan_id
                        && s.plan_date == plan_date
                        && s.meal_type == meal_type.as_str()
                })
                .map(|s| s.id)
                .collect()
        };
        self.delete_slots(plan_id, &ids).await
    }

    async fn update_serving(
        &self,
        plan_id: Uuid,
        slot_id: Uuid,
        serving_multiplier: Decimal,
    ) -> anyhow::Result<Option<MealPlanItem>> {
        let mut inner = self.lock()?;
        let updated = inner
            .slots
            .iter_mut()
            .find(|s| s.id == slot_id && s.meal_plan_id == plan_id)
            .map(|s| {
                s.serving_multiplier = serving_multiplier;
                s.clone()
            });
        if updated.is_some() {
            inner.bump(plan_id);
        }
        Ok(updated)
    }

    async fn fetch_cook_slots(&self, plan_id: Uuid) -> anyhow::Result<Vec<CookSlot>> {
        self.check(FailPoint::FetchCookSlots)?;
        let inner = self.lock()?;
        let mut slots = inner
            .slots
            .iter()
            .filter(|s| s.meal_plan_id == plan_id && s.slot_type() == Some(SlotType::Cook))
            .collect::<Vec<_>>();
        slots.sort_by(|a, b| {
            a.plan_date
                .cmp(&b.plan_date)
                .then_with(|| b.meal_type.cmp(&a.meal_type))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(slots
            .into_iter()
            .map(|s| CookSlot {
                recipe_id: s.recipe_id,
                serving_multiplier: Some(s.serving_multiplier),
            })
            .collect())
    }

    async fn count_cook_slots(&self, plan_id: Uuid) -> anyhow::Result<i64> {
        self.check(FailPoint::CountCookSlots)?;
        let inner = self.lock()?;
        Ok(inner
            .slots
            .iter()
            .filter(|s| s.meal_plan_id == plan_id && s.slot_type() == Some(SlotType::Cook))
            .count() as i64)
    }

    async fn fetch_ingredients(&self, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<IngredientRow>> {
        self.check(FailPoint::FetchIngredients)?;
        self.ingredient_fetches.fetch_add(1, Ordering::SeqCst);
        let inner = self.lock()?;
        Ok(inner
            .ingredients
            .iter()
            .filter(|i| recipe_ids.contains(&i.recipe_id))
            .cloned()
            .collect())
    }

    async fn fetch_grocery_items(&self, plan_id: Uuid) -> anyhow::Result<Vec<GroceryListItem>> {
        self.check(FailPoint::FetchGroceryItems)?;
        let inner = self.lock()?;
        let mut rows: Vec<GroceryListItem> = inner
            .grocery
            .iter()
            .filter(|g| g.meal_plan_id == plan_id)
            .cloned()
            .collect();
        rows.sort_by_cached_key(|g| {
            (g.ingredient_name.to_lowercase(), g.ingredient_name.clone())
        });
        Ok(rows)
    }

    async fn delete_grocery_items(&self, plan_id: Uuid) -> anyhow::Result<()> {
        self.check(FailPoint::DeleteGroceryItems)?;
        self.lock()?.grocery.retain(|g| g.meal_plan_id != plan_id);
        Ok(())
    }

    async fn insert_grocery_items(&self, rows: &[NewGroceryItem]) -> anyhow::Result<()> {
        self.check(FailPoint::InsertGroceryItems)?;
        let mut inner = self.lock()?;
        inner.grocery.extend(rows.iter().map(|r| GroceryListItem {
            id: Uuid::new_v4(),
            meal_plan_id: r.meal_plan_id,
            ingredient_name: r.ingredient_name.clone(),
            amount: r.amount,
            unit_code: r.unit_code.clone(),
            is_pantry_staple: r.is_pantry_staple,
            is_on_hand: r.is_on_hand,
            is_checked: r.is_checked,
            source_key: r.source_key.clone(),
        }));
        Ok(())
    }

    async fn update_grocery_items(
        &self,
        plan_id: Uuid,
        item_ids: &[Uuid],
        update: ItemUpdate,
    ) -> anyhow::Result<Vec<GroceryListItem>> {
        let mut inner = self.lock()?;
        let mut updated = Vec::new();
        for row in inner
            .grocery
            .iter_mut()
            .filter(|g| g.meal_plan_id == plan_id && item_ids.contains(&g.id))
        {
            match update {
                ItemUpdate::ToggleChecked => row.is_checked = !row.is_checked,
                ItemUpdate::Checked(v) => row.is_checked = v,
                ItemUpdate::OnHand(v) => row.is_on_hand = v,
                ItemUpdate::MoveToMain => row.is_pantry_staple = false,
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod memory_tests {
    use super::*;
    use time::macros::date;

    fn plan() -> NewPlan {
        NewPlan {
            start_date: date!(2024 - 03 - 01),
            end_date: date!(2024 - 03 - 07),
            order_date: None,
            pickup_date: None,
        }
    }

    fn cook(plan_id: Uuid, recipe_id: Uuid) -> NewSlot {
        NewSlot {
            meal_plan_id: plan_id,
            plan_date: date!(2024 - 03 - 02),
            meal_type: MealType::Dinner,
            slot_type: SlotType::Cook,
            recipe_id: Some(recipe_id),
            leftover_source_item_id: None,
            serving_multiplier: Decimal::ONE,
            note: None,
        }
    }

    #[tokio::test]
    async fn slot_mutations_bump_version_once_each() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let p = store.create_plan(user, &plan()).await.unwrap();
        assert_eq!(p.version, 1);

        let slot = store.insert_slot(&cook(p.id, Uuid::new_v4())).await.unwrap();
        assert_eq!(store.fetch_plan_version(p.id).await.unwrap(), 2);

        store
            .update_serving(p.id, slot.id, Decimal::new(15, 1))
            .await
            .unwrap();
        assert_eq!(store.fetch_plan_version(p.id).await.unwrap(), 3);

        assert_eq!(store.delete_slots(p.id, &[slot.id]).await.unwrap(), 1);
        assert_eq!(store.fetch_plan_version(p.id).await.unwrap(), 4);

        // nothing removed, nothing bumped
        assert_eq!(store.delete_slots(p.id, &[slot.id]).await.unwrap(), 0);
        assert_eq!(store.fetch_plan_version(p.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn plans_are_scoped_to_their_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let p = store.create_plan(owner, &plan()).await.unwrap();
        assert!(store.fetch_plan(owner, p.id).await.unwrap().is_some());
        assert!(store.fetch_plan(Uuid::new_v4(), p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_plan_cascades() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let p = store.create_plan(user, &plan()).await.unwrap();
        store.insert_slot(&cook(p.id, Uuid::new_v4())).await.unwrap();
        store
            .insert_grocery_items(&[NewGroceryItem {
                meal_plan_id: p.id,
                ingredient_name: "Rice".into(),
                amount: Decimal::ONE,
                unit_code: "cup".into(),
                is_pantry_staple: false,
                is_on_hand: false,
                is_checked: false,
                source_key: "v2|rice|cup|0".into(),
            }])
            .await
            .unwrap();

        assert!(store.delete_plan(p.id).await.unwrap());
        assert!(store.fetch_slots(p.id).await.unwrap().is_empty());
        assert!(store.fetch_grocery_items(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cook_slots_come_back_by_day_then_meal() {
        let store = MemoryStore::new();
        let p = store.create_plan(Uuid::new_v4(), &plan()).await.unwrap();
        let late = Uuid::new_v4();
        let dinner = Uuid::new_v4();
        let lunch = Uuid::new_v4();

        let mut slot = cook(p.id, late);
        slot.plan_date = date!(2024 - 03 - 05);
        store.insert_slot(&slot).await.unwrap();
        store.insert_slot(&cook(p.id, dinner)).await.unwrap();
        let mut slot = cook(p.id, lunch);
        slot.meal_type = MealType::Lunch;
        store.insert_slot(&slot).await.unwrap();

        let recipes: Vec<_> = store
            .fetch_cook_slots(p.id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|s| s.recipe_id)
            .collect();
        assert_eq!(recipes, vec![lunch, dinner, late]);
    }

    #[tokio::test]
    async fn grocery_rows_sort_by_name_ignoring_case() {
        let store = MemoryStore::new();
        let p = store.create_plan(Uuid::new_v4(), &plan()).await.unwrap();
        let row = |name: &str| NewGroceryItem {
            meal_plan_id: p.id,
            ingredient_name: name.into(),
            amount: Decimal::ONE,
            unit_code: "pc".into(),
            is_pantry_staple: false,
            is_on_hand: false,
            is_checked: false,
            source_key: format!("v1|{}|pc|0", name.to_lowercase()),
        };
        store
            .insert_grocery_items(&[row("onion"), row("Basil"), row("apple")])
            .await
            .unwrap();

        let names: Vec<_> = store
            .fetch_grocery_items(p.id)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.ingredient_name)
            .collect();
        assert_eq!(names, vec!["apple", "Basil", "onion"]);
    }

    #[tokio::test]
    async fn updating_plan_dates_keeps_version() {
        let store = MemoryStore::new();
        let p = store.create_plan(Uuid::new_v4(), &plan()).await.unwrap();
        let dates = NewPlan {
            end_date: date!(2024 - 03 - 10),
            pickup_date: Some(date!(2024 - 02 - 29)),
            ..plan()
        };
        let updated = store.update_plan(p.id, &dates).await.unwrap().unwrap();
        assert_eq!(updated.end_date, date!(2024 - 03 - 10));
        assert_eq!(updated.pickup_date, Some(date!(2024 - 02 - 29)));
        assert_eq!(updated.version, 1);
        assert!(store.update_plan(Uuid::new_v4(), &dates).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failures_can_be_healed() {
        let store = MemoryStore::new();
        store.fail_at(FailPoint::FetchIngredients);
        assert!(store.fetch_ingredients(&[Uuid::new_v4()]).await.is_err());
        store.heal(FailPoint::FetchIngredients);
        assert!(store.fetch_ingredients(&[Uuid::new_v4()]).await.is_ok());
    }
}
