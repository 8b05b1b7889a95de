//! Access to the relational store that owns plans, slots, recipes and grocery rows.
//!
//! Everything the grocery engine and the plan handlers read or write goes
//! through [`Store`]. `PgStore` is the production adapter; `MemoryStore`
//! keeps the same contract in process for the test suite.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[cfg(test)]
mod memory;
mod pg;

#[cfg(test)]
pub use memory::{FailPoint, MemoryStore};
pub use pg::PgStore;

/// Lunch sorts before dinner within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl FromStr for MealType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            other => anyhow::bail!("unknown meal type {other:?}"),
        }
    }
}

/// What a slot contributes: only `Cook` slots feed the grocery list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Cook,
    Leftover,
    EatOut,
}

impl SlotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotType::Cook => "cook",
            SlotType::Leftover => "leftover",
            SlotType::EatOut => "eat_out",
        }
    }
}

impl FromStr for SlotType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cook" => Ok(SlotType::Cook),
            "leftover" => Ok(SlotType::Leftover),
            "eat_out" => Ok(SlotType::EatOut),
            other => anyhow::bail!("unknown slot type {other:?}"),
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MealPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub order_date: Option<Date>,
    pub pickup_date: Option<Date>,
    pub version: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MealPlan {
    pub fn contains(&self, day: Date) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct MealPlanItem {
    pub id: Uuid,
    pub meal_plan_id: Uuid,
    pub plan_date: Date,
    pub meal_type: String,
    pub slot_type: String,
    pub recipe_id: Option<Uuid>,
    pub leftover_source_item_id: Option<Uuid>,
    pub serving_multiplier: Decimal,
    pub note: Option<String>,
}

impl MealPlanItem {
    pub fn slot_type(&self) -> Option<SlotType> {
        self.slot_type.parse().ok()
    }

    pub fn meal_type(&self) -> Option<MealType> {
        self.meal_type.parse().ok()
    }
}

/// The two columns of a cook slot the grocery engine needs.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CookSlot {
    pub recipe_id: Option<Uuid>,
    pub serving_multiplier: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct IngredientRow {
    pub recipe_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub unit_code: String,
    pub is_pantry_staple: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct GroceryListItem {
    pub id: Uuid,
    pub meal_plan_id: Uuid,
    pub ingredient_name: String,
    pub amount: Decimal,
    pub unit_code: String,
    pub is_pantry_staple: bool,
    pub is_on_hand: bool,
    pub is_checked: bool,
    pub source_key: String,
}

/// A grocery row ready for insertion; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGroceryItem {
    pub meal_plan_id: Uuid,
    pub ingredient_name: String,
    pub amount: Decimal,
    pub unit_code: String,
    pub is_pantry_staple: bool,
    pub is_on_hand: bool,
    pub is_checked: bool,
    pub source_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlan {
    pub start_date: Date,
    pub end_date: Date,
    pub order_date: Option<Date>,
    pub pickup_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSlot {
    pub meal_plan_id: Uuid,
    pub plan_date: Date,
    pub meal_type: MealType,
    pub slot_type: SlotType,
    pub recipe_id: Option<Uuid>,
    pub leftover_source_item_id: Option<Uuid>,
    pub serving_multiplier: Decimal,
    pub note: Option<String>,
}

/// Field-level edits a user makes to grocery rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemUpdate {
    ToggleChecked,
    Checked(bool),
    OnHand(bool),
    MoveToMain,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn fetch_plan(&self, user_id: Uuid, plan_id: Uuid) -> anyhow::Result<Option<MealPlan>>;
    /// Plans of the user whose end date is on or after `from`.
    async fn list_plans_ending_from(&self, user_id: Uuid, from: Date)
        -> anyhow::Result<Vec<MealPlan>>;
    async fn create_plan(&self, user_id: Uuid, plan: &NewPlan) -> anyhow::Result<MealPlan>;
    /// Replaces the plan's dates. Leaves the version alone: dates do not feed the grocery list.
    async fn update_plan(&self, plan_id: Uuid, dates: &NewPlan)
        -> anyhow::Result<Option<MealPlan>>;
    /// Removes the plan together with its slots and grocery rows.
    async fn delete_plan(&self, plan_id: Uuid) -> anyhow::Result<bool>;
    async fn fetch_plan_version(&self, plan_id: Uuid) -> anyhow::Result<i32>;

    async fn fetch_slot(&self, plan_id: Uuid, slot_id: Uuid)
        -> anyhow::Result<Option<MealPlanItem>>;
    async fn fetch_slots(&self, plan_id: Uuid) -> anyhow::Result<Vec<MealPlanItem>>;

    // Slot mutations bump the plan version by one in the same unit of work.
    async fn insert_slot(&self, slot: &NewSlot) -> anyhow::Result<MealPlanItem>;
    async fn delete_slots(&self, plan_id: Uuid, slot_ids: &[Uuid]) -> anyhow::Result<u64>;
    async fn delete_slots_at(
        &self,
        plan_id: Uuid,
        plan_date: Date,
        meal_type: MealType,
    ) -> anyhow::Result<u64>;
    async fn update_serving(
        &self,
        plan_id: Uuid,
        slot_id: Uuid,
        serving_multiplier: Decimal,
    ) -> anyhow::Result<Option<MealPlanItem>>;

    /// Cook slots ordered by day, lunch before dinner, then slot id, so
    /// aggregation sees ingredients in the same order on every run.
    async fn fetch_cook_slots(&self, plan_id: Uuid) -> anyhow::Result<Vec<CookSlot>>;
    async fn count_cook_slots(&self, plan_id: Uuid) -> anyhow::Result<i64>;
    /// One batched read for every recipe id given.
    async fn fetch_ingredients(&self, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<IngredientRow>>;

    /// Grocery rows of a plan ordered by ingredient name, ignoring case.
    async fn fetch_grocery_items(&self, plan_id: Uuid) -> anyhow::Result<Vec<GroceryListItem>>;
    async fn delete_grocery_items(&self, plan_id: Uuid) -> anyhow::Result<()>;
    async fn insert_grocery_items(&self, rows: &[NewGroceryItem]) -> anyhow::Result<()>;

    /// Delete then insert. Adapters with transactions run both atomically.
    async fn replace_grocery_items(
        &self,
        plan_id: Uuid,
        rows: &[NewGroceryItem],
    ) -> anyhow::Result<()> {
        self.delete_grocery_items(plan_id).await?;
        if !rows.is_empty() {
            self.insert_grocery_items(rows).await?;
        }
        Ok(())
    }

    async fn update_grocery_items(
        &self,
        plan_id: Uuid,
        item_ids: &[Uuid],
        update: ItemUpdate,
    ) -> anyhow::Result<Vec<GroceryListItem>>;
}
