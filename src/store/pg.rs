use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use time::Date;
use uuid::Uuid;

use super::{
    CookSlot, GroceryListItem, IngredientRow, ItemUpdate, MealPlan, MealPlanItem, MealType,
    NewGroceryItem, NewPlan, NewSlot, Store,
};

const PLAN_COLUMNS: &str =
    "id, user_id, start_date, end_date, order_date, pickup_date, version, created_at";
const SLOT_COLUMNS: &str = "id, meal_plan_id, plan_date, meal_type, slot_type, recipe_id, \
                            leftover_source_item_id, serving_multiplier, note";
const GROCERY_COLUMNS: &str = "id, meal_plan_id, ingredient_name, amount, unit_code, \
                               is_pantry_staple, is_on_hand, is_checked, source_key";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

async fn bump_version_tx(tx: &mut Transaction<'_, Postgres>, plan_id: Uuid) -> anyhow::Result<i32> {
    let (version,): (i32,) = sqlx::query_as(
        r#"
        UPDATE meal_plans
           SET version = version + 1
         WHERE id = $1
        RETURNING version
        "#,
    )
    .bind(plan_id)
    .fetch_one(&mut **tx)
    .await
    .context("bump plan version")?;
    tracing::debug!(%plan_id, version, "plan version bumped");
    Ok(version)
}

async fn delete_grocery_tx(
    tx: &mut Transaction<'_, Postgres>,
    plan_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM grocery_list_items WHERE meal_plan_id = $1")
        .bind(plan_id)
        .execute(&mut **tx)
        .await
        .context("delete grocery items")?;
    Ok(())
}

async fn insert_grocery_tx(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[NewGroceryItem],
) -> anyhow::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut qb = QueryBuilder::<Postgres>::new(
        "INSERT INTO grocery_list_items \
         (meal_plan_id, ingredient_name, amount, unit_code, is_pantry_staple, \
          is_on_hand, is_checked, source_key) ",
    );
    qb.push_values(rows, |mut b, row| {
        b.push_bind(row.meal_plan_id)
            .push_bind(row.ingredient_name.clone())
            .push_bind(row.amount)
            .push_bind(row.unit_code.clone())
            .push_bind(row.is_pantry_staple)
            .push_bind(row.is_on_hand)
            .push_bind(row.is_checked)
            .push_bind(row.source_key.clone());
    });
    qb.build()
        .execute(&mut **tx)
        .await
        .context("insert grocery items")?;
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn fetch_plan(&self, user_id: Uuid, plan_id: Uuid) -> anyhow::Result<Option<MealPlan>> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM meal_plans WHERE id = $1 AND user_id = $2");
        let plan = sqlx::query_as::<_, MealPlan>(&sql)
            .bind(plan_id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("fetch plan")?;
        Ok(plan)
    }

    async fn list_plans_ending_from(
        &self,
        user_id: Uuid,
        from: Date,
    ) -> anyhow::Result<Vec<MealPlan>> {
        let sql = format!(
            "SELECT {PLAN_COLUMNS} FROM meal_plans \
             WHERE user_id = $1 AND end_date >= $2 \
             ORDER BY start_date ASC"
        );
        let plans = sqlx::query_as::<_, MealPlan>(&sql)
            .bind(user_id)
            .bind(from)
            .fetch_all(&self.db)
            .await
            .context("list plans")?;
        Ok(plans)
    }

    async fn create_plan(&self, user_id: Uuid, plan: &NewPlan) -> anyhow::Result<MealPlan> {
        let sql = format!(
            "INSERT INTO meal_plans (user_id, start_date, end_date, order_date, pickup_date) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {PLAN_COLUMNS}"
        );
        let created = sqlx::query_as::<_, MealPlan>(&sql)
            .bind(user_id)
            .bind(plan.start_date)
            .bind(plan.end_date)
            .bind(plan.order_date)
            .bind(plan.pickup_date)
            .fetch_one(&self.db)
            .await
            .context("insert plan")?;
        Ok(created)
    }

    async fn update_plan(
        &self,
        plan_id: Uuid,
        dates: &NewPlan,
    ) -> anyhow::Result<Option<MealPlan>> {
        let sql = format!(
            "UPDATE meal_plans \
             SET start_date = $2, end_date = $3, order_date = $4, pickup_date = $5 \
             WHERE id = $1 \
             RETURNING {PLAN_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, MealPlan>(&sql)
            .bind(plan_id)
            .bind(dates.start_date)
            .bind(dates.end_date)
            .bind(dates.order_date)
            .bind(dates.pickup_date)
            .fetch_optional(&self.db)
            .await
            .context("update plan")?;
        Ok(updated)
    }

    async fn delete_plan(&self, plan_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM meal_plans WHERE id = $1")
            .bind(plan_id)
            .execute(&self.db)
            .await
            .context("delete plan")?;
        Ok(res.rows_affected() > 0)
    }

    async fn fetch_plan_version(&self, plan_id: Uuid) -> anyhow::Result<i32> {
        let (version,): (i32,) = sqlx::query_as("SELECT version FROM meal_plans WHERE id = $1")
            .bind(plan_id)
            .fetch_one(&self.db)
            .await
            .context("fetch plan version")?;
        Ok(version)
    }

    async fn fetch_slot(
        &self,
        plan_id: Uuid,
        slot_id: Uuid,
    ) -> anyhow::Result<Option<MealPlanItem>> {
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM meal_plan_items WHERE id = $1 AND meal_plan_id = $2"
        );
        let slot = sqlx::query_as::<_, MealPlanItem>(&sql)
            .bind(slot_id)
            .bind(plan_id)
            .fetch_optional(&self.db)
            .await
            .context("fetch slot")?;
        Ok(slot)
    }

    async fn fetch_slots(&self, plan_id: Uuid) -> anyhow::Result<Vec<MealPlanItem>> {
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM meal_plan_items \
             WHERE meal_plan_id = $1 \
             ORDER BY plan_date ASC, meal_type DESC"
        );
        let slots = sqlx::query_as::<_, MealPlanItem>(&sql)
            .bind(plan_id)
            .fetch_all(&self.db)
            .await
            .context("fetch slots")?;
        Ok(slots)
    }

    async fn insert_slot(&self, slot: &NewSlot) -> anyhow::Result<MealPlanItem> {
        let sql = format!(
            "INSERT INTO meal_plan_items \
             (meal_plan_id, plan_date, meal_type, slot_type, recipe_id, \
              leftover_source_item_id, serving_multiplier, note) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {SLOT_COLUMNS}"
        );
        let mut tx = self.db.begin().await.context("begin tx")?;
        let inserted = sqlx::query_as::<_, MealPlanItem>(&sql)
            .bind(slot.meal_plan_id)
            .bind(slot.plan_date)
            .bind(slot.meal_type.as_str())
            .bind(slot.slot_type.as_str())
            .bind(slot.recipe_id)
            .bind(slot.leftover_source_item_id)
            .bind(slot.serving_multiplier)
            .bind(slot.note.as_deref())
            .fetch_one(&mut *tx)
            .await
            .context("insert slot")?;
        bump_version_tx(&mut tx, slot.meal_plan_id).await?;
        tx.commit().await.context("commit tx")?;
        Ok(inserted)
    }

    async fn delete_slots(&self, plan_id: Uuid, slot_ids: &[Uuid]) -> anyhow::Result<u64> {
        if slot_ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.db.begin().await.context("begin tx")?;
        let removed = sqlx::query(
            "DELETE FROM meal_plan_items WHERE meal_plan_id = $1 AND id = ANY($2)",
        )
        .bind(plan_id)
        .bind(slot_ids)
        .execute(&mut *tx)
        .await
        .context("delete slots")?
        .rows_affected();
        if removed > 0 {
            bump_version_tx(&mut tx, plan_id).await?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(removed)
    }

    async fn delete_slots_at(
        &self,
        plan_id: Uuid,
        plan_date: Date,
        meal_type: MealType,
    ) -> anyhow::Result<u64> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let removed = sqlx::query(
            r#"
            DELETE FROM meal_plan_items
             WHERE meal_plan_id = $1 AND plan_date = $2 AND meal_type = $3
            "#,
        )
        .bind(plan_id)
        .bind(plan_date)
        .bind(meal_type.as_str())
        .execute(&mut *tx)
        .await
        .context("clear slot")?
        .rows_affected();
        if removed > 0 {
            bump_version_tx(&mut tx, plan_id).await?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(removed)
    }

    async fn update_serving(
        &self,
        plan_id: Uuid,
        slot_id: Uuid,
        serving_multiplier: Decimal,
    ) -> anyhow::Result<Option<MealPlanItem>> {
        let sql = format!(
            "UPDATE meal_plan_items SET serving_multiplier = $3 \
             WHERE id = $1 AND meal_plan_id = $2 \
             RETURNING {SLOT_COLUMNS}"
        );
        let mut tx = self.db.begin().await.context("begin tx")?;
        let updated = sqlx::query_as::<_, MealPlanItem>(&sql)
            .bind(slot_id)
            .bind(plan_id)
            .bind(serving_multiplier)
            .fetch_optional(&mut *tx)
            .await
            .context("update serving")?;
        if updated.is_some() {
            bump_version_tx(&mut tx, plan_id).await?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(updated)
    }

    async fn fetch_cook_slots(&self, plan_id: Uuid) -> anyhow::Result<Vec<CookSlot>> {
        let rows = sqlx::query_as::<_, CookSlot>(
            r#"
            SELECT recipe_id, serving_multiplier
              FROM meal_plan_items
             WHERE meal_plan_id = $1 AND slot_type = 'cook'
             ORDER BY plan_date, meal_type DESC, id
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.db)
        .await
        .context("fetch cook slots")?;
        Ok(rows)
    }

    async fn count_cook_slots(&self, plan_id: Uuid) -> anyhow::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
              FROM meal_plan_items
             WHERE meal_plan_id = $1 AND slot_type = 'cook'
            "#,
        )
        .bind(plan_id)
        .fetch_one(&self.db)
        .await
        .context("count cook slots")?;
        Ok(count)
    }

    async fn fetch_ingredients(&self, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<IngredientRow>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, IngredientRow>(
            r#"
            SELECT recipe_id, name, amount, unit_code, is_pantry_staple
              FROM ingredients
             WHERE recipe_id = ANY($1)
             ORDER BY recipe_id, position
            "#,
        )
        .bind(recipe_ids)
        .fetch_all(&self.db)
        .await
        .context("fetch ingredients")?;
        Ok(rows)
    }

    async fn fetch_grocery_items(&self, plan_id: Uuid) -> anyhow::Result<Vec<GroceryListItem>> {
        let sql = format!(
            "SELECT {GROCERY_COLUMNS} FROM grocery_list_items \
             WHERE meal_plan_id = $1 \
             ORDER BY lower(ingredient_name), ingredient_name"
        );
        let rows = sqlx::query_as::<_, GroceryListItem>(&sql)
            .bind(plan_id)
            .fetch_all(&self.db)
            .await
            .context("fetch grocery items")?;
        Ok(rows)
    }

    async fn delete_grocery_items(&self, plan_id: Uuid) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        delete_grocery_tx(&mut tx, plan_id).await?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn insert_grocery_items(&self, rows: &[NewGroceryItem]) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        insert_grocery_tx(&mut tx, rows).await?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn replace_grocery_items(
        &self,
        plan_id: Uuid,
        rows: &[NewGroceryItem],
    ) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        delete_grocery_tx(&mut tx, plan_id).await?;
        insert_grocery_tx(&mut tx, rows).await?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn update_grocery_items(
        &self,
        plan_id: Uuid,
        item_ids: &[Uuid],
        update: ItemUpdate,
    ) -> anyhow::Result<Vec<GroceryListItem>> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (set_clause, value) = match update {
            ItemUpdate::ToggleChecked => ("is_checked = NOT is_checked", None),
            ItemUpdate::Checked(v) => ("is_checked = $3", Some(v)),
            ItemUpdate::OnHand(v) => ("is_on_hand = $3", Some(v)),
            ItemUpdate::MoveToMain => ("is_pantry_staple = FALSE", None),
        };
        let sql = format!(
            "UPDATE grocery_list_items SET {set_clause} \
             WHERE meal_plan_id = $1 AND id = ANY($2) \
             RETURNING {GROCERY_COLUMNS}"
        );
        let mut query = sqlx::query_as::<_, GroceryListItem>(&sql)
            .bind(plan_id)
            .bind(item_ids);
        if let Some(v) = value {
            query = query.bind(v);
        }
        let rows = query
            .fetch_all(&self.db)
            .await
            .context("update grocery items")?;
        Ok(rows)
    }
}
