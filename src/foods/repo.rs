use anyhow::Context;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::vision::GuaranteedAnalysis;

/// Fields written by the scan processor. One record per barcode, merge
/// semantics: an upsert overwrites these fields and leaves anything else on
/// the record alone.
#[derive(Debug, Clone)]
pub struct FoodUpsert {
    pub barcode: String,
    pub product_name: String,
    pub brand_name: String,
    pub guaranteed_analysis: GuaranteedAnalysis,
    pub calories_per_100g: f64,
    pub missing: Vec<String>,
    pub front_image: String,
}

#[async_trait]
pub trait FoodStore: Send + Sync {
    async fn upsert(&self, food: FoodUpsert) -> anyhow::Result<()>;
    /// Every `front_image` path currently referenced by a food record.
    async fn front_image_paths(&self) -> anyhow::Result<Vec<String>>;
}

#[derive(Clone)]
pub struct PgFoods {
    db: PgPool,
}

impl PgFoods {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FoodStore for PgFoods {
    async fn upsert(&self, food: FoodUpsert) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO foods
                (barcode, product_name, brand_name, guaranteed_analysis,
                 calories_per_100g, missing, front_image, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (barcode) DO UPDATE SET
                product_name        = EXCLUDED.product_name,
                brand_name          = EXCLUDED.brand_name,
                guaranteed_analysis = EXCLUDED.guaranteed_analysis,
                calories_per_100g   = EXCLUDED.calories_per_100g,
                missing             = EXCLUDED.missing,
                front_image         = EXCLUDED.front_image,
                updated_at          = now()
            "#,
        )
        .bind(&food.barcode)
        .bind(&food.product_name)
        .bind(&food.brand_name)
        .bind(Json(&food.guaranteed_analysis))
        .bind(food.calories_per_100g)
        .bind(Json(&food.missing))
        .bind(&food.front_image)
        .execute(&self.db)
        .await
        .context("upsert food")?;
        Ok(())
    }

    async fn front_image_paths(&self) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT front_image FROM foods WHERE front_image <> ''")
                .fetch_all(&self.db)
                .await
                .context("list food front images")?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }
}
