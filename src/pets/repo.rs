use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

pub const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

/// One weekday slot of the weekly ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayTotals {
    #[serde(rename = "Calories")]
    pub calories: f64,
    #[serde(rename = "Carbohydrates")]
    pub carbohydrates: f64,
    #[serde(rename = "CrudeFat")]
    pub crude_fat: f64,
    #[serde(rename = "CrudeProtein")]
    pub crude_protein: f64,
}

pub type WeeklyNutrients = BTreeMap<String, DayTotals>;

/// A fresh ledger: all seven weekdays present, all zero.
pub fn zeroed_week() -> WeeklyNutrients {
    WEEKDAYS
        .iter()
        .map(|d| (d.to_string(), DayTotals::default()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Pet {
    pub id: String,
    pub owner_uids: Vec<String>,
    pub calorie_intake: f64,
    pub nutritional_intake: HashMap<String, f64>,
    pub meal_log: serde_json::Value,
    pub exercise_log: serde_json::Value,
    pub weekly_nutrients: WeeklyNutrients,
}

#[async_trait]
pub trait PetStore: Send + Sync {
    async fn list_all(&self) -> anyhow::Result<Vec<Pet>>;
    async fn list_owned_by(&self, uid: &str) -> anyhow::Result<Vec<Pet>>;
    /// Write the new weekly ledger and zero the running daily counters.
    async fn apply_reset(&self, id: &str, weekly: WeeklyNutrients) -> anyhow::Result<()>;
    async fn set_owners(&self, id: &str, owners: Vec<String>) -> anyhow::Result<()>;
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, FromRow)]
struct PetRow {
    id: String,
    owner_uids: Vec<String>,
    calorie_intake: f64,
    nutritional_intake: Json<HashMap<String, f64>>,
    meal_log: Json<serde_json::Value>,
    exercise_log: Json<serde_json::Value>,
    weekly_nutrients: Json<WeeklyNutrients>,
}

impl From<PetRow> for Pet {
    fn from(row: PetRow) -> Self {
        Pet {
            id: row.id,
            owner_uids: row.owner_uids,
            calorie_intake: row.calorie_intake,
            nutritional_intake: row.nutritional_intake.0,
            meal_log: row.meal_log.0,
            exercise_log: row.exercise_log.0,
            weekly_nutrients: row.weekly_nutrients.0,
        }
    }
}

const PET_COLUMNS: &str = r#"
    id, owner_uids, calorie_intake, nutritional_intake,
    meal_log, exercise_log, weekly_nutrients
"#;

#[derive(Clone)]
pub struct PgPets {
    db: PgPool,
}

impl PgPets {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PetStore for PgPets {
    async fn list_all(&self) -> anyhow::Result<Vec<Pet>> {
        let rows = sqlx::query_as::<_, PetRow>(&format!("SELECT {PET_COLUMNS} FROM pets"))
            .fetch_all(&self.db)
            .await
            .context("list pets")?;
        Ok(rows.into_iter().map(Pet::from).collect())
    }

    async fn list_owned_by(&self, uid: &str) -> anyhow::Result<Vec<Pet>> {
        let rows = sqlx::query_as::<_, PetRow>(&format!(
            "SELECT {PET_COLUMNS} FROM pets WHERE $1 = ANY(owner_uids)"
        ))
        .bind(uid)
        .fetch_all(&self.db)
        .await
        .context("list pets by owner")?;
        Ok(rows.into_iter().map(Pet::from).collect())
    }

    async fn apply_reset(&self, id: &str, weekly: WeeklyNutrients) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE pets SET
                weekly_nutrients   = $2,
                calorie_intake     = 0,
                nutritional_intake = '{}'::jsonb,
                meal_log           = '[]'::jsonb,
                exercise_log       = '[]'::jsonb
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Json(&weekly))
        .execute(&self.db)
        .await
        .context("apply pet reset")?;
        Ok(())
    }

    async fn set_owners(&self, id: &str, owners: Vec<String>) -> anyhow::Result<()> {
        sqlx::query("UPDATE pets SET owner_uids = $2 WHERE id = $1")
            .bind(id)
            .bind(&owners)
            .execute(&self.db)
            .await
            .context("set pet owners")?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM pets WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete pet")?;
        Ok(())
    }
}
