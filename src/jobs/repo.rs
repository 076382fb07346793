use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

const DAILY_RESET_FLAG: &str = "daily_reset";

/// Sentinel record guarding at-most-once-per-day execution of the reset job.
#[async_trait]
pub trait SystemStore: Send + Sync {
    async fn last_reset_date(&self) -> anyhow::Result<Option<NaiveDate>>;
    async fn set_last_reset_date(&self, date: NaiveDate) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgSystem {
    db: PgPool,
}

impl PgSystem {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SystemStore for PgSystem {
    async fn last_reset_date(&self) -> anyhow::Result<Option<NaiveDate>> {
        let row: Option<(Option<NaiveDate>,)> =
            sqlx::query_as("SELECT last_reset_date FROM system_flags WHERE id = $1")
                .bind(DAILY_RESET_FLAG)
                .fetch_optional(&self.db)
                .await
                .context("read reset sentinel")?;
        Ok(row.and_then(|(d,)| d))
    }

    async fn set_last_reset_date(&self, date: NaiveDate) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_flags (id, last_reset_date)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET last_reset_date = EXCLUDED.last_reset_date
            "#,
        )
        .bind(DAILY_RESET_FLAG)
        .bind(date)
        .execute(&self.db)
        .await
        .context("write reset sentinel")?;
        Ok(())
    }
}
