use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Remove the user's profile record. An already-absent profile is fine;
    /// any other failure propagates so the platform redelivers the event.
    async fn delete_profile(&self, uid: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUsers {
    db: PgPool,
}

impl PgUsers {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUsers {
    async fn delete_profile(&self, uid: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE uid = $1")
            .bind(uid)
            .execute(&self.db)
            .await
            .context("delete user profile")?;
        Ok(())
    }
}
