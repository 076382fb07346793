use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Processing => "processing",
            ScanStatus::Done => "done",
            ScanStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "processing" => ScanStatus::Processing,
            "done" => ScanStatus::Done,
            "error" => ScanStatus::Error,
            _ => ScanStatus::Pending,
        }
    }
}

/// A client-submitted pair of package images awaiting label extraction.
#[derive(Debug, Clone)]
pub struct PackageScan {
    pub id: String,
    pub front_path: Option<String>,
    pub back_path: Option<String>,
    pub barcode: String,
    pub status: ScanStatus,
    pub message: Option<String>,
}

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn get(&self, id: &str) -> anyhow::Result<Option<PackageScan>>;
    async fn set_status(
        &self,
        id: &str,
        status: ScanStatus,
        message: Option<&str>,
    ) -> anyhow::Result<()>;
    /// No-op when the record is already gone.
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, FromRow)]
struct ScanRow {
    id: String,
    front_path: Option<String>,
    back_path: Option<String>,
    barcode: String,
    status: String,
    message: Option<String>,
}

impl From<ScanRow> for PackageScan {
    fn from(row: ScanRow) -> Self {
        PackageScan {
            id: row.id,
            front_path: row.front_path,
            back_path: row.back_path,
            barcode: row.barcode,
            status: ScanStatus::from_str(&row.status),
            message: row.message,
        }
    }
}

#[derive(Clone)]
pub struct PgScans {
    db: PgPool,
}

impl PgScans {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ScanStore for PgScans {
    async fn get(&self, id: &str) -> anyhow::Result<Option<PackageScan>> {
        let row = sqlx::query_as::<_, ScanRow>(
            r#"
            SELECT id, front_path, back_path, barcode, status, message
            FROM package_scans
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get package scan")?;
        Ok(row.map(PackageScan::from))
    }

    async fn set_status(
        &self,
        id: &str,
        status: ScanStatus,
        message: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE package_scans
            SET status = $2, message = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(message)
        .execute(&self.db)
        .await
        .context("set scan status")?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM package_scans WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete package scan")?;
        Ok(())
    }
}
