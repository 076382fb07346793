use anyhow::Context;
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub storage: StorageConfig,
    pub vision: VisionConfig,
    /// Timezone the daily/weekly schedules are pinned to.
    pub timezone: Tz,
    /// Root prefix of scan image folders in object storage.
    pub scan_prefix: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;

        let storage = StorageConfig {
            endpoint: std::env::var("STORAGE_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".into()),
            bucket: std::env::var("STORAGE_BUCKET").context("STORAGE_BUCKET")?,
            access_key: std::env::var("STORAGE_ACCESS_KEY").context("STORAGE_ACCESS_KEY")?,
            secret_key: std::env::var("STORAGE_SECRET_KEY").context("STORAGE_SECRET_KEY")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };

        let vision = VisionConfig {
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            api_key: std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY")?,
            model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash-001".into()),
        };

        let tz_name = std::env::var("SCHEDULE_TZ").unwrap_or_else(|_| "America/New_York".into());
        let timezone: Tz = tz_name
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid SCHEDULE_TZ {tz_name:?}: {e}"))?;

        let scan_prefix = std::env::var("SCAN_PREFIX").unwrap_or_else(|_| "package-scans".into());

        Ok(Self {
            database_url,
            storage,
            vision,
            timezone,
            scan_prefix,
        })
    }
}
