use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::foods::repo::{FoodStore, PgFoods};
use crate::jobs::repo::{PgSystem, SystemStore};
use crate::pets::repo::{PetStore, PgPets};
use crate::scans::repo::{PgScans, ScanStore};
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{PgUsers, UserStore};
use crate::vision::{Gemini, VisionClient};

/// Platform handles, passed into every handler instead of living as globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub scans: Arc<dyn ScanStore>,
    pub foods: Arc<dyn FoodStore>,
    pub pets: Arc<dyn PetStore>,
    pub users: Arc<dyn UserStore>,
    pub system: Arc<dyn SystemStore>,
    pub storage: Arc<dyn StorageClient>,
    pub vision: Arc<dyn VisionClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let vision = Arc::new(Gemini::new(&config.vision)) as Arc<dyn VisionClient>;

        let state = Self {
            config,
            scans: Arc::new(PgScans::new(db.clone())),
            foods: Arc::new(PgFoods::new(db.clone())),
            pets: Arc::new(PgPets::new(db.clone())),
            users: Arc::new(PgUsers::new(db.clone())),
            system: Arc::new(PgSystem::new(db.clone())),
            storage,
            vision,
        };
        Ok((state, db))
    }
}
