use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Lazily connected database pool.
///
/// Nothing touches the network until the first query asks for the pool; the
/// first caller connects (and migrates, when enabled) and everyone else
/// waits on the same initialization.
pub struct Database {
    config: DatabaseConfig,
    url: String,
    pool: OnceCell<PgPool>,
}

impl Database {
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .context("Database connection string is required")?;

        Ok(Self {
            config: config.clone(),
            url,
            pool: OnceCell::new(),
        })
    }

    /// Get the connection pool, connecting on first use
    pub async fn pool(&self) -> Result<&PgPool> {
        self.pool.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<PgPool> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(self.config.acquire_timeout())
            .connect(&self.url)
            .await
            .context("Failed to connect to database")?;

        info!("Database connection established");

        if self.config.auto_migrate {
            Self::migrate(&pool).await?;
        } else {
            warn!("Auto-migration is disabled. Run migrations manually with: sqlx migrate run");
        }

        Ok(pool)
    }

    async fn migrate(pool: &PgPool) -> Result<()> {
        info!("Running database migrations...");

        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.pool.initialized()
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(self.pool().await?)
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    /// Gracefully close the pool if it was ever opened
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            info!("Closing database connection pool...");
            pool.close().await;
            info!("Database connection pool closed");
        }
    }
}
