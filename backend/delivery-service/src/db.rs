use db_pool::{create_pool, DbConfig};
use sqlx::migrate::Migrator;
use sqlx::PgPool;

pub const SERVICE_NAME: &str = "delivery-service";

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connect, verify and migrate.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let cfg = DbConfig::with_url(SERVICE_NAME, database_url.to_string())
        .map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;
    cfg.log_config();
    let pool = create_pool(cfg).await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}
