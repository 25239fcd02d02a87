use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use aerobook_core::{CoreError, CoreResult};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

pub(crate) fn db_err(err: sqlx::Error) -> CoreError {
    CoreError::StorageError(err.to_string())
}

/// Status columns are TEXT; a value we cannot parse means the row is corrupt.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> CoreResult<T>
where
    T: FromStr<Err = CoreError>,
{
    value
        .parse()
        .map_err(|_| CoreError::StorageError(format!("Unexpected {} value '{}'", column, value)))
}

pub(crate) fn status_list<T: ToString>(statuses: &[T]) -> Vec<String> {
    statuses.iter().map(|s| s.to_string()).collect()
}
