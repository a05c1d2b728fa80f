use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::config::AppConfig;
use crate::users::{PgUserRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
}

impl AppState {
    /// Connects the pool and returns it alongside the state so the caller
    /// can run migrations before serving.
    pub async fn init(config: AppConfig) -> anyhow::Result<(Self, PgPool)> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let users = Arc::new(PgUserRepository::new(db.clone())) as Arc<dyn UserRepository>;
        Ok((Self::from_parts(Arc::new(config), users), db))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserRepository>) -> Self {
        Self { config, users }
    }

    /// Evaluation date for age and youth derivations, in the configured
    /// offset rather than UTC.
    pub fn today(&self) -> Date {
        local_date(OffsetDateTime::now_utc(), self.config.utc_offset)
    }
}

fn local_date(now: OffsetDateTime, offset: UtcOffset) -> Date {
    now.to_offset(offset).date()
}

#[cfg(test)]
impl AppState {
    pub fn fake() -> Self {
        Self::fake_with_repo().0
    }

    pub fn fake_with_repo() -> (Self, Arc<crate::users::memory::InMemoryUserRepository>) {
        let repo = Arc::new(crate::users::memory::InMemoryUserRepository::default());
        let users = repo.clone() as Arc<dyn UserRepository>;
        (Self::from_parts(Arc::new(AppConfig::for_tests()), users), repo)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime, offset};

    use super::*;

    #[test]
    fn local_date_rolls_over_before_utc() {
        let now = datetime!(2024-06-15 22:00 UTC);
        assert_eq!(local_date(now, offset!(+3)), date!(2024 - 06 - 16));
        assert_eq!(local_date(now, UtcOffset::UTC), date!(2024 - 06 - 15));
    }

    #[test]
    fn local_date_lags_behind_for_negative_offsets() {
        let now = datetime!(2024-06-15 02:00 UTC);
        assert_eq!(local_date(now, offset!(-5)), date!(2024 - 06 - 14));
    }
}
