use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task;
use tracing::warn;

use crate::postgres::{postgres_connection::PgPoolSquad, schema::options};
use domain::{
    repositories::credit_config::CreditConfigRepository, value_objects::credits::CreditConfig,
};

pub const USD_TO_CREDITS_RATE_KEY: &str = "UsdToCreditsRate";
pub const FREE_QUOTA_KEY: &str = "FreeQuota";

/// Runtime options stored as key/value rows in `options`.
pub struct CreditConfigPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CreditConfigPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

pub(crate) fn credit_config_from_options<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> CreditConfig {
    let mut config = CreditConfig::default();

    for (key, value) in entries {
        match key {
            USD_TO_CREDITS_RATE_KEY => match value.trim().parse::<f64>() {
                Ok(rate) if rate.is_finite() && rate > 0.0 => config.usd_to_credits_rate = rate,
                _ => warn!(
                    key,
                    value,
                    fallback = config.usd_to_credits_rate,
                    "credit_config: unparseable option, using default"
                ),
            },
            FREE_QUOTA_KEY => match value.trim().parse::<i64>() {
                Ok(quota) => config.free_quota = quota,
                Err(_) => warn!(
                    key,
                    value,
                    fallback = config.free_quota,
                    "credit_config: unparseable option, using default"
                ),
            },
            _ => {}
        }
    }

    config
}

#[async_trait]
impl CreditConfigRepository for CreditConfigPostgres {
    async fn load_credit_config(&self) -> Result<CreditConfig> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<CreditConfig> {
            let mut conn = db_pool.get()?;

            let rows = options::table
                .filter(options::key.eq_any([USD_TO_CREDITS_RATE_KEY, FREE_QUOTA_KEY]))
                .select((options::key, options::value))
                .load::<(String, String)>(&mut conn)?;

            Ok(credit_config_from_options(
                rows.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            ))
        })
        .await??)
    }
}
