use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task;

use crate::postgres::{postgres_connection::PgPoolSquad, rows::ApiKeyRow, schema::api_keys};
use domain::{entities::api_keys::ApiKeyEntity, repositories::api_keys::ApiKeyRepository};

pub struct ApiKeyPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ApiKeyPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ApiKeyRepository for ApiKeyPostgres {
    async fn find_by_remote_key_id(&self, remote_key_id: &str) -> Result<Option<ApiKeyEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let remote_key_id = remote_key_id.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<ApiKeyEntity>> {
            let mut conn = db_pool.get()?;

            let row = api_keys::table
                .filter(api_keys::remote_key_id.eq(&remote_key_id))
                .select(ApiKeyRow::as_select())
                .first::<ApiKeyRow>(&mut conn)
                .optional()?;

            Ok(row.map(ApiKeyEntity::from))
        })
        .await??)
    }
}
