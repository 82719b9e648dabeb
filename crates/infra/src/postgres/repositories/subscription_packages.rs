use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::PgPoolSquad, rows::SubscriptionPackageRow, schema::subscription_packages,
};
use domain::{
    entities::subscription_packages::SubscriptionPackageEntity,
    repositories::subscription_packages::SubscriptionPackageRepository,
};

pub struct SubscriptionPackagePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPackagePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

pub(crate) fn load_package(
    conn: &mut PgConnection,
    package_id: Uuid,
) -> QueryResult<Option<SubscriptionPackageEntity>> {
    let row = subscription_packages::table
        .find(package_id)
        .select(SubscriptionPackageRow::as_select())
        .first::<SubscriptionPackageRow>(conn)
        .optional()?;

    Ok(row.map(SubscriptionPackageEntity::from))
}

#[async_trait]
impl SubscriptionPackageRepository for SubscriptionPackagePostgres {
    async fn find_by_id(&self, package_id: Uuid) -> Result<Option<SubscriptionPackageEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SubscriptionPackageEntity>> {
            let mut conn = db_pool.get()?;
            Ok(load_package(&mut conn, package_id)?)
        })
        .await??)
    }
}
