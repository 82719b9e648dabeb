use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::subscription_packages::SubscriptionPackageEntity;

#[automock]
#[async_trait]
pub trait SubscriptionPackageRepository {
    async fn find_by_id(&self, package_id: Uuid) -> Result<Option<SubscriptionPackageEntity>>;
}
