use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::entities::api_keys::ApiKeyEntity;

#[automock]
#[async_trait]
pub trait ApiKeyRepository {
    async fn find_by_remote_key_id(&self, remote_key_id: &str) -> Result<Option<ApiKeyEntity>>;
}
