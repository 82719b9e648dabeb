use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::value_objects::credits::CreditConfig;

#[automock]
#[async_trait]
pub trait CreditConfigRepository {
    /// Missing or unparseable options fall back to [`CreditConfig::default`] values.
    async fn load_credit_config(&self) -> Result<CreditConfig>;
}
