use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::{
    entities::{
        subscription_packages::SubscriptionPackageEntity, subscriptions::SubscriptionEntity,
    },
    ledger::BalanceOutcome,
    value_objects::subscriptions::SubscriptionChange,
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    /// The ACTIVE or CANCELLED row, whether or not `end_date` has passed.
    async fn find_in_force(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Creates, renews or reactivates the user's subscription and applies
    /// `InitializeOnSubscribe` in the same transaction when the package
    /// (or the lifecycle) is new.
    async fn create_or_renew(
        &self,
        user_id: Uuid,
        package: SubscriptionPackageEntity,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionChange>;

    /// ACTIVE -> CANCELLED. `None` when the user has no ACTIVE row.
    async fn cancel(&self, user_id: Uuid, now: DateTime<Utc>)
    -> Result<Option<SubscriptionEntity>>;

    async fn set_auto_renew(
        &self,
        user_id: Uuid,
        auto_renew: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>>;

    /// Moves a lapsed in-force row to EXPIRED and clears the balance in one
    /// transaction. `None` when another caller already did it.
    async fn expire_and_clear(
        &self,
        subscription_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<BalanceOutcome>>;

    /// Every row of the user, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionEntity>>;

    async fn list_lapsed(&self, now: DateTime<Utc>) -> Result<Vec<SubscriptionEntity>>;

    async fn list_active_user_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>>;
}
