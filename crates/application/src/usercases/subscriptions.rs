use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::{
        subscription_packages::SubscriptionPackageRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscriptions::{SubscriptionChange, SubscriptionView, days_remaining},
    },
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{BillingError, BillingResult, storage_failure};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepCounts {
    pub processed: usize,
    pub mutated: usize,
    pub failed: usize,
}

/// Loads the in-force subscription and, when its `end_date` has passed,
/// expires it and clears credits before returning. Callers never see a
/// lapsed row.
pub(crate) async fn settle_lapsed(
    subscription_repo: &(dyn SubscriptionRepository + Send + Sync),
    user_id: Uuid,
    now: DateTime<Utc>,
) -> BillingResult<Option<SubscriptionEntity>> {
    let Some(subscription) = subscription_repo
        .find_in_force(user_id)
        .await
        .map_err(|err| storage_failure("subscriptions.find_in_force", err))?
    else {
        return Ok(None);
    };

    if !subscription.is_lapsed(now) {
        return Ok(Some(subscription));
    }

    let cleared = subscription_repo
        .expire_and_clear(subscription.id, now)
        .await
        .map_err(|err| storage_failure("subscriptions.expire_and_clear", err))?;
    match cleared {
        Some(outcome) => info!(
            %user_id,
            subscription_id = %subscription.id,
            cleared = -outcome.delta(),
            "subscriptions: lapsed subscription expired on read"
        ),
        None => info!(
            %user_id,
            subscription_id = %subscription.id,
            "subscriptions: lapsed subscription already expired by another caller"
        ),
    }

    Ok(None)
}

pub struct SubscriptionUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    package_repo: Arc<dyn SubscriptionPackageRepository + Send + Sync>,
}

impl SubscriptionUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        package_repo: Arc<dyn SubscriptionPackageRepository + Send + Sync>,
    ) -> Self {
        Self {
            subscription_repo,
            package_repo,
        }
    }

    pub async fn get_active_subscription(
        &self,
        user_id: Uuid,
    ) -> BillingResult<Option<SubscriptionView>> {
        let now = Utc::now();
        let Some(subscription) =
            settle_lapsed(self.subscription_repo.as_ref(), user_id, now).await?
        else {
            return Ok(None);
        };

        let package = self
            .package_repo
            .find_by_id(subscription.package_id)
            .await
            .map_err(|err| storage_failure("packages.find_by_id", err))?;
        if package.is_none() {
            warn!(
                %user_id,
                package_id = %subscription.package_id,
                "subscriptions: package of current subscription is missing"
            );
        }

        Ok(Some(SubscriptionView {
            days_remaining: days_remaining(subscription.end_date, now),
            subscription,
            package,
        }))
    }

    /// Grants or extends a subscription outside the payment flow.
    pub async fn create_or_renew(
        &self,
        user_id: Uuid,
        package_id: Uuid,
        reference: Option<String>,
    ) -> BillingResult<SubscriptionChange> {
        let now = Utc::now();
        settle_lapsed(self.subscription_repo.as_ref(), user_id, now).await?;

        let package = self
            .package_repo
            .find_by_id(package_id)
            .await
            .map_err(|err| storage_failure("packages.find_by_id", err))?
            .ok_or(BillingError::NotFound("package"))?;
        if !package.is_active {
            return Err(BillingError::InvalidState(format!(
                "package {package_id} is not available"
            )));
        }

        let change = self
            .subscription_repo
            .create_or_renew(user_id, package, reference, now)
            .await
            .map_err(|err| storage_failure("subscriptions.create_or_renew", err))?;

        info!(
            %user_id,
            %package_id,
            end_date = %change.subscription().end_date,
            "subscriptions: subscription granted"
        );
        Ok(change)
    }

    pub async fn cancel(&self, user_id: Uuid) -> BillingResult<SubscriptionEntity> {
        let now = Utc::now();
        let current = settle_lapsed(self.subscription_repo.as_ref(), user_id, now)
            .await?
            .ok_or(BillingError::NotFound("subscription"))?;

        if current.status != SubscriptionStatus::Active {
            return Err(BillingError::InvalidState(format!(
                "subscription is {}, only active subscriptions can be cancelled",
                current.status
            )));
        }

        let cancelled = self
            .subscription_repo
            .cancel(user_id, now)
            .await
            .map_err(|err| storage_failure("subscriptions.cancel", err))?
            .ok_or_else(|| {
                BillingError::InvalidState("subscription changed while cancelling".to_string())
            })?;

        info!(
            %user_id,
            subscription_id = %cancelled.id,
            end_date = %cancelled.end_date,
            "subscriptions: cancelled, credits stay usable until end date"
        );
        Ok(cancelled)
    }

    pub async fn set_auto_renew(
        &self,
        user_id: Uuid,
        auto_renew: bool,
    ) -> BillingResult<SubscriptionEntity> {
        let now = Utc::now();
        settle_lapsed(self.subscription_repo.as_ref(), user_id, now)
            .await?
            .ok_or(BillingError::NotFound("subscription"))?;

        self.subscription_repo
            .set_auto_renew(user_id, auto_renew, now)
            .await
            .map_err(|err| storage_failure("subscriptions.set_auto_renew", err))?
            .ok_or(BillingError::NotFound("subscription"))
    }

    /// Every subscription the user has had, newest first. A lapsed row is
    /// expired before listing so the history never shows it as in force.
    pub async fn history(&self, user_id: Uuid) -> BillingResult<Vec<SubscriptionEntity>> {
        settle_lapsed(self.subscription_repo.as_ref(), user_id, Utc::now()).await?;

        self.subscription_repo
            .list_by_user(user_id)
            .await
            .map_err(|err| storage_failure("subscriptions.list_by_user", err))
    }

    /// Expires every lapsed in-force subscription. One failure does not stop
    /// the rest.
    pub async fn expire_lapsed(&self, now: DateTime<Utc>) -> BillingResult<SweepCounts> {
        let lapsed = self
            .subscription_repo
            .list_lapsed(now)
            .await
            .map_err(|err| storage_failure("subscriptions.list_lapsed", err))?;

        let mut counts = SweepCounts::default();
        for subscription in lapsed {
            counts.processed += 1;
            match self
                .subscription_repo
                .expire_and_clear(subscription.id, now)
                .await
            {
                Ok(Some(_)) => counts.mutated += 1,
                Ok(None) => {}
                Err(err) => {
                    counts.failed += 1;
                    let err = storage_failure("subscriptions.expire_and_clear", err);
                    warn!(
                        user_id = %subscription.user_id,
                        subscription_id = %subscription.id,
                        error = %err,
                        "subscriptions: failed to expire subscription, continuing"
                    );
                }
            }
        }

        info!(
            processed = counts.processed,
            expired = counts.mutated,
            failed = counts.failed,
            "subscriptions: expiration sweep finished"
        );
        Ok(counts)
    }
}
