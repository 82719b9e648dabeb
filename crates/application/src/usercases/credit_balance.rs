use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use domain::{
    ledger::{
        BalanceOperation, BalanceOutcome,
        calendar::{next_local_midnight, next_top_of_hour, resolve_timezone},
        conversion::usd_to_credits,
    },
    repositories::{
        credit_config::CreditConfigRepository, credit_ledger::CreditLedgerRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::credits::{BalanceView, DeductResult, TransactionFilter, TransactionPage},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    errors::{BillingError, BillingResult, INSUFFICIENT_BALANCE_MESSAGE, storage_failure},
    usercases::subscriptions::settle_lapsed,
};

pub const SIGNUP_BONUS_REFERENCE: &str = "signup-bonus";

pub struct CreditBalanceUseCase {
    ledger_repo: Arc<dyn CreditLedgerRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    config_repo: Arc<dyn CreditConfigRepository + Send + Sync>,
    default_timezone: Tz,
}

impl CreditBalanceUseCase {
    pub fn new(
        ledger_repo: Arc<dyn CreditLedgerRepository + Send + Sync>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        config_repo: Arc<dyn CreditConfigRepository + Send + Sync>,
        default_timezone: Tz,
    ) -> Self {
        Self {
            ledger_repo,
            subscription_repo,
            config_repo,
            default_timezone,
        }
    }

    async fn apply(&self, user_id: Uuid, op: BalanceOperation) -> BillingResult<BalanceOutcome> {
        let name = op.name();
        let outcome = self
            .ledger_repo
            .apply(user_id, op, Utc::now())
            .await
            .map_err(|err| storage_failure(name, err))?;
        debug!(%user_id, operation = name, ?outcome, "credits: operation applied");
        Ok(outcome)
    }

    pub async fn get_balance(&self, user_id: Uuid) -> BillingResult<BalanceView> {
        let now = Utc::now();
        let subscription = settle_lapsed(self.subscription_repo.as_ref(), user_id, now).await?;
        let has_active_subscription = subscription
            .as_ref()
            .is_some_and(|subscription| subscription.grants_credits(now));

        let balance = self
            .ledger_repo
            .find_or_create_balance(user_id, now)
            .await
            .map_err(|err| storage_failure("credits.find_or_create_balance", err))?;

        let next_replenish_at = (has_active_subscription
            && balance.replenish_credits > 0
            && balance.below_ceiling())
        .then(|| next_top_of_hour(now));

        let next_daily_reset_at = if has_active_subscription {
            let stored = self
                .ledger_repo
                .find_user_timezone(user_id)
                .await
                .map_err(|err| storage_failure("credits.find_user_timezone", err))?;
            let timezone = resolve_timezone(stored.as_deref(), self.default_timezone);
            Some(next_local_midnight(now, timezone))
        } else {
            None
        };

        Ok(BalanceView {
            base_credits: balance.base_credits,
            replenish_credits: balance.replenish_credits,
            current_credits: balance.current_credits,
            next_replenish_at,
            next_daily_reset_at,
            has_active_subscription,
        })
    }

    /// Charges `amount` credits if the user has any credit left. The balance may
    /// end up negative.
    pub async fn deduct(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        reference: Option<String>,
    ) -> BillingResult<DeductResult> {
        if amount <= 0 {
            return Err(BillingError::InvalidPayload(format!(
                "deduct amount must be positive, got {amount}"
            )));
        }

        settle_lapsed(self.subscription_repo.as_ref(), user_id, Utc::now()).await?;

        let outcome = self
            .apply(
                user_id,
                BalanceOperation::Deduct {
                    amount,
                    reason: reason.to_string(),
                    reference,
                },
            )
            .await?;

        match outcome {
            BalanceOutcome::Applied { balance, .. } => {
                info!(%user_id, amount, balance, reason, "credits: deducted");
                Ok(DeductResult {
                    ok: true,
                    credits_charged: amount,
                    message: None,
                })
            }
            BalanceOutcome::InsufficientBalance { balance } => {
                info!(%user_id, amount, balance, "credits: deduct declined, no credit left");
                Ok(DeductResult {
                    ok: false,
                    credits_charged: 0,
                    message: Some(INSUFFICIENT_BALANCE_MESSAGE.to_string()),
                })
            }
            BalanceOutcome::Skipped { .. } => Err(BillingError::InvariantViolation(
                "deduct returned a skipped outcome".to_string(),
            )),
        }
    }

    /// Same as [`Self::deduct`] but turns a declined charge into
    /// [`BillingError::InsufficientBalance`] for synchronous callers.
    pub async fn require_deduct(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        reference: Option<String>,
    ) -> BillingResult<DeductResult> {
        let result = self.deduct(user_id, amount, reason, reference).await?;
        if !result.ok {
            return Err(BillingError::InsufficientBalance);
        }
        Ok(result)
    }

    pub async fn deduct_from_external_cost(
        &self,
        user_id: Uuid,
        cost_usd: f64,
        reason: &str,
        reference: Option<String>,
    ) -> BillingResult<DeductResult> {
        let config = self
            .config_repo
            .load_credit_config()
            .await
            .map_err(|err| storage_failure("options.load_credit_config", err))?;
        let credits = usd_to_credits(cost_usd, config.usd_to_credits_rate)?;

        if credits == 0 {
            debug!(%user_id, cost_usd, "credits: cost rounds to zero credits, nothing to charge");
            return Ok(DeductResult {
                ok: true,
                credits_charged: 0,
                message: None,
            });
        }

        self.deduct(user_id, credits, reason, reference).await
    }

    /// Returns the number of credits added.
    pub async fn replenish(&self, user_id: Uuid) -> BillingResult<i64> {
        let outcome = self.apply(user_id, BalanceOperation::Replenish).await?;
        if let BalanceOutcome::Applied { delta, balance } = outcome {
            info!(%user_id, added = delta, balance, "credits: replenished");
        }
        Ok(outcome.delta())
    }

    /// Returns whether a reset happened and the resulting balance.
    pub async fn daily_reset(&self, user_id: Uuid) -> BillingResult<(bool, i64)> {
        let outcome = self.apply(user_id, BalanceOperation::DailyReset).await?;
        if outcome.is_applied() {
            info!(%user_id, balance = outcome.balance(), "credits: daily reset");
        }
        Ok((outcome.is_applied(), outcome.balance()))
    }

    pub async fn initialize_on_subscribe(
        &self,
        user_id: Uuid,
        base_credits: i64,
        replenish_credits: i64,
    ) -> BillingResult<()> {
        self.apply(
            user_id,
            BalanceOperation::InitializeOnSubscribe {
                base_credits,
                replenish_credits,
                reference: None,
            },
        )
        .await?;
        info!(%user_id, base_credits, replenish_credits, "credits: ceiling initialized");
        Ok(())
    }

    /// Returns the number of credits removed.
    pub async fn clear_on_expire(&self, user_id: Uuid) -> BillingResult<i64> {
        let outcome = self
            .apply(user_id, BalanceOperation::ClearOnExpire { reference: None })
            .await?;
        info!(%user_id, cleared = -outcome.delta(), "credits: cleared on expiry");
        Ok(-outcome.delta())
    }

    /// Returns the new balance. The result is clamped at zero.
    pub async fn adjust_by_admin(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
    ) -> BillingResult<i64> {
        let outcome = self
            .apply(
                user_id,
                BalanceOperation::AdjustByAdmin {
                    amount,
                    reason: reason.to_string(),
                },
            )
            .await?;
        if outcome.delta() != amount {
            warn!(
                %user_id,
                requested = amount,
                applied = outcome.delta(),
                "credits: admin adjustment clamped at zero"
            );
        }
        info!(%user_id, amount, balance = outcome.balance(), reason, "credits: admin adjustment");
        Ok(outcome.balance())
    }

    /// Issues the configured free quota once per user. Returns whether credits
    /// were granted by this call.
    pub async fn grant_signup_bonus(&self, user_id: Uuid) -> BillingResult<bool> {
        let config = self
            .config_repo
            .load_credit_config()
            .await
            .map_err(|err| storage_failure("options.load_credit_config", err))?;
        if config.free_quota <= 0 {
            debug!(%user_id, "credits: free quota disabled, no signup bonus");
            return Ok(false);
        }

        let outcome = self
            .apply(
                user_id,
                BalanceOperation::GrantBonus {
                    amount: config.free_quota,
                    reason: "signup bonus".to_string(),
                    reference: SIGNUP_BONUS_REFERENCE.to_string(),
                },
            )
            .await?;
        if outcome.is_applied() {
            info!(%user_id, amount = config.free_quota, "credits: signup bonus granted");
        }
        Ok(outcome.is_applied())
    }

    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: TransactionFilter,
    ) -> BillingResult<TransactionPage> {
        self.ledger_repo
            .list_transactions(user_id, filter)
            .await
            .map_err(|err| storage_failure("credits.list_transactions", err))
    }
}
