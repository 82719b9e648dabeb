//! Single-process store implementing every repository trait. Each trait call
//! runs under one async mutex and restores a snapshot when it fails, so a
//! call is atomic the way a database transaction is. Used by tests and local
//! runs without Postgres.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use uuid::Uuid;

use domain::{
    entities::{
        api_keys::ApiKeyEntity,
        credit_balances::CreditBalanceEntity,
        credit_transactions::CreditTransactionEntity,
        payment_orders::{InsertPaymentOrderEntity, PaymentOrderEntity},
        subscription_packages::SubscriptionPackageEntity,
        subscriptions::SubscriptionEntity,
        usage_records::UsageRecordEntity,
        webhook_events::WebhookEventEntity,
    },
    ledger::{
        BalanceOperation, BalanceOutcome, LedgerContext, calendar::resolve_timezone,
        plan_operation, verify_plan,
    },
    repositories::{
        api_keys::ApiKeyRepository, credit_config::CreditConfigRepository,
        credit_ledger::CreditLedgerRepository, payment_orders::PaymentOrderRepository,
        subscription_packages::SubscriptionPackageRepository,
        subscriptions::SubscriptionRepository, usage_events::UsageEventRepository,
    },
    value_objects::{
        credits::{CreditConfig, TransactionFilter, TransactionPage},
        enums::{
            payment_statuses::PaymentStatus, subscription_statuses::SubscriptionStatus,
            webhook_event_statuses::{EventClaim, WebhookEventStatus},
        },
        payments::{OrderFilter, OrderPage, PaymentCompletion},
        subscriptions::{GrantPlan, SubscriptionChange, plan_grant},
        usage_records::{UsageRecordFilter, UsageRecordPage, UsageSummary},
        usage_webhook::{NewUsageEvent, UsageIngestOutcome},
    },
};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    balances: HashMap<Uuid, CreditBalanceEntity>,
    transactions: Vec<CreditTransactionEntity>,
    next_transaction_id: i64,
    subscriptions: Vec<SubscriptionEntity>,
    packages: HashMap<Uuid, SubscriptionPackageEntity>,
    orders: HashMap<String, PaymentOrderEntity>,
    events: HashMap<String, WebhookEventEntity>,
    usage_records: Vec<UsageRecordEntity>,
    api_keys: Vec<ApiKeyEntity>,
    timezones: HashMap<Uuid, String>,
    config: CreditConfig,
}

impl MemoryState {
    fn atomically<T>(&mut self, f: impl FnOnce(&mut MemoryState) -> Result<T>) -> Result<T> {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    fn balance_or_create(&mut self, user_id: Uuid, now: DateTime<Utc>) -> CreditBalanceEntity {
        self.balances
            .entry(user_id)
            .or_insert_with(|| CreditBalanceEntity::empty(user_id, now))
            .clone()
    }

    fn has_active_subscription(&self, user_id: Uuid, now: DateTime<Utc>) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.user_id == user_id && s.grants_credits(now))
    }

    fn in_force_index(&self, user_id: Uuid) -> Option<usize> {
        self.subscriptions
            .iter()
            .position(|s| s.user_id == user_id && s.status.is_in_force())
    }

    fn apply(
        &mut self,
        user_id: Uuid,
        op: &BalanceOperation,
        now: DateTime<Utc>,
        default_timezone: Tz,
    ) -> Result<BalanceOutcome> {
        let prior = self.balance_or_create(user_id, now);

        let mut ctx = LedgerContext::new(now, default_timezone);
        if op.needs_subscription_context() {
            ctx.has_active_subscription = self.has_active_subscription(user_id, now);
            let stored = self.timezones.get(&user_id).map(String::as_str);
            ctx.timezone = resolve_timezone(stored, default_timezone);
        }
        if let Some(reference) = op.once_only_reference() {
            let kind = op.transaction_type();
            ctx.reference_seen = self.transactions.iter().any(|t| {
                t.user_id == user_id
                    && t.transaction_type == kind
                    && t.reference.as_deref() == Some(reference)
            });
        }

        let plan = plan_operation(&prior, op, &ctx)?;
        verify_plan(&prior, op, &plan)?;

        if plan.mutates(&prior) {
            self.balances.insert(user_id, plan.next.clone());
        }
        if let Some(entry) = plan.entry {
            self.next_transaction_id += 1;
            self.transactions.push(CreditTransactionEntity {
                id: self.next_transaction_id,
                user_id,
                transaction_type: entry.transaction_type,
                amount: entry.amount,
                balance: entry.balance,
                reference: entry.reference,
                description: Some(entry.description),
                created_at: now,
            });
        }

        Ok(plan.outcome)
    }

    fn expire_at(
        &mut self,
        index: usize,
        now: DateTime<Utc>,
        default_timezone: Tz,
    ) -> Result<Option<BalanceOutcome>> {
        let subscription = &mut self.subscriptions[index];
        if !subscription.is_lapsed(now) {
            return Ok(None);
        }
        subscription.status = SubscriptionStatus::Expired;
        subscription.auto_renew = false;
        subscription.updated_at = now;
        let user_id = subscription.user_id;
        let reference = Some(subscription.id.to_string());

        let outcome = self.apply(
            user_id,
            &BalanceOperation::ClearOnExpire { reference },
            now,
            default_timezone,
        )?;
        Ok(Some(outcome))
    }

    /// Expires the user's in-force subscription if its end date has passed.
    fn settle_lapsed(
        &mut self,
        user_id: Uuid,
        now: DateTime<Utc>,
        default_timezone: Tz,
    ) -> Result<Option<BalanceOutcome>> {
        match self.in_force_index(user_id) {
            Some(index) => self.expire_at(index, now, default_timezone),
            None => Ok(None),
        }
    }

    fn create_or_renew(
        &mut self,
        user_id: Uuid,
        package: &SubscriptionPackageEntity,
        reference: Option<String>,
        now: DateTime<Utc>,
        default_timezone: Tz,
    ) -> Result<SubscriptionChange> {
        let index = self.in_force_index(user_id);
        let plan = plan_grant(index.map(|i| &self.subscriptions[i]), package, now);

        let subscription = match &plan {
            GrantPlan::Extend { end_date, .. } => {
                let index = index.ok_or_else(|| anyhow!("extend planned without a row"))?;
                let current = &mut self.subscriptions[index];
                current.end_date = *end_date;
                current.package_id = package.id;
                current.status = SubscriptionStatus::Active;
                current.updated_at = now;
                current.clone()
            }
            GrantPlan::Replace {
                expire,
                start_date,
                end_date,
            } => {
                if let (Some(_), Some(index)) = (expire, index) {
                    self.expire_at(index, now, default_timezone)?;
                }
                let subscription = SubscriptionEntity {
                    id: Uuid::new_v4(),
                    user_id,
                    package_id: package.id,
                    status: SubscriptionStatus::Active,
                    start_date: *start_date,
                    end_date: *end_date,
                    auto_renew: false,
                    created_at: now,
                    updated_at: now,
                };
                self.subscriptions.push(subscription.clone());
                subscription
            }
        };

        if plan.initializes_balance() {
            let initialize = BalanceOperation::InitializeOnSubscribe {
                base_credits: package.base_credits,
                replenish_credits: package.replenish_credits,
                reference,
            };
            self.apply(user_id, &initialize, now, default_timezone)?;
        }

        Ok(plan.change(subscription))
    }
}

pub struct InMemoryBillingStore {
    state: Mutex<MemoryState>,
    default_timezone: Tz,
}

impl InMemoryBillingStore {
    pub fn new(default_timezone: Tz) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            default_timezone,
        }
    }

    pub async fn set_credit_config(&self, config: CreditConfig) {
        self.state.lock().await.config = config;
    }

    pub async fn insert_package(&self, package: SubscriptionPackageEntity) {
        self.state.lock().await.packages.insert(package.id, package);
    }

    pub async fn insert_api_key(&self, api_key: ApiKeyEntity) {
        self.state.lock().await.api_keys.push(api_key);
    }

    pub async fn insert_subscription(&self, subscription: SubscriptionEntity) {
        self.state.lock().await.subscriptions.push(subscription);
    }

    pub async fn set_user_timezone(&self, user_id: Uuid, timezone: &str) {
        self.state
            .lock()
            .await
            .timezones
            .insert(user_id, timezone.to_string());
    }

    pub async fn balance_of(&self, user_id: Uuid) -> Option<CreditBalanceEntity> {
        self.state.lock().await.balances.get(&user_id).cloned()
    }

    /// Ledger entries of one user, oldest first.
    pub async fn transactions_of(&self, user_id: Uuid) -> Vec<CreditTransactionEntity> {
        self.state
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn subscriptions_of(&self, user_id: Uuid) -> Vec<SubscriptionEntity> {
        self.state
            .lock()
            .await
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn usage_records_of(&self, user_id: Uuid) -> Vec<UsageRecordEntity> {
        self.state
            .lock()
            .await
            .usage_records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn event_count(&self) -> usize {
        self.state.lock().await.events.len()
    }
}

#[async_trait]
impl CreditLedgerRepository for InMemoryBillingStore {
    async fn apply(
        &self,
        user_id: Uuid,
        op: BalanceOperation,
        now: DateTime<Utc>,
    ) -> Result<BalanceOutcome> {
        let tz = self.default_timezone;
        let mut state = self.state.lock().await;
        state.atomically(|state| state.apply(user_id, &op, now, tz))
    }

    async fn find_or_create_balance(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CreditBalanceEntity> {
        Ok(self.state.lock().await.balance_or_create(user_id, now))
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: TransactionFilter,
    ) -> Result<TransactionPage> {
        let state = self.state.lock().await;

        let mut matching = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .filter(|t| {
                filter
                    .transaction_type
                    .is_none_or(|kind| t.transaction_type == kind)
            })
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let records = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.page_size as usize)
            .collect();

        Ok(TransactionPage::new(records, total, &filter))
    }

    async fn list_replenish_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let state = self.state.lock().await;

        let mut user_ids = state
            .balances
            .values()
            .filter(|b| b.replenish_credits > 0 && b.below_ceiling())
            .filter(|b| state.has_active_subscription(b.user_id, now))
            .map(|b| b.user_id)
            .collect::<Vec<_>>();
        user_ids.sort();

        Ok(user_ids)
    }

    async fn find_user_timezone(&self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self.state.lock().await.timezones.get(&user_id).cloned())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryBillingStore {
    async fn find_in_force(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let state = self.state.lock().await;
        Ok(state
            .in_force_index(user_id)
            .map(|index| state.subscriptions[index].clone()))
    }

    async fn create_or_renew(
        &self,
        user_id: Uuid,
        package: SubscriptionPackageEntity,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionChange> {
        let tz = self.default_timezone;
        let mut state = self.state.lock().await;
        state.atomically(|state| state.create_or_renew(user_id, &package, reference, now, tz))
    }

    async fn cancel(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut state = self.state.lock().await;

        let Some(subscription) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.user_id == user_id && s.grants_credits(now))
        else {
            return Ok(None);
        };
        subscription.status = SubscriptionStatus::Cancelled;
        subscription.auto_renew = false;
        subscription.updated_at = now;

        Ok(Some(subscription.clone()))
    }

    async fn set_auto_renew(
        &self,
        user_id: Uuid,
        auto_renew: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut state = self.state.lock().await;

        let Some(subscription) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.user_id == user_id && s.status.is_in_force() && s.end_date >= now)
        else {
            return Ok(None);
        };
        subscription.auto_renew = auto_renew;
        subscription.updated_at = now;

        Ok(Some(subscription.clone()))
    }

    async fn expire_and_clear(
        &self,
        subscription_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<BalanceOutcome>> {
        let tz = self.default_timezone;
        let mut state = self.state.lock().await;

        let Some(index) = state
            .subscriptions
            .iter()
            .position(|s| s.id == subscription_id)
        else {
            return Ok(None);
        };

        state.atomically(|state| state.expire_at(index, now, tz))
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionEntity>> {
        let state = self.state.lock().await;

        let mut rows = state
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(rows)
    }

    async fn list_lapsed(&self, now: DateTime<Utc>) -> Result<Vec<SubscriptionEntity>> {
        Ok(self
            .state
            .lock()
            .await
            .subscriptions
            .iter()
            .filter(|s| s.is_lapsed(now))
            .cloned()
            .collect())
    }

    async fn list_active_user_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let state = self.state.lock().await;

        let mut user_ids = state
            .subscriptions
            .iter()
            .filter(|s| s.grants_credits(now))
            .map(|s| s.user_id)
            .collect::<Vec<_>>();
        user_ids.sort();
        user_ids.dedup();

        Ok(user_ids)
    }
}

#[async_trait]
impl SubscriptionPackageRepository for InMemoryBillingStore {
    async fn find_by_id(&self, package_id: Uuid) -> Result<Option<SubscriptionPackageEntity>> {
        Ok(self.state.lock().await.packages.get(&package_id).cloned())
    }
}

#[async_trait]
impl PaymentOrderRepository for InMemoryBillingStore {
    async fn create(&self, order: InsertPaymentOrderEntity) -> Result<PaymentOrderEntity> {
        let mut state = self.state.lock().await;
        if state.orders.contains_key(&order.order_no) {
            return Err(anyhow!("duplicate order_no {}", order.order_no));
        }

        let now = Utc::now();
        let entity = PaymentOrderEntity {
            id: Uuid::new_v4(),
            order_no: order.order_no,
            user_id: order.user_id,
            package_id: order.package_id,
            amount_minor: order.amount_minor,
            status: PaymentStatus::Pending,
            payment_method: None,
            transaction_id: None,
            expires_at: order.expires_at,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(entity.order_no.clone(), entity.clone());

        Ok(entity)
    }

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<PaymentOrderEntity>> {
        Ok(self.state.lock().await.orders.get(order_no).cloned())
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<PaymentOrderEntity>> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .values()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid, filter: OrderFilter) -> Result<OrderPage> {
        let state = self.state.lock().await;

        let mut matching = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .filter(|o| filter.status.is_none_or(|status| o.status == status))
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.order_no.cmp(&a.order_no))
        });

        let total = matching.len() as i64;
        let records = matching
            .into_iter()
            .skip(filter.page.offset() as usize)
            .take(filter.page.page_size as usize)
            .collect();

        Ok(OrderPage::new(records, total, &filter))
    }

    async fn set_payment_method(
        &self,
        order_no: &str,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(order) = state
            .orders
            .get_mut(order_no)
            .filter(|o| o.status == PaymentStatus::Pending)
        {
            order.payment_method = Some(payment_method.to_string());
            order.updated_at = now;
        }
        Ok(())
    }

    async fn complete_payment(
        &self,
        order_no: &str,
        trade_no: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentCompletion> {
        let tz = self.default_timezone;
        let mut state = self.state.lock().await;

        state.atomically(|state| {
            let Some(order) = state.orders.get_mut(order_no) else {
                return Ok(PaymentCompletion::NotFound);
            };
            if order.status != PaymentStatus::Pending {
                return Ok(PaymentCompletion::AlreadyFinal {
                    status: order.status,
                });
            }
            order.status = PaymentStatus::Paid;
            order.transaction_id = Some(trade_no.to_string());
            order.paid_at = Some(now);
            order.updated_at = now;
            let order = order.clone();

            let package = state.packages.get(&order.package_id).cloned().ok_or_else(|| {
                anyhow!("package {} of order {} is gone", order.package_id, order.order_no)
            })?;
            let change = state.create_or_renew(
                order.user_id,
                &package,
                Some(order.order_no.clone()),
                now,
                tz,
            )?;

            Ok(PaymentCompletion::Paid { order, change })
        })
    }

    async fn cancel(
        &self,
        order_no: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentOrderEntity>> {
        let mut state = self.state.lock().await;

        let Some(order) = state
            .orders
            .get_mut(order_no)
            .filter(|o| o.user_id == user_id && o.status == PaymentStatus::Pending)
        else {
            return Ok(None);
        };
        order.status = PaymentStatus::Cancelled;
        order.updated_at = now;

        Ok(Some(order.clone()))
    }

    async fn mark_expired(&self, order_no: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().await;

        let Some(order) = state.orders.get_mut(order_no).filter(|o| o.is_stale(now)) else {
            return Ok(false);
        };
        order.status = PaymentStatus::Expired;
        order.updated_at = now;

        Ok(true)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state.lock().await;

        let mut expired = 0;
        for order in state.orders.values_mut().filter(|o| o.is_stale(now)) {
            order.status = PaymentStatus::Expired;
            order.updated_at = now;
            expired += 1;
        }

        Ok(expired)
    }
}

#[async_trait]
impl UsageEventRepository for InMemoryBillingStore {
    async fn find_event(&self, event_id: &str) -> Result<Option<WebhookEventEntity>> {
        Ok(self.state.lock().await.events.get(event_id).cloned())
    }

    async fn ingest_usage(
        &self,
        usage: NewUsageEvent,
        now: DateTime<Utc>,
    ) -> Result<UsageIngestOutcome> {
        let tz = self.default_timezone;
        let mut state = self.state.lock().await;

        state.atomically(|state| {
            let existing = state.events.get(&usage.event_id).map(|e| e.status);
            if EventClaim::from_existing(existing) == EventClaim::Done {
                return Ok(UsageIngestOutcome::AlreadyProcessed);
            }
            state.events.insert(
                usage.event_id.clone(),
                WebhookEventEntity {
                    event_id: usage.event_id.clone(),
                    event_type: usage.event_type.clone(),
                    status: WebhookEventStatus::Processed,
                    payload: usage.payload.clone(),
                    error_msg: None,
                    processed_at: now,
                },
            );

            let usage_record_id = Uuid::new_v4();
            state.usage_records.push(UsageRecordEntity {
                id: usage_record_id,
                user_id: usage.user_id,
                api_key_id: usage.api_key_id,
                event_id: usage.event_id.clone(),
                model: usage.model.clone(),
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                cost_usd: usage.cost_usd,
                credits_charged: usage.credits,
                created_at: now,
            });

            let deduction = if usage.credits > 0 {
                state.settle_lapsed(usage.user_id, now, tz)?;
                let op = BalanceOperation::Deduct {
                    amount: usage.credits,
                    reason: usage.deduct_reason(),
                    reference: Some(usage_record_id.to_string()),
                };
                Some(state.apply(usage.user_id, &op, now, tz)?)
            } else {
                None
            };

            Ok(UsageIngestOutcome::Recorded {
                usage_record_id,
                deduction,
            })
        })
    }

    async fn mark_failed(
        &self,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
        error_msg: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let event = state
            .events
            .entry(event_id.to_string())
            .or_insert_with(|| WebhookEventEntity {
                event_id: event_id.to_string(),
                event_type: event_type.to_string(),
                status: WebhookEventStatus::Failed,
                payload,
                error_msg: None,
                processed_at: now,
            });
        if EventClaim::from_existing(Some(event.status)) != EventClaim::Done {
            event.status = WebhookEventStatus::Failed;
            event.error_msg = Some(error_msg.to_string());
            event.processed_at = now;
        }

        Ok(())
    }

    async fn list_usage_records(
        &self,
        user_id: Uuid,
        filter: UsageRecordFilter,
    ) -> Result<UsageRecordPage> {
        let state = self.state.lock().await;

        let mut matching = state
            .usage_records
            .iter()
            .filter(|r| r.user_id == user_id && filter.matches(r))
            .cloned()
            .collect::<Vec<_>>();
        // Reversed first so equal timestamps stay newest-ingested first.
        matching.reverse();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let summary = matching.iter().fold(UsageSummary::default(), |acc, r| UsageSummary {
            total_tokens: acc.total_tokens + r.total_tokens,
            total_credits: acc.total_credits + r.credits_charged,
        });
        let total = matching.len() as i64;
        let records = matching
            .into_iter()
            .skip(filter.page.offset() as usize)
            .take(filter.page.page_size as usize)
            .collect();

        Ok(UsageRecordPage::new(records, total, summary, &filter))
    }

    async fn purge_processed_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state.lock().await;

        let before = state.events.len();
        state
            .events
            .retain(|_, e| !(e.status == WebhookEventStatus::Processed && e.processed_at < cutoff));

        Ok(before - state.events.len())
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryBillingStore {
    async fn find_by_remote_key_id(&self, remote_key_id: &str) -> Result<Option<ApiKeyEntity>> {
        Ok(self
            .state
            .lock()
            .await
            .api_keys
            .iter()
            .find(|k| k.remote_key_id == remote_key_id)
            .cloned())
    }
}

#[async_trait]
impl CreditConfigRepository for InMemoryBillingStore {
    async fn load_credit_config(&self) -> Result<CreditConfig> {
        Ok(self.state.lock().await.config)
    }
}
