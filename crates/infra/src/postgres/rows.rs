use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::postgres::schema::{
    api_keys, credit_balances, credit_transactions, payment_orders, subscription_packages,
    subscriptions, usage_records, webhook_events,
};
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
    value_objects::enums::{
        payment_statuses::PaymentStatus, subscription_statuses::SubscriptionStatus,
        transaction_types::TransactionType, webhook_event_statuses::WebhookEventStatus,
    },
};

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = credit_balances)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreditBalanceRow {
    pub user_id: Uuid,
    pub base_credits: i64,
    pub replenish_credits: i64,
    pub current_credits: i64,
    pub last_replenish_at: Option<DateTime<Utc>>,
    pub last_daily_reset_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<CreditBalanceRow> for CreditBalanceEntity {
    fn from(row: CreditBalanceRow) -> Self {
        Self {
            user_id: row.user_id,
            base_credits: row.base_credits,
            replenish_credits: row.replenish_credits,
            current_credits: row.current_credits,
            last_replenish_at: row.last_replenish_at,
            last_daily_reset_at: row.last_daily_reset_at,
            updated_at: row.updated_at,
        }
    }
}

impl CreditBalanceRow {
    pub fn from_entity(balance: &CreditBalanceEntity) -> Self {
        Self {
            user_id: balance.user_id,
            base_credits: balance.base_credits,
            replenish_credits: balance.replenish_credits,
            current_credits: balance.current_credits,
            last_replenish_at: balance.last_replenish_at,
            last_daily_reset_at: balance.last_daily_reset_at,
            updated_at: balance.updated_at,
        }
    }
}

/// Full overwrite of the mutable columns; `None` timestamps are written as NULL.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = credit_balances)]
#[diesel(treat_none_as_null = true)]
pub struct CreditBalanceChangeset {
    pub base_credits: i64,
    pub replenish_credits: i64,
    pub current_credits: i64,
    pub last_replenish_at: Option<DateTime<Utc>>,
    pub last_daily_reset_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CreditBalanceEntity> for CreditBalanceChangeset {
    fn from(balance: &CreditBalanceEntity) -> Self {
        Self {
            base_credits: balance.base_credits,
            replenish_credits: balance.replenish_credits,
            current_credits: balance.current_credits,
            last_replenish_at: balance.last_replenish_at,
            last_daily_reset_at: balance.last_daily_reset_at,
            updated_at: balance.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = credit_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreditTransactionRow {
    pub id: i64,
    pub user_id: Uuid,
    pub type_: String,
    pub amount: i64,
    pub balance: i64,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CreditTransactionRow> for CreditTransactionEntity {
    type Error = anyhow::Error;

    fn try_from(row: CreditTransactionRow) -> Result<Self> {
        let transaction_type = TransactionType::from_str(&row.type_)
            .ok_or_else(|| anyhow!("unknown credit transaction type: {}", row.type_))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            transaction_type,
            amount: row.amount,
            balance: row.balance,
            reference: row.reference,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = credit_transactions)]
pub struct InsertCreditTransactionRow {
    pub user_id: Uuid,
    pub type_: String,
    pub amount: i64,
    pub balance: i64,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = subscription_packages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SubscriptionPackageRow {
    pub id: Uuid,
    pub name: String,
    pub cycle_days: i32,
    pub price_minor: i64,
    pub base_credits: i64,
    pub replenish_credits: i64,
    pub is_active: bool,
}

impl From<SubscriptionPackageRow> for SubscriptionPackageEntity {
    fn from(row: SubscriptionPackageRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            cycle_days: row.cycle_days,
            price_minor: row.price_minor,
            base_credits: row.base_credits,
            replenish_credits: row.replenish_credits,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for SubscriptionEntity {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            package_id: row.package_id,
            status: SubscriptionStatus::from_str(&row.status),
            start_date: row.start_date,
            end_date: row.end_date,
            auto_renew: row.auto_renew,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&SubscriptionEntity> for SubscriptionRow {
    fn from(entity: &SubscriptionEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            package_id: entity.package_id,
            status: entity.status.as_str().to_string(),
            start_date: entity.start_date,
            end_date: entity.end_date,
            auto_renew: entity.auto_renew,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = payment_orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentOrderRow {
    pub id: Uuid,
    pub order_no: String,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub amount_minor: i64,
    pub status: String,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentOrderRow> for PaymentOrderEntity {
    type Error = anyhow::Error;

    fn try_from(row: PaymentOrderRow) -> Result<Self> {
        let status = PaymentStatus::from_str(&row.status)
            .ok_or_else(|| anyhow!("unknown payment order status: {}", row.status))?;

        Ok(Self {
            id: row.id,
            order_no: row.order_no,
            user_id: row.user_id,
            package_id: row.package_id,
            amount_minor: row.amount_minor,
            status,
            payment_method: row.payment_method,
            transaction_id: row.transaction_id,
            expires_at: row.expires_at,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payment_orders)]
pub struct InsertPaymentOrderRow {
    pub id: Uuid,
    pub order_no: String,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub amount_minor: i64,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsertPaymentOrderRow {
    pub fn pending(order: InsertPaymentOrderEntity, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_no: order.order_no,
            user_id: order.user_id,
            package_id: order.package_id,
            amount_minor: order.amount_minor,
            status: PaymentStatus::Pending.as_str().to_string(),
            expires_at: order.expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WebhookEventRow {
    pub event_id: String,
    pub event_type: String,
    pub status: String,
    pub payload: serde_json::Value,
    pub error_msg: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl From<WebhookEventRow> for WebhookEventEntity {
    fn from(row: WebhookEventRow) -> Self {
        Self {
            event_id: row.event_id,
            event_type: row.event_type,
            status: WebhookEventStatus::from_str(&row.status),
            payload: row.payload,
            error_msg: row.error_msg,
            processed_at: row.processed_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = usage_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UsageRecordRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub api_key_id: Uuid,
    pub event_id: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cost_usd: f64,
    pub credits_charged: i64,
    pub created_at: DateTime<Utc>,
}

impl From<UsageRecordRow> for UsageRecordEntity {
    fn from(row: UsageRecordRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            api_key_id: row.api_key_id,
            event_id: row.event_id,
            model: row.model,
            prompt_tokens: row.prompt_tokens,
            completion_tokens: row.completion_tokens,
            total_tokens: row.total_tokens,
            cost_usd: row.cost_usd,
            credits_charged: row.credits_charged,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = api_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ApiKeyRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub remote_key_id: String,
    pub name: Option<String>,
}

impl From<ApiKeyRow> for ApiKeyEntity {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            remote_key_id: row.remote_key_id,
            name: row.name,
        }
    }
}
