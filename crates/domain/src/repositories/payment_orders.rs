use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::{
    entities::payment_orders::{InsertPaymentOrderEntity, PaymentOrderEntity},
    value_objects::payments::{OrderFilter, OrderPage, PaymentCompletion},
};

#[automock]
#[async_trait]
pub trait PaymentOrderRepository {
    async fn create(&self, order: InsertPaymentOrderEntity) -> Result<PaymentOrderEntity>;

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<PaymentOrderEntity>>;

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<PaymentOrderEntity>>;

    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid, filter: OrderFilter) -> Result<OrderPage>;

    async fn set_payment_method(
        &self,
        order_no: &str,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Claims a PENDING order as PAID and creates or renews the subscription in
    /// the same transaction. Orders already in a terminal state are reported
    /// back unchanged.
    async fn complete_payment(
        &self,
        order_no: &str,
        trade_no: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentCompletion>;

    /// PENDING -> CANCELLED for the owning user.
    async fn cancel(
        &self,
        order_no: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentOrderEntity>>;

    /// PENDING -> EXPIRED for one order past `expires_at`.
    async fn mark_expired(&self, order_no: &str, now: DateTime<Utc>) -> Result<bool>;

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<usize>;
}
