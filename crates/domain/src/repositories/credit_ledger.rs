use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::{
    entities::credit_balances::CreditBalanceEntity,
    ledger::{BalanceOperation, BalanceOutcome},
    value_objects::credits::{TransactionFilter, TransactionPage},
};

#[automock]
#[async_trait]
pub trait CreditLedgerRepository {
    /// Applies one operation in a single transaction: creates the balance row
    /// if missing, locks it, plans and verifies, then writes the row and at most
    /// one ledger entry. A failed invariant check rolls the transaction back and
    /// surfaces `LedgerError::InvariantViolation`.
    async fn apply(
        &self,
        user_id: Uuid,
        op: BalanceOperation,
        now: DateTime<Utc>,
    ) -> Result<BalanceOutcome>;

    async fn find_or_create_balance(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CreditBalanceEntity>;

    async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: TransactionFilter,
    ) -> Result<TransactionPage>;

    /// Users with an ACTIVE unexpired subscription, a replenish rate and room
    /// below the ceiling.
    async fn list_replenish_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>>;

    async fn find_user_timezone(&self, user_id: Uuid) -> Result<Option<String>>;
}
