use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::{calendar::same_calendar_day, errors::LedgerError};
use crate::{
    entities::credit_balances::CreditBalanceEntity,
    value_objects::enums::transaction_types::TransactionType,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BalanceOperation {
    Deduct {
        amount: i64,
        reason: String,
        reference: Option<String>,
    },
    Replenish,
    DailyReset,
    InitializeOnSubscribe {
        base_credits: i64,
        replenish_credits: i64,
        reference: Option<String>,
    },
    ClearOnExpire {
        reference: Option<String>,
    },
    AdjustByAdmin {
        amount: i64,
        reason: String,
    },
    /// Issued at most once per `reference`.
    GrantBonus {
        amount: i64,
        reason: String,
        reference: String,
    },
}

impl BalanceOperation {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            BalanceOperation::Deduct { .. } => TransactionType::Deduct,
            BalanceOperation::Replenish => TransactionType::Replenish,
            BalanceOperation::DailyReset => TransactionType::DailyReset,
            BalanceOperation::InitializeOnSubscribe { .. }
            | BalanceOperation::ClearOnExpire { .. } => TransactionType::Subscription,
            BalanceOperation::AdjustByAdmin { .. } => TransactionType::AdminAdjust,
            BalanceOperation::GrantBonus { .. } => TransactionType::Bonus,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BalanceOperation::Deduct { .. } => "deduct",
            BalanceOperation::Replenish => "replenish",
            BalanceOperation::DailyReset => "daily_reset",
            BalanceOperation::InitializeOnSubscribe { .. } => "initialize_on_subscribe",
            BalanceOperation::ClearOnExpire { .. } => "clear_on_expire",
            BalanceOperation::AdjustByAdmin { .. } => "adjust_by_admin",
            BalanceOperation::GrantBonus { .. } => "grant_bonus",
        }
    }

    /// Reference a store must look up before planning, for once-only entries.
    pub fn once_only_reference(&self) -> Option<&str> {
        match self {
            BalanceOperation::GrantBonus { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// Whether the plan depends on the user's subscription or calendar.
    pub fn needs_subscription_context(&self) -> bool {
        matches!(
            self,
            BalanceOperation::Replenish | BalanceOperation::DailyReset
        )
    }
}

/// Facts a store reads inside the same transaction before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerContext {
    pub now: DateTime<Utc>,
    pub has_active_subscription: bool,
    pub timezone: Tz,
    /// An entry with the operation's once-only reference already exists.
    pub reference_seen: bool,
}

impl LedgerContext {
    pub fn new(now: DateTime<Utc>, timezone: Tz) -> Self {
        Self {
            now,
            has_active_subscription: false,
            timezone,
            reference_seen: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoActiveSubscription,
    NoReplenishRate,
    AtCeiling,
    NoCeiling,
    AlreadyResetToday,
    AlreadyGranted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BalanceOutcome {
    Applied { delta: i64, balance: i64 },
    Skipped { reason: SkipReason, balance: i64 },
    InsufficientBalance { balance: i64 },
}

impl BalanceOutcome {
    pub fn balance(&self) -> i64 {
        match self {
            BalanceOutcome::Applied { balance, .. }
            | BalanceOutcome::Skipped { balance, .. }
            | BalanceOutcome::InsufficientBalance { balance } => *balance,
        }
    }

    pub fn delta(&self) -> i64 {
        match self {
            BalanceOutcome::Applied { delta, .. } => *delta,
            _ => 0,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, BalanceOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub balance: i64,
    pub reference: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancePlan {
    pub next: CreditBalanceEntity,
    pub entry: Option<PlannedEntry>,
    pub outcome: BalanceOutcome,
}

impl BalancePlan {
    fn unchanged(current: &CreditBalanceEntity, outcome: BalanceOutcome) -> Self {
        Self {
            next: current.clone(),
            entry: None,
            outcome,
        }
    }

    fn skipped(current: &CreditBalanceEntity, reason: SkipReason) -> Self {
        Self::unchanged(
            current,
            BalanceOutcome::Skipped {
                reason,
                balance: current.current_credits,
            },
        )
    }

    /// True when the store has to write the balance row.
    pub fn mutates(&self, prior: &CreditBalanceEntity) -> bool {
        self.entry.is_some() || self.next != *prior
    }
}

fn overflow(op: &BalanceOperation) -> LedgerError {
    LedgerError::InvalidAmount(format!("{} overflows the credit range", op.name()))
}

/// Computes the balance row and ledger entry an operation produces. Does no I/O.
pub fn plan_operation(
    current: &CreditBalanceEntity,
    op: &BalanceOperation,
    ctx: &LedgerContext,
) -> Result<BalancePlan, LedgerError> {
    let credits = current.current_credits;

    match op {
        BalanceOperation::Deduct {
            amount,
            reason,
            reference,
        } => {
            if *amount <= 0 {
                return Err(LedgerError::InvalidAmount(format!(
                    "deduct amount must be positive, got {amount}"
                )));
            }
            // Usage is metered after the fact: the gate is whether any credit
            // was left, and the result may go negative.
            if credits <= 0 {
                return Ok(BalancePlan::unchanged(
                    current,
                    BalanceOutcome::InsufficientBalance { balance: credits },
                ));
            }

            let balance = credits.checked_sub(*amount).ok_or_else(|| overflow(op))?;
            let mut next = current.clone();
            next.current_credits = balance;
            next.updated_at = ctx.now;

            Ok(BalancePlan {
                next,
                entry: Some(PlannedEntry {
                    transaction_type: TransactionType::Deduct,
                    amount: -amount,
                    balance,
                    reference: reference.clone(),
                    description: reason.clone(),
                }),
                outcome: BalanceOutcome::Applied {
                    delta: -amount,
                    balance,
                },
            })
        }
        BalanceOperation::Replenish => {
            if !ctx.has_active_subscription {
                return Ok(BalancePlan::skipped(current, SkipReason::NoActiveSubscription));
            }
            if current.replenish_credits <= 0 {
                return Ok(BalancePlan::skipped(current, SkipReason::NoReplenishRate));
            }
            if credits >= current.base_credits {
                return Ok(BalancePlan::skipped(current, SkipReason::AtCeiling));
            }

            let room = current
                .base_credits
                .checked_sub(credits)
                .ok_or_else(|| overflow(op))?;
            let added = current.replenish_credits.min(room);
            let balance = credits + added;

            let mut next = current.clone();
            next.current_credits = balance;
            next.last_replenish_at = Some(ctx.now);
            next.updated_at = ctx.now;

            Ok(BalancePlan {
                next,
                entry: Some(PlannedEntry {
                    transaction_type: TransactionType::Replenish,
                    amount: added,
                    balance,
                    reference: None,
                    description: format!("hourly replenish of {added} credits"),
                }),
                outcome: BalanceOutcome::Applied {
                    delta: added,
                    balance,
                },
            })
        }
        BalanceOperation::DailyReset => {
            if !ctx.has_active_subscription {
                return Ok(BalancePlan::skipped(current, SkipReason::NoActiveSubscription));
            }
            if current.base_credits <= 0 {
                return Ok(BalancePlan::skipped(current, SkipReason::NoCeiling));
            }
            if let Some(last) = current.last_daily_reset_at {
                if same_calendar_day(last, ctx.now, ctx.timezone) {
                    return Ok(BalancePlan::skipped(current, SkipReason::AlreadyResetToday));
                }
            }

            let balance = current.base_credits;
            let delta = balance.checked_sub(credits).ok_or_else(|| overflow(op))?;

            let mut next = current.clone();
            next.current_credits = balance;
            next.last_daily_reset_at = Some(ctx.now);
            next.updated_at = ctx.now;

            Ok(BalancePlan {
                next,
                entry: Some(PlannedEntry {
                    transaction_type: TransactionType::DailyReset,
                    amount: delta,
                    balance,
                    reference: None,
                    description: format!("daily reset to {balance} credits"),
                }),
                outcome: BalanceOutcome::Applied { delta, balance },
            })
        }
        BalanceOperation::InitializeOnSubscribe {
            base_credits,
            replenish_credits,
            reference,
        } => {
            if *base_credits < 0 || *replenish_credits < 0 {
                return Err(LedgerError::InvalidAmount(format!(
                    "package credits must not be negative (base={base_credits}, replenish={replenish_credits})"
                )));
            }

            // Credits are left as they are and filled by the next tick.
            let mut next = current.clone();
            next.base_credits = *base_credits;
            next.replenish_credits = *replenish_credits;
            next.updated_at = ctx.now;

            Ok(BalancePlan {
                next,
                entry: Some(PlannedEntry {
                    transaction_type: TransactionType::Subscription,
                    amount: 0,
                    balance: credits,
                    reference: reference.clone(),
                    description: format!(
                        "subscription active: ceiling {base_credits}, hourly replenish {replenish_credits}"
                    ),
                }),
                outcome: BalanceOutcome::Applied {
                    delta: 0,
                    balance: credits,
                },
            })
        }
        BalanceOperation::ClearOnExpire { reference } => {
            let mut next = current.clone();
            next.base_credits = 0;
            next.replenish_credits = 0;
            next.current_credits = 0;
            next.updated_at = ctx.now;

            let delta = credits.checked_neg().ok_or_else(|| overflow(op))?;
            let entry = (credits != 0).then(|| PlannedEntry {
                transaction_type: TransactionType::Subscription,
                amount: delta,
                balance: 0,
                reference: reference.clone(),
                description: "subscription expired, credits cleared".to_string(),
            });

            Ok(BalancePlan {
                next,
                entry,
                outcome: BalanceOutcome::Applied { delta, balance: 0 },
            })
        }
        BalanceOperation::AdjustByAdmin { amount, reason } => {
            if *amount == 0 {
                return Err(LedgerError::InvalidAmount(
                    "adjustment amount must not be zero".to_string(),
                ));
            }

            let balance = credits.checked_add(*amount).ok_or_else(|| overflow(op))?.max(0);
            // The entry carries the clamped delta so the log still folds to the balance.
            let delta = balance - credits;

            let mut next = current.clone();
            next.current_credits = balance;
            next.updated_at = ctx.now;

            Ok(BalancePlan {
                next,
                entry: Some(PlannedEntry {
                    transaction_type: TransactionType::AdminAdjust,
                    amount: delta,
                    balance,
                    reference: None,
                    description: format!("admin adjustment: {reason} (requested {amount})"),
                }),
                outcome: BalanceOutcome::Applied { delta, balance },
            })
        }
        BalanceOperation::GrantBonus {
            amount,
            reason,
            reference,
        } => {
            if *amount <= 0 {
                return Err(LedgerError::InvalidAmount(format!(
                    "bonus amount must be positive, got {amount}"
                )));
            }
            if ctx.reference_seen {
                return Ok(BalancePlan::skipped(current, SkipReason::AlreadyGranted));
            }

            let balance = credits.checked_add(*amount).ok_or_else(|| overflow(op))?;
            let mut next = current.clone();
            next.current_credits = balance;
            next.updated_at = ctx.now;

            Ok(BalancePlan {
                next,
                entry: Some(PlannedEntry {
                    transaction_type: TransactionType::Bonus,
                    amount: *amount,
                    balance,
                    reference: Some(reference.clone()),
                    description: reason.clone(),
                }),
                outcome: BalanceOutcome::Applied {
                    delta: *amount,
                    balance,
                },
            })
        }
    }
}

/// Checks the ledger invariants a plan must satisfy before it is persisted.
pub fn verify_plan(
    prior: &CreditBalanceEntity,
    op: &BalanceOperation,
    plan: &BalancePlan,
) -> Result<(), LedgerError> {
    let violation = |detail: String| {
        Err(LedgerError::InvariantViolation(format!(
            "{} for user {}: {detail}",
            op.name(),
            prior.user_id
        )))
    };

    if plan.next.user_id != prior.user_id {
        return violation("plan targets a different user".to_string());
    }
    if plan.outcome.balance() != plan.next.current_credits {
        return violation(format!(
            "outcome balance {} != row balance {}",
            plan.outcome.balance(),
            plan.next.current_credits
        ));
    }
    if plan.next.base_credits < 0 || plan.next.replenish_credits < 0 {
        return violation("negative ceiling or replenish rate".to_string());
    }

    match &plan.entry {
        Some(entry) => {
            if entry.balance != plan.next.current_credits {
                return violation(format!(
                    "entry balance {} != row balance {}",
                    entry.balance, plan.next.current_credits
                ));
            }
            if prior.current_credits.checked_add(entry.amount) != Some(entry.balance) {
                return violation(format!(
                    "prior {} + amount {} != entry balance {}",
                    prior.current_credits, entry.amount, entry.balance
                ));
            }
            if entry.transaction_type != op.transaction_type() {
                return violation(format!(
                    "entry type {} does not match operation",
                    entry.transaction_type
                ));
            }
        }
        None => {
            if plan.next.current_credits != prior.current_credits {
                return violation("balance changed without a ledger entry".to_string());
            }
        }
    }

    if plan.outcome.is_applied()
        && matches!(op, BalanceOperation::Replenish | BalanceOperation::DailyReset)
        && plan.next.current_credits > plan.next.base_credits
    {
        return violation(format!(
            "balance {} above ceiling {}",
            plan.next.current_credits, plan.next.base_credits
        ));
    }

    Ok(())
}
