//! Subscription lifecycle writes that must share a transaction with the
//! balance they drive.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::{PgConnection, prelude::*};
use uuid::Uuid;

use crate::postgres::{
    ledger_tx::{apply_in_tx, lock_or_create_balance},
    rows::SubscriptionRow,
    schema::subscriptions,
};
use domain::{
    entities::{
        subscription_packages::SubscriptionPackageEntity, subscriptions::SubscriptionEntity,
    },
    ledger::{BalanceOperation, BalanceOutcome},
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscriptions::{GrantPlan, SubscriptionChange, plan_grant},
    },
};

pub const IN_FORCE: [&str; 2] = ["active", "cancelled"];

fn initialize(package: &SubscriptionPackageEntity, reference: Option<String>) -> BalanceOperation {
    BalanceOperation::InitializeOnSubscribe {
        base_credits: package.base_credits,
        replenish_credits: package.replenish_credits,
        reference,
    }
}

fn lock_in_force(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<SubscriptionEntity>> {
    let row = subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .filter(subscriptions::status.eq_any(IN_FORCE))
        .select(SubscriptionRow::as_select())
        .for_update()
        .first::<SubscriptionRow>(conn)
        .optional()?;

    Ok(row.map(SubscriptionEntity::from))
}

/// Moves one in-force row to EXPIRED when its end date has passed.
/// Returns false when it was not lapsed or someone else got there first.
fn mark_expired(conn: &mut PgConnection, subscription_id: Uuid, now: DateTime<Utc>) -> QueryResult<bool> {
    let updated = diesel::update(
        subscriptions::table
            .filter(subscriptions::id.eq(subscription_id))
            .filter(subscriptions::status.eq_any(IN_FORCE))
            .filter(subscriptions::end_date.lt(now)),
    )
    .set((
        subscriptions::status.eq(SubscriptionStatus::Expired.as_str()),
        subscriptions::auto_renew.eq(false),
        subscriptions::updated_at.eq(now),
    ))
    .execute(conn)?;

    Ok(updated > 0)
}

pub fn create_or_renew_in_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    package: &SubscriptionPackageEntity,
    reference: Option<String>,
    now: DateTime<Utc>,
    default_timezone: Tz,
) -> Result<SubscriptionChange> {
    // Balance lock first, same order as the expiry path.
    lock_or_create_balance(conn, user_id, now)?;

    let current = lock_in_force(conn, user_id)?;
    let plan = plan_grant(current.as_ref(), package, now);

    let subscription = match &plan {
        GrantPlan::Extend {
            subscription_id,
            end_date,
            ..
        } => {
            let row = diesel::update(subscriptions::table.find(*subscription_id))
                .set((
                    subscriptions::package_id.eq(package.id),
                    subscriptions::status.eq(SubscriptionStatus::Active.as_str()),
                    subscriptions::end_date.eq(*end_date),
                    subscriptions::updated_at.eq(now),
                ))
                .returning(SubscriptionRow::as_returning())
                .get_result::<SubscriptionRow>(conn)?;
            SubscriptionEntity::from(row)
        }
        GrantPlan::Replace {
            expire,
            start_date,
            end_date,
        } => {
            if let Some(old_id) = expire {
                if mark_expired(conn, *old_id, now)? {
                    apply_in_tx(
                        conn,
                        user_id,
                        &BalanceOperation::ClearOnExpire {
                            reference: Some(old_id.to_string()),
                        },
                        now,
                        default_timezone,
                    )?;
                }
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
            diesel::insert_into(subscriptions::table)
                .values(SubscriptionRow::from(&subscription))
                .execute(conn)?;
            subscription
        }
    };

    if plan.initializes_balance() {
        apply_in_tx(conn, user_id, &initialize(package, reference), now, default_timezone)?;
    }

    Ok(plan.change(subscription))
}

/// Expires a lapsed subscription and clears its owner's balance.
pub fn expire_and_clear_in_tx(
    conn: &mut PgConnection,
    subscription: &SubscriptionEntity,
    now: DateTime<Utc>,
    default_timezone: Tz,
) -> Result<Option<BalanceOutcome>> {
    lock_or_create_balance(conn, subscription.user_id, now)?;

    if !mark_expired(conn, subscription.id, now)? {
        return Ok(None);
    }

    let outcome = apply_in_tx(
        conn,
        subscription.user_id,
        &BalanceOperation::ClearOnExpire {
            reference: Some(subscription.id.to_string()),
        },
        now,
        default_timezone,
    )?;

    Ok(Some(outcome))
}

/// Lazy expiry for writers that charge credits: a lapsed in-force row is
/// expired and its balance cleared before the caller touches the balance.
pub fn settle_lapsed_in_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    now: DateTime<Utc>,
    default_timezone: Tz,
) -> Result<Option<BalanceOutcome>> {
    lock_or_create_balance(conn, user_id, now)?;

    match lock_in_force(conn, user_id)? {
        Some(current) if current.is_lapsed(now) => {
            expire_and_clear_in_tx(conn, &current, now, default_timezone)
        }
        _ => Ok(None),
    }
}
