use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    entities::{
        subscription_packages::SubscriptionPackageEntity, subscriptions::SubscriptionEntity,
    },
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

/// What `create_or_renew` did to the user's in-force subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionChange {
    Created { subscription: SubscriptionEntity },
    Renewed { subscription: SubscriptionEntity, package_changed: bool },
    /// A CANCELLED row still in force was paid for again.
    Reactivated { subscription: SubscriptionEntity, package_changed: bool },
}

impl SubscriptionChange {
    pub fn subscription(&self) -> &SubscriptionEntity {
        match self {
            SubscriptionChange::Created { subscription }
            | SubscriptionChange::Renewed { subscription, .. }
            | SubscriptionChange::Reactivated { subscription, .. } => subscription,
        }
    }
}

/// Row writes a grant needs, decided from the locked in-force row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantPlan {
    /// Extend the in-force row in place and switch it to `package`.
    Extend {
        subscription_id: Uuid,
        end_date: DateTime<Utc>,
        package_changed: bool,
        was_cancelled: bool,
    },
    /// Insert a fresh ACTIVE row, after expiring the lapsed one if any.
    Replace {
        expire: Option<Uuid>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    },
}

impl GrantPlan {
    /// Whether the balance ceiling and rate have to be rewritten.
    pub fn initializes_balance(&self) -> bool {
        match self {
            GrantPlan::Extend {
                package_changed, ..
            } => *package_changed,
            GrantPlan::Replace { .. } => true,
        }
    }

    /// Wraps the row written for this plan.
    pub fn change(&self, subscription: SubscriptionEntity) -> SubscriptionChange {
        match self {
            GrantPlan::Extend {
                package_changed,
                was_cancelled: true,
                ..
            } => SubscriptionChange::Reactivated {
                subscription,
                package_changed: *package_changed,
            },
            GrantPlan::Extend {
                package_changed, ..
            } => SubscriptionChange::Renewed {
                subscription,
                package_changed: *package_changed,
            },
            GrantPlan::Replace { .. } => SubscriptionChange::Created { subscription },
        }
    }
}

/// A live row is extended from `max(end_date, now)`; a lapsed or missing row
/// is replaced by one starting now.
pub fn plan_grant(
    in_force: Option<&SubscriptionEntity>,
    package: &SubscriptionPackageEntity,
    now: DateTime<Utc>,
) -> GrantPlan {
    let cycle = Duration::days(i64::from(package.cycle_days));

    match in_force {
        Some(current) if !current.is_lapsed(now) => GrantPlan::Extend {
            subscription_id: current.id,
            end_date: current.end_date.max(now) + cycle,
            package_changed: current.package_id != package.id,
            was_cancelled: current.status == SubscriptionStatus::Cancelled,
        },
        lapsed => GrantPlan::Replace {
            expire: lapsed.map(|s| s.id),
            start_date: now,
            end_date: now + cycle,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub subscription: SubscriptionEntity,
    pub package: Option<SubscriptionPackageEntity>,
    pub days_remaining: i64,
}

/// Whole days left until `end_date`, rounded up, never negative.
pub fn days_remaining(end_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (end_date - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + 86_399) / 86_400
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn package(id: Uuid) -> SubscriptionPackageEntity {
        SubscriptionPackageEntity {
            id,
            name: "Pro".to_string(),
            cycle_days: 30,
            price_minor: 2990,
            base_credits: 10_000,
            replenish_credits: 200,
            is_active: true,
        }
    }

    fn in_force(
        package_id: Uuid,
        status: SubscriptionStatus,
        end_date: DateTime<Utc>,
    ) -> SubscriptionEntity {
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            package_id,
            status,
            start_date: end_date - Duration::days(30),
            end_date,
            auto_renew: false,
            created_at: end_date - Duration::days(30),
            updated_at: end_date - Duration::days(30),
        }
    }

    #[test]
    fn grant_without_a_row_creates_and_initializes() {
        let plan = plan_grant(None, &package(Uuid::new_v4()), now());
        assert_eq!(
            plan,
            GrantPlan::Replace {
                expire: None,
                start_date: now(),
                end_date: now() + Duration::days(30),
            }
        );
        assert!(plan.initializes_balance());
    }

    #[test]
    fn grant_on_same_package_extends_from_end_date_without_initializing() {
        let package_id = Uuid::new_v4();
        let current = in_force(package_id, SubscriptionStatus::Active, now() + Duration::days(5));
        let plan = plan_grant(Some(&current), &package(package_id), now());

        assert_eq!(
            plan,
            GrantPlan::Extend {
                subscription_id: current.id,
                end_date: now() + Duration::days(35),
                package_changed: false,
                was_cancelled: false,
            }
        );
        assert!(!plan.initializes_balance());
        assert!(matches!(
            plan.change(current),
            SubscriptionChange::Renewed { package_changed: false, .. }
        ));
    }

    #[test]
    fn grant_on_cancelled_row_with_new_package_reactivates() {
        let current = in_force(
            Uuid::new_v4(),
            SubscriptionStatus::Cancelled,
            now() + Duration::days(1),
        );
        let plan = plan_grant(Some(&current), &package(Uuid::new_v4()), now());

        assert!(plan.initializes_balance());
        assert!(matches!(
            plan.change(current),
            SubscriptionChange::Reactivated { package_changed: true, .. }
        ));
    }

    #[test]
    fn grant_on_lapsed_row_expires_it_and_starts_now() {
        let package_id = Uuid::new_v4();
        let current = in_force(package_id, SubscriptionStatus::Active, now() - Duration::hours(1));
        let plan = plan_grant(Some(&current), &package(package_id), now());

        assert_eq!(
            plan,
            GrantPlan::Replace {
                expire: Some(current.id),
                start_date: now(),
                end_date: now() + Duration::days(30),
            }
        );
        assert!(matches!(plan.change(current), SubscriptionChange::Created { .. }));
    }

    #[test]
    fn days_remaining_rounds_up_partial_days() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(days_remaining(now + Duration::hours(1), now), 1);
        assert_eq!(days_remaining(now + Duration::days(30), now), 30);
        assert_eq!(days_remaining(now - Duration::hours(1), now), 0);
    }
}
