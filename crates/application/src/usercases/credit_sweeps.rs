use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Duration, Utc};
use domain::repositories::{
    credit_ledger::CreditLedgerRepository, subscriptions::SubscriptionRepository,
    usage_events::UsageEventRepository,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    errors::storage_failure,
    usercases::{
        credit_balance::CreditBalanceUseCase,
        orders::OrderUseCase,
        subscriptions::{SubscriptionUseCase, SweepCounts},
    },
};

/// Non-reentrant flag. Released on drop, including when the sweep panics or
/// its future is cancelled.
pub struct SweepGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SweepGuard<'a> {
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HourlyReport {
    pub processed: usize,
    pub replenished: usize,
    pub failed: usize,
    pub credits_added: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DailyReport {
    pub expired: SweepCounts,
    pub reset: SweepCounts,
    pub orders_expired: usize,
    pub events_purged: usize,
    pub phase_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SweepRun<T> {
    Completed { report: T },
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepRecord<T> {
    pub finished_at: DateTime<Utc>,
    pub report: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub hourly_running: bool,
    pub daily_running: bool,
    pub last_hourly: Option<SweepRecord<HourlyReport>>,
    pub last_daily: Option<SweepRecord<DailyReport>>,
}

#[derive(Default)]
struct SchedulerState {
    hourly_running: AtomicBool,
    daily_running: AtomicBool,
    last_hourly: Mutex<Option<SweepRecord<HourlyReport>>>,
    last_daily: Mutex<Option<SweepRecord<DailyReport>>>,
}

fn remember<T>(slot: &Mutex<Option<SweepRecord<T>>>, report: T) {
    let mut slot = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Some(SweepRecord {
        finished_at: Utc::now(),
        report,
    });
}

fn recall<T: Copy>(slot: &Mutex<Option<SweepRecord<T>>>) -> Option<SweepRecord<T>> {
    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct CreditSweepUseCase {
    credit_balance: Arc<CreditBalanceUseCase>,
    subscriptions: Arc<SubscriptionUseCase>,
    orders: Arc<OrderUseCase>,
    ledger_repo: Arc<dyn CreditLedgerRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    event_repo: Arc<dyn UsageEventRepository + Send + Sync>,
    webhook_retention: Duration,
    state: SchedulerState,
}

impl CreditSweepUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credit_balance: Arc<CreditBalanceUseCase>,
        subscriptions: Arc<SubscriptionUseCase>,
        orders: Arc<OrderUseCase>,
        ledger_repo: Arc<dyn CreditLedgerRepository + Send + Sync>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        event_repo: Arc<dyn UsageEventRepository + Send + Sync>,
        webhook_retention: Duration,
    ) -> Self {
        Self {
            credit_balance,
            subscriptions,
            orders,
            ledger_repo,
            subscription_repo,
            event_repo,
            webhook_retention,
            state: SchedulerState::default(),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            hourly_running: self.state.hourly_running.load(Ordering::Acquire),
            daily_running: self.state.daily_running.load(Ordering::Acquire),
            last_hourly: recall(&self.state.last_hourly),
            last_daily: recall(&self.state.last_daily),
        }
    }

    /// Replenishes every candidate user. Skipped while another hourly sweep runs.
    pub async fn run_hourly_replenish(&self) -> SweepRun<HourlyReport> {
        let Some(_guard) = SweepGuard::try_acquire(&self.state.hourly_running) else {
            warn!("credit_sweeps: hourly replenish already running, skipping trigger");
            return SweepRun::Skipped;
        };

        let now = Utc::now();
        info!("credit_sweeps: hourly replenish started");
        let mut report = HourlyReport::default();

        let candidates = match self.ledger_repo.list_replenish_candidates(now).await {
            Ok(candidates) => candidates,
            Err(err) => {
                let err = storage_failure("credits.list_replenish_candidates", err);
                error!(error = %err, "credit_sweeps: could not load replenish candidates");
                report.failed += 1;
                remember(&self.state.last_hourly, report);
                return SweepRun::Completed { report };
            }
        };

        for user_id in candidates {
            report.processed += 1;
            match self.credit_balance.replenish(user_id).await {
                Ok(0) => {}
                Ok(added) => {
                    report.replenished += 1;
                    report.credits_added += added;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(%user_id, error = %err, "credit_sweeps: replenish failed for user, continuing");
                }
            }
        }

        info!(
            processed = report.processed,
            replenished = report.replenished,
            failed = report.failed,
            credits_added = report.credits_added,
            "credit_sweeps: hourly replenish finished"
        );
        remember(&self.state.last_hourly, report);
        SweepRun::Completed { report }
    }

    /// Expiry, daily reset, stale order expiry and webhook log purge, in that
    /// order. Expiring first keeps lapsed users out of the reset.
    pub async fn run_daily_sweep(&self) -> SweepRun<DailyReport> {
        let Some(_guard) = SweepGuard::try_acquire(&self.state.daily_running) else {
            warn!("credit_sweeps: daily sweep already running, skipping trigger");
            return SweepRun::Skipped;
        };

        let now = Utc::now();
        info!("credit_sweeps: daily sweep started");
        let mut report = DailyReport::default();

        match self.subscriptions.expire_lapsed(now).await {
            Ok(counts) => report.expired = counts,
            Err(err) => {
                report.phase_failures += 1;
                error!(error = %err, "credit_sweeps: expiration phase failed");
            }
        }

        match self.subscription_repo.list_active_user_ids(now).await {
            Ok(user_ids) => {
                for user_id in user_ids {
                    report.reset.processed += 1;
                    match self.credit_balance.daily_reset(user_id).await {
                        Ok((true, _)) => report.reset.mutated += 1,
                        Ok((false, _)) => {}
                        Err(err) => {
                            report.reset.failed += 1;
                            warn!(%user_id, error = %err, "credit_sweeps: daily reset failed for user, continuing");
                        }
                    }
                }
            }
            Err(err) => {
                report.phase_failures += 1;
                let err = storage_failure("subscriptions.list_active_user_ids", err);
                error!(error = %err, "credit_sweeps: reset phase failed");
            }
        }

        match self.orders.expire_stale_orders(now).await {
            Ok(expired) => report.orders_expired = expired,
            Err(err) => {
                report.phase_failures += 1;
                error!(error = %err, "credit_sweeps: order expiry phase failed");
            }
        }

        match self
            .event_repo
            .purge_processed_before(now - self.webhook_retention)
            .await
        {
            Ok(purged) => report.events_purged = purged,
            Err(err) => {
                report.phase_failures += 1;
                let err = storage_failure("webhook_events.purge_processed_before", err);
                error!(error = %err, "credit_sweeps: webhook log purge failed");
            }
        }

        info!(
            expired = report.expired.mutated,
            reset = report.reset.mutated,
            reset_failed = report.reset.failed,
            orders_expired = report.orders_expired,
            events_purged = report.events_purged,
            phase_failures = report.phase_failures,
            "credit_sweeps: daily sweep finished"
        );
        remember(&self.state.last_daily, report);
        SweepRun::Completed { report }
    }
}
