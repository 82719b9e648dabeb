use anyhow::Result;
use application::usercases::credit_sweeps::{CreditSweepUseCase, SweepRun};
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use domain::ledger::calendar::{next_local_time, next_top_of_hour};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Replenishes at every top of the hour.
pub async fn run_hourly(sweeps: Arc<CreditSweepUseCase>) -> Result<()> {
    info!("credit_scheduler: starting hourly loop");
    loop {
        let next = next_top_of_hour(Utc::now());
        sleep_until(next).await;

        // Spawned so a panic in one run does not end the loop.
        let run = {
            let sweeps = Arc::clone(&sweeps);
            tokio::spawn(async move { sweeps.run_hourly_replenish().await })
        };
        match run.await {
            Ok(SweepRun::Completed { .. }) => {}
            Ok(SweepRun::Skipped) => info!("credit_scheduler: hourly tick skipped, previous run still active"),
            Err(err) => warn!(error = %err, "credit_scheduler: hourly run aborted"),
        }
    }
}

/// Runs the daily sweep once a day at `hour:00` on the scheduler's wall clock.
pub async fn run_daily(sweeps: Arc<CreditSweepUseCase>, timezone: Tz, hour: u32) -> Result<()> {
    let slot = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    info!(%timezone, hour, "credit_scheduler: starting daily loop");
    loop {
        let next = next_local_time(Utc::now(), timezone, slot);
        info!(next_run = %next, "credit_scheduler: daily sweep scheduled");
        sleep_until(next).await;

        let run = {
            let sweeps = Arc::clone(&sweeps);
            tokio::spawn(async move { sweeps.run_daily_sweep().await })
        };
        match run.await {
            Ok(SweepRun::Completed { .. }) => {}
            Ok(SweepRun::Skipped) => info!("credit_scheduler: daily tick skipped, previous run still active"),
            Err(err) => warn!(error = %err, "credit_scheduler: daily run aborted"),
        }
    }
}

/// Sleeps in bounded steps so a wall-clock jump is noticed within a minute.
async fn sleep_until(target: DateTime<Utc>) {
    const MAX_STEP: Duration = Duration::from_secs(60);
    loop {
        let Ok(remaining) = (target - Utc::now()).to_std() else {
            return;
        };
        if remaining.is_zero() {
            return;
        }
        tokio::time::sleep(remaining.min(MAX_STEP)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_until_past_instant_returns_immediately() {
        let started = std::time::Instant::now();
        sleep_until(Utc::now() - chrono::Duration::seconds(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
