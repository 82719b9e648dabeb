use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use domain::{
    repositories::payment_orders::PaymentOrderRepository,
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payments::{PaymentCompletion, parse_money},
        subscriptions::SubscriptionChange,
    },
};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};

use crate::{
    errors::{BillingError, BillingResult, storage_failure},
    gateways::{PaymentGateway, PaymentNotification},
};

/// Per-order async mutexes. Entries are dropped once nobody holds or waits on
/// them.
#[derive(Default)]
pub struct OrderLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

pub struct OrderLockGuard<'a> {
    owner: &'a OrderLocks,
    order_no: String,
    _guard: OwnedMutexGuard<()>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, order_no: &str) -> OrderLockGuard<'_> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry(order_no.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        OrderLockGuard {
            owner: self,
            order_no: order_no.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    /// Orders with a held or awaited lock.
    pub fn in_flight(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Drop for OrderLockGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // The map and this guard hold the only references.
        if let Some(lock) = locks.get(&self.order_no) {
            if Arc::strong_count(lock) <= 2 {
                locks.remove(&self.order_no);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Paid {
        order_no: String,
        change: SubscriptionChange,
    },
    AlreadyFinal {
        order_no: String,
        status: PaymentStatus,
    },
    UnknownOrder {
        order_no: String,
    },
}

pub struct PaymentCallbackUseCase {
    order_repo: Arc<dyn PaymentOrderRepository + Send + Sync>,
    gateway: Arc<dyn PaymentGateway>,
    locks: OrderLocks,
    timeout: Duration,
}

impl PaymentCallbackUseCase {
    pub fn new(
        order_repo: Arc<dyn PaymentOrderRepository + Send + Sync>,
        gateway: Arc<dyn PaymentGateway>,
        timeout: Duration,
    ) -> Self {
        Self {
            order_repo,
            gateway,
            locks: OrderLocks::new(),
            timeout,
        }
    }

    /// Any `Ok` is acknowledged to the gateway as `success`; errors as `fail`
    /// so the gateway retries.
    pub async fn handle(&self, params: BTreeMap<String, String>) -> BillingResult<CallbackOutcome> {
        if !self.gateway.verify_callback(&params) {
            warn!(
                order_no = params.get("out_trade_no").map(String::as_str).unwrap_or_default(),
                "payment_callback: signature verification failed"
            );
            return Err(BillingError::InvalidSignature);
        }

        let notification = PaymentNotification::from_params(&params);
        if notification.order_no.is_empty() {
            return Err(BillingError::InvalidPayload(
                "out_trade_no is required".to_string(),
            ));
        }
        if !self.gateway.is_success_status(&notification.trade_status) {
            warn!(
                order_no = %notification.order_no,
                trade_status = %notification.trade_status,
                "payment_callback: trade not successful, ignoring"
            );
            return Err(BillingError::InvalidPayload(format!(
                "trade status {}",
                notification.trade_status
            )));
        }

        let order_no = notification.order_no.clone();
        match tokio::time::timeout(self.timeout, self.settle(notification)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    %order_no,
                    in_flight = self.locks.in_flight(),
                    "payment_callback: timed out, gateway will retry"
                );
                Err(BillingError::Timeout)
            }
        }
    }

    async fn settle(&self, notification: PaymentNotification) -> BillingResult<CallbackOutcome> {
        let order_no = notification.order_no.as_str();
        let _lock = self.locks.acquire(order_no).await;

        let Some(order) = self
            .order_repo
            .find_by_order_no(order_no)
            .await
            .map_err(|err| storage_failure("orders.find_by_order_no", err))?
        else {
            error!(%order_no, "payment_callback: signed callback for unknown order");
            return Ok(CallbackOutcome::UnknownOrder {
                order_no: order_no.to_string(),
            });
        };

        if order.status != PaymentStatus::Pending {
            info!(%order_no, status = %order.status, "payment_callback: order already final");
            return Ok(CallbackOutcome::AlreadyFinal {
                order_no: order_no.to_string(),
                status: order.status,
            });
        }

        if !notification.money.is_empty()
            && parse_money(&notification.money) != Some(order.amount_minor)
        {
            error!(
                %order_no,
                paid = %notification.money,
                expected_minor = order.amount_minor,
                "payment_callback: paid amount does not match order"
            );
            return Err(BillingError::InvalidPayload(
                "paid amount does not match order".to_string(),
            ));
        }

        let completion = self
            .order_repo
            .complete_payment(order_no, &notification.trade_no, Utc::now())
            .await
            .map_err(|err| storage_failure("orders.complete_payment", err))?;

        match completion {
            PaymentCompletion::Paid { order, change } => {
                info!(
                    order_no = %order.order_no,
                    user_id = %order.user_id,
                    trade_no = %notification.trade_no,
                    end_date = %change.subscription().end_date,
                    "payment_callback: order paid, subscription updated"
                );
                Ok(CallbackOutcome::Paid {
                    order_no: order.order_no,
                    change,
                })
            }
            PaymentCompletion::AlreadyFinal { status } => {
                info!(%order_no, %status, "payment_callback: order settled concurrently");
                Ok(CallbackOutcome::AlreadyFinal {
                    order_no: order_no.to_string(),
                    status,
                })
            }
            PaymentCompletion::NotFound => Ok(CallbackOutcome::UnknownOrder {
                order_no: order_no.to_string(),
            }),
        }
    }

    pub fn locks(&self) -> &OrderLocks {
        &self.locks
    }
}
