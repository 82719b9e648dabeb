use std::{collections::BTreeMap, sync::Arc, time::Duration as StdDuration};

use application::{
    errors::BillingError,
    usercases::{
        credit_balance::CreditBalanceUseCase,
        credit_sweeps::{CreditSweepUseCase, SweepRun},
        orders::{OrderSettings, OrderUseCase},
        payment_callback::{CallbackOutcome, PaymentCallbackUseCase},
        subscriptions::SubscriptionUseCase,
        usage_webhook::UsageWebhookUseCase,
    },
};
use chrono::{Duration, Utc};
use chrono_tz::Tz;
use domain::{
    entities::{
        api_keys::ApiKeyEntity, payment_orders::InsertPaymentOrderEntity,
        subscription_packages::SubscriptionPackageEntity, subscriptions::SubscriptionEntity,
    },
    repositories::{
        credit_ledger::CreditLedgerRepository, payment_orders::PaymentOrderRepository,
        subscriptions::SubscriptionRepository, usage_events::UsageEventRepository,
    },
    value_objects::{
        enums::{
            payment_statuses::PaymentStatus, subscription_statuses::SubscriptionStatus,
            transaction_types::TransactionType,
        },
        payments::OrderFilter,
        usage_records::UsageRecordFilter,
        usage_webhook::NewUsageEvent,
    },
};
use uuid::Uuid;

use super::InMemoryBillingStore;
use crate::{
    payments::epay_client::{EpayClient, TRADE_SUCCESS},
    webhooks::hmac_verifier::HmacWebhookVerifier,
};

fn store() -> Arc<InMemoryBillingStore> {
    Arc::new(InMemoryBillingStore::new(Tz::UTC))
}

fn package(base_credits: i64, replenish_credits: i64) -> SubscriptionPackageEntity {
    SubscriptionPackageEntity {
        id: Uuid::new_v4(),
        name: "Pro monthly".to_string(),
        cycle_days: 30,
        price_minor: 2990,
        base_credits,
        replenish_credits,
        is_active: true,
    }
}

fn credits(store: &Arc<InMemoryBillingStore>) -> Arc<CreditBalanceUseCase> {
    Arc::new(CreditBalanceUseCase::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Tz::UTC,
    ))
}

fn epay() -> EpayClient {
    EpayClient::new(
        "https://pay.example.com".to_string(),
        "1001".to_string(),
        "merchant-secret".to_string(),
        "https://billing.example.com/api/v1/payment/epay/callback".to_string(),
        "https://app.example.com/billing".to_string(),
        "billing".to_string(),
    )
}

async fn subscribe(
    store: &Arc<InMemoryBillingStore>,
    user_id: Uuid,
    package: &SubscriptionPackageEntity,
) {
    store.insert_package(package.clone()).await;
    store
        .create_or_renew(user_id, package.clone(), None, Utc::now())
        .await
        .unwrap();
}

/// Every entry's running balance and the stored balance equal the fold of amounts.
async fn assert_ledger_folds(store: &InMemoryBillingStore, user_id: Uuid) {
    let entries = store.transactions_of(user_id).await;
    let mut running = 0;
    for entry in &entries {
        running += entry.amount;
        assert_eq!(entry.balance, running, "entry {} breaks the fold", entry.id);
    }
    let balance = store.balance_of(user_id).await.unwrap();
    assert_eq!(balance.current_credits, running);
}

#[tokio::test]
async fn ledger_folds_to_balance_across_operations() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();
    subscribe(&store, user_id, &package(1000, 100)).await;

    assert!(credits.grant_signup_bonus(user_id).await.unwrap());
    credits.deduct(user_id, 300, "chat", None).await.unwrap();
    assert_eq!(credits.adjust_by_admin(user_id, -20_000, "refund abuse").await.unwrap(), 0);
    assert_eq!(credits.replenish(user_id).await.unwrap(), 100);
    assert_eq!(credits.daily_reset(user_id).await.unwrap(), (true, 1000));
    credits.deduct(user_id, 1500, "batch job", None).await.unwrap();

    assert_eq!(store.balance_of(user_id).await.unwrap().current_credits, -500);
    assert_ledger_folds(&store, user_id).await;
}

#[tokio::test]
async fn deduct_overdraws_once_then_declines() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();
    credits.adjust_by_admin(user_id, 1, "seed").await.unwrap();

    let first = credits.deduct(user_id, 100, "chat", None).await.unwrap();
    assert!(first.ok);
    assert_eq!(first.credits_charged, 100);
    assert_eq!(store.balance_of(user_id).await.unwrap().current_credits, -99);

    let second = credits.deduct(user_id, 5, "chat", None).await.unwrap();
    assert!(!second.ok);
    assert_eq!(second.credits_charged, 0);
    assert!(second.message.is_some());

    let err = credits.require_deduct(user_id, 5, "chat", None).await.unwrap_err();
    assert!(matches!(err, BillingError::InsufficientBalance));

    assert_eq!(store.transactions_of(user_id).await.len(), 2);
    assert_eq!(store.balance_of(user_id).await.unwrap().current_credits, -99);
    assert_ledger_folds(&store, user_id).await;
}

#[tokio::test]
async fn zero_balance_declines_without_an_entry() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();

    let result = credits.deduct(user_id, 1, "chat", None).await.unwrap();
    assert!(!result.ok);
    assert!(store.transactions_of(user_id).await.is_empty());
}

#[tokio::test]
async fn replenish_stops_at_the_ceiling() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();
    subscribe(&store, user_id, &package(1000, 100)).await;
    credits.adjust_by_admin(user_id, 950, "seed").await.unwrap();

    assert_eq!(credits.replenish(user_id).await.unwrap(), 50);
    assert_eq!(store.balance_of(user_id).await.unwrap().current_credits, 1000);
    assert_eq!(credits.replenish(user_id).await.unwrap(), 0);

    let replenishes = store
        .transactions_of(user_id)
        .await
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::Replenish)
        .count();
    assert_eq!(replenishes, 1);
}

#[tokio::test]
async fn replenish_needs_an_active_subscription() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();
    credits.adjust_by_admin(user_id, 10, "seed").await.unwrap();

    assert_eq!(credits.replenish(user_id).await.unwrap(), 0);
    assert_eq!(store.transactions_of(user_id).await.len(), 1);
}

#[tokio::test]
async fn daily_reset_runs_once_per_calendar_day() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();
    store.set_user_timezone(user_id, "America/New_York").await;
    subscribe(&store, user_id, &package(1000, 10)).await;

    assert_eq!(credits.daily_reset(user_id).await.unwrap(), (true, 1000));
    assert_eq!(credits.daily_reset(user_id).await.unwrap(), (false, 1000));

    let resets = store
        .transactions_of(user_id)
        .await
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::DailyReset)
        .count();
    assert_eq!(resets, 1);
}

#[tokio::test]
async fn failed_operation_leaves_no_trace() {
    let store = store();
    let user_id = Uuid::new_v4();
    let broken = SubscriptionPackageEntity {
        base_credits: -1,
        ..package(0, 0)
    };
    store.insert_package(broken.clone()).await;

    assert!(
        store
            .create_or_renew(user_id, broken, None, Utc::now())
            .await
            .is_err()
    );
    assert!(store.subscriptions_of(user_id).await.is_empty());
    assert!(store.transactions_of(user_id).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_signup_bonus_is_granted_once() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();

    let handles = (0..8)
        .map(|_| {
            let credits = credits.clone();
            tokio::spawn(async move { credits.grant_signup_bonus(user_id).await.unwrap() })
        })
        .collect::<Vec<_>>();

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(store.balance_of(user_id).await.unwrap().current_credits, 10_000);
    assert_ledger_folds(&store, user_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lapsed_subscription_is_cleared_exactly_once_under_concurrent_reads() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();
    let now = Utc::now();
    credits.adjust_by_admin(user_id, 500, "seed").await.unwrap();
    store
        .insert_subscription(SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            package_id: Uuid::new_v4(),
            status: SubscriptionStatus::Active,
            start_date: now - Duration::days(31),
            end_date: now - Duration::hours(1),
            auto_renew: false,
            created_at: now - Duration::days(31),
            updated_at: now - Duration::days(31),
        })
        .await;

    let handles = (0..8)
        .map(|_| {
            let credits = credits.clone();
            tokio::spawn(async move { credits.get_balance(user_id).await.unwrap() })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        let view = handle.await.unwrap();
        assert_eq!(view.current_credits, 0);
        assert!(!view.has_active_subscription);
    }

    let clears = store
        .transactions_of(user_id)
        .await
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::Subscription)
        .collect::<Vec<_>>();
    assert_eq!(clears.len(), 1);
    assert_eq!(clears[0].amount, -500);
    assert_eq!(
        store.subscriptions_of(user_id).await[0].status,
        SubscriptionStatus::Expired
    );
    assert_ledger_folds(&store, user_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_payment_callbacks_pay_and_renew_once() {
    let store = store();
    let user_id = Uuid::new_v4();
    let package = package(1000, 100);
    store.insert_package(package.clone()).await;
    store
        .create(InsertPaymentOrderEntity {
            order_no: "USR00000000NOABC1231700000000000".to_string(),
            user_id,
            package_id: package.id,
            amount_minor: 2990,
            expires_at: Utc::now() + Duration::minutes(30),
        })
        .await
        .unwrap();

    let gateway = epay();
    let mut params = BTreeMap::from([
        ("out_trade_no".to_string(), "USR00000000NOABC1231700000000000".to_string()),
        ("trade_no".to_string(), "2024050122001".to_string()),
        ("trade_status".to_string(), TRADE_SUCCESS.to_string()),
        ("money".to_string(), "29.90".to_string()),
        ("type".to_string(), "alipay".to_string()),
    ]);
    let sign = gateway.sign(&params);
    params.insert("sign".to_string(), sign);
    params.insert("sign_type".to_string(), "MD5".to_string());

    let callbacks = Arc::new(PaymentCallbackUseCase::new(
        store.clone(),
        Arc::new(gateway),
        StdDuration::from_secs(5),
    ));

    let (a, b) = tokio::join!(
        callbacks.handle(params.clone()),
        callbacks.handle(params.clone())
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let paid = outcomes
        .iter()
        .filter(|o| matches!(o, CallbackOutcome::Paid { .. }))
        .count();
    let already = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o,
                CallbackOutcome::AlreadyFinal {
                    status: PaymentStatus::Paid,
                    ..
                }
            )
        })
        .count();
    assert_eq!((paid, already), (1, 1));

    let replay = callbacks.handle(params).await.unwrap();
    assert!(matches!(replay, CallbackOutcome::AlreadyFinal { .. }));

    let subscriptions = store.subscriptions_of(user_id).await;
    assert_eq!(subscriptions.len(), 1);
    let expected_end = subscriptions[0].start_date + Duration::days(30);
    assert_eq!(subscriptions[0].end_date, expected_end);

    let initializations = store
        .transactions_of(user_id)
        .await
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::Subscription)
        .count();
    assert_eq!(initializations, 1);
    assert_eq!(callbacks.locks().in_flight(), 0);
}

#[tokio::test]
async fn forged_callback_changes_nothing() {
    let store = store();
    let user_id = Uuid::new_v4();
    let package = package(1000, 100);
    store.insert_package(package.clone()).await;
    store
        .create(InsertPaymentOrderEntity {
            order_no: "ORDER-FORGED".to_string(),
            user_id,
            package_id: package.id,
            amount_minor: 2990,
            expires_at: Utc::now() + Duration::minutes(30),
        })
        .await
        .unwrap();

    let callbacks = PaymentCallbackUseCase::new(
        store.clone(),
        Arc::new(epay()),
        StdDuration::from_secs(5),
    );
    let params = BTreeMap::from([
        ("out_trade_no".to_string(), "ORDER-FORGED".to_string()),
        ("trade_status".to_string(), TRADE_SUCCESS.to_string()),
        ("money".to_string(), "29.90".to_string()),
        ("sign".to_string(), "0123456789abcdef0123456789abcdef".to_string()),
    ]);

    let err = callbacks.handle(params).await.unwrap_err();
    assert!(matches!(err, BillingError::InvalidSignature));
    let order = store.find_by_order_no("ORDER-FORGED").await.unwrap().unwrap();
    assert_eq!(order.status, PaymentStatus::Pending);
    assert!(store.subscriptions_of(user_id).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn replayed_usage_webhook_charges_once() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();
    store
        .insert_api_key(ApiKeyEntity {
            id: Uuid::new_v4(),
            user_id,
            remote_key_id: "rk_1".to_string(),
            name: Some("default".to_string()),
        })
        .await;
    credits.adjust_by_admin(user_id, 1000, "seed").await.unwrap();

    let verifier = HmacWebhookVerifier::new("whsec".to_string());
    let body = br#"{"eventId":"evt-1","eventType":"usage","timestamp":1714521600,
        "data":{"remoteKeyId":"rk_1","model":"gpt-4o","promptTokens":10,
        "completionTokens":20,"totalTokens":30,"cost":0.002}}"#;
    let signature = verifier.sign(body).unwrap();

    let webhooks = Arc::new(UsageWebhookUseCase::new(
        Arc::new(verifier),
        store.clone(),
        store.clone(),
        store.clone(),
        StdDuration::from_secs(5),
    ));

    let (a, b) = tokio::join!(
        webhooks.handle(body, Some(&signature)),
        webhooks.handle(body, Some(&signature))
    );
    assert!(a.unwrap().success);
    assert!(b.unwrap().success);
    assert!(webhooks.handle(body, Some(&signature)).await.unwrap().success);

    assert_eq!(store.usage_records_of(user_id).await.len(), 1);
    assert_eq!(store.event_count().await, 1);
    let deducts = store
        .transactions_of(user_id)
        .await
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::Deduct)
        .count();
    assert_eq!(deducts, 1);
    assert_eq!(store.balance_of(user_id).await.unwrap().current_credits, 998);
    assert_ledger_folds(&store, user_id).await;
}

#[tokio::test]
async fn usage_webhook_clears_a_lapsed_subscription_before_charging() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();
    let now = Utc::now();
    store
        .insert_api_key(ApiKeyEntity {
            id: Uuid::new_v4(),
            user_id,
            remote_key_id: "rk_lapsed".to_string(),
            name: None,
        })
        .await;
    credits.adjust_by_admin(user_id, 500, "seed").await.unwrap();
    store
        .insert_subscription(SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            package_id: Uuid::new_v4(),
            status: SubscriptionStatus::Active,
            start_date: now - Duration::days(30),
            end_date: now - Duration::hours(1),
            auto_renew: false,
            created_at: now - Duration::days(30),
            updated_at: now - Duration::days(30),
        })
        .await;

    let verifier = HmacWebhookVerifier::new("whsec".to_string());
    let body = br#"{"eventId":"evt-lapsed","eventType":"usage","timestamp":0,
        "data":{"remoteKeyId":"rk_lapsed","model":"gpt-4o","cost":0.1}}"#;
    let signature = verifier.sign(body).unwrap();
    let webhooks = UsageWebhookUseCase::new(
        Arc::new(verifier),
        store.clone(),
        store.clone(),
        store.clone(),
        StdDuration::from_secs(5),
    );

    let ack = webhooks.handle(body, Some(&signature)).await.unwrap();
    assert!(ack.success);

    let log = store
        .transactions_of(user_id)
        .await
        .into_iter()
        .map(|t| (t.transaction_type, t.amount, t.balance))
        .collect::<Vec<_>>();
    assert_eq!(
        log,
        vec![
            (TransactionType::AdminAdjust, 500, 500),
            (TransactionType::Subscription, -500, 0),
        ]
    );
    let subscriptions = store.subscriptions_of(user_id).await;
    assert_eq!(subscriptions[0].status, SubscriptionStatus::Expired);
    assert_eq!(store.usage_records_of(user_id).await[0].credits_charged, 100);
    assert_ledger_folds(&store, user_id).await;
}

#[tokio::test]
async fn unknown_api_key_is_recorded_as_failed_then_retried() {
    let store = store();
    let verifier = HmacWebhookVerifier::new("whsec".to_string());
    let body = br#"{"eventId":"evt-2","eventType":"usage","timestamp":0,
        "data":{"remoteKeyId":"rk_late","model":"m","cost":0.01}}"#;
    let signature = verifier.sign(body).unwrap();
    let webhooks = UsageWebhookUseCase::new(
        Arc::new(verifier),
        store.clone(),
        store.clone(),
        store.clone(),
        StdDuration::from_secs(5),
    );

    let ack = webhooks.handle(body, Some(&signature)).await.unwrap();
    assert!(!ack.success);

    let user_id = Uuid::new_v4();
    store
        .insert_api_key(ApiKeyEntity {
            id: Uuid::new_v4(),
            user_id,
            remote_key_id: "rk_late".to_string(),
            name: None,
        })
        .await;

    let ack = webhooks.handle(body, Some(&signature)).await.unwrap();
    assert!(ack.success);
    assert_eq!(store.usage_records_of(user_id).await.len(), 1);
    assert_eq!(store.event_count().await, 1);
}

#[tokio::test]
async fn daily_sweep_expires_resets_and_cleans_up() {
    let store = store();
    let credits = credits(&store);
    let now = Utc::now();

    let lapsed_user = Uuid::new_v4();
    credits.adjust_by_admin(lapsed_user, 500, "seed").await.unwrap();
    store
        .insert_subscription(SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: lapsed_user,
            package_id: Uuid::new_v4(),
            status: SubscriptionStatus::Cancelled,
            start_date: now - Duration::days(31),
            end_date: now - Duration::minutes(5),
            auto_renew: false,
            created_at: now - Duration::days(31),
            updated_at: now - Duration::days(2),
        })
        .await;

    let active_user = Uuid::new_v4();
    let pro = package(1000, 100);
    subscribe(&store, active_user, &pro).await;

    store
        .create(InsertPaymentOrderEntity {
            order_no: "ORDER-STALE".to_string(),
            user_id: active_user,
            package_id: pro.id,
            amount_minor: 2990,
            expires_at: now - Duration::minutes(1),
        })
        .await
        .unwrap();

    let gateway = Arc::new(epay());
    let subscriptions = Arc::new(SubscriptionUseCase::new(store.clone(), store.clone()));
    let orders = Arc::new(OrderUseCase::new(
        store.clone(),
        store.clone(),
        gateway,
        OrderSettings {
            order_ttl: Duration::minutes(30),
            pay_methods: vec!["alipay".to_string()],
        },
    ));
    let sweeps = CreditSweepUseCase::new(
        credits.clone(),
        subscriptions,
        orders,
        store.clone(),
        store.clone(),
        store.clone(),
        Duration::days(7),
    );

    let SweepRun::Completed { report } = sweeps.run_daily_sweep().await else {
        panic!("daily sweep was skipped");
    };
    assert_eq!(report.expired.mutated, 1);
    assert_eq!(report.reset.mutated, 1);
    assert_eq!(report.orders_expired, 1);
    assert_eq!(report.phase_failures, 0);

    assert_eq!(store.balance_of(lapsed_user).await.unwrap().current_credits, 0);
    assert_eq!(store.balance_of(active_user).await.unwrap().current_credits, 1000);
    let order = store.find_by_order_no("ORDER-STALE").await.unwrap().unwrap();
    assert_eq!(order.status, PaymentStatus::Expired);
    assert!(sweeps.status().last_daily.is_some());

    let SweepRun::Completed { report } = sweeps.run_hourly_replenish().await else {
        panic!("hourly sweep was skipped");
    };
    assert_eq!(report.replenished, 0);
}

#[tokio::test]
async fn transactions_page_newest_first() {
    let store = store();
    let credits = credits(&store);
    let user_id = Uuid::new_v4();
    for amount in 1..=5 {
        credits.adjust_by_admin(user_id, amount, "seed").await.unwrap();
    }

    let page = store
        .list_transactions(
            user_id,
            domain::value_objects::credits::TransactionFilter::new(Some(1), Some(2), None),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.records.len(), 2);
    assert!(page.records[0].id > page.records[1].id);
}

#[tokio::test]
async fn usage_records_filter_by_key_and_window() {
    let store = store();
    let user_id = Uuid::new_v4();
    let (key_a, key_b) = (Uuid::new_v4(), Uuid::new_v4());
    let start = Utc::now() - Duration::hours(3);
    for (n, api_key_id) in [key_a, key_a, key_b, key_a].into_iter().enumerate() {
        store
            .ingest_usage(
                NewUsageEvent {
                    event_id: format!("evt-{n}"),
                    event_type: "usage".to_string(),
                    payload: serde_json::json!({}),
                    user_id,
                    api_key_id,
                    model: "gpt-4o".to_string(),
                    prompt_tokens: 0,
                    completion_tokens: 0,
                    total_tokens: 10 * (n as i64 + 1),
                    cost_usd: 0.0,
                    credits: 0,
                },
                start + Duration::hours(n as i64),
            )
            .await
            .unwrap();
    }

    let mut filter = UsageRecordFilter::new(Some(1), Some(10));
    filter.api_key_id = Some(key_a);
    filter.end = Some(start + Duration::hours(1));
    let page = store.list_usage_records(user_id, filter).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.summary.total_tokens, 30);
    assert_eq!(page.records[0].event_id, "evt-1");
    assert_eq!(page.records[1].event_id, "evt-0");

    let page = store
        .list_usage_records(user_id, UsageRecordFilter::new(Some(2), Some(3)))
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].event_id, "evt-0");
    assert_eq!(page.summary.total_tokens, 100);
}

#[tokio::test]
async fn orders_list_by_owner_and_status() {
    let store = store();
    let user_id = Uuid::new_v4();
    let package_id = Uuid::new_v4();
    for n in 0..3 {
        store
            .create(InsertPaymentOrderEntity {
                order_no: format!("ORD-{n}"),
                user_id,
                package_id,
                amount_minor: 2990,
                expires_at: Utc::now() + Duration::minutes(30),
            })
            .await
            .unwrap();
    }
    store
        .create(InsertPaymentOrderEntity {
            order_no: "ORD-other".to_string(),
            user_id: Uuid::new_v4(),
            package_id,
            amount_minor: 2990,
            expires_at: Utc::now() + Duration::minutes(30),
        })
        .await
        .unwrap();
    store.expire_stale(Utc::now() + Duration::hours(1)).await.unwrap();

    let page = PaymentOrderRepository::list_by_user(
        &*store,
        user_id,
        OrderFilter::new(None, Some(2), Some(PaymentStatus::Expired)),
    )
    .await
    .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.records.len(), 2);
    assert!(page.records.iter().all(|o| o.user_id == user_id));

    let page = PaymentOrderRepository::list_by_user(
        &*store,
        user_id,
        OrderFilter::new(None, None, Some(PaymentStatus::Paid)),
    )
    .await
    .unwrap();
    assert_eq!(page.total, 0);

    let first = store.find_by_order_no("ORD-0").await.unwrap().unwrap();
    let by_id = PaymentOrderRepository::find_by_id(&*store, first.id)
        .await
        .unwrap();
    assert_eq!(by_id.map(|o| o.order_no), Some("ORD-0".to_string()));
}
