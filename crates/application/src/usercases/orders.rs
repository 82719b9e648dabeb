use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domain::{
    entities::payment_orders::{InsertPaymentOrderEntity, PaymentOrderEntity},
    repositories::{
        payment_orders::PaymentOrderRepository,
        subscription_packages::SubscriptionPackageRepository,
    },
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payments::{OrderFilter, OrderPage, PaymentForm, format_money},
    },
};
use rand::Rng;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    errors::{BillingError, BillingResult, storage_failure},
    gateways::{PaymentGateway, PaymentRequest},
};

const ORDER_SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ORDER_SUFFIX_LEN: usize = 6;
const DEFAULT_DEVICE: &str = "pc";

#[derive(Debug, Clone)]
pub struct OrderSettings {
    pub order_ttl: Duration,
    pub pay_methods: Vec<String>,
}

/// `USR{8 hex of user id}NO{6 random}{unix millis}`.
pub fn generate_order_no(user_id: Uuid, now: DateTime<Utc>) -> String {
    let user_part: String = user_id.simple().to_string().chars().take(8).collect();
    let mut rng = rand::thread_rng();
    let random_part: String = (0..ORDER_SUFFIX_LEN)
        .map(|_| ORDER_SUFFIX_ALPHABET[rng.gen_range(0..ORDER_SUFFIX_ALPHABET.len())] as char)
        .collect();

    format!(
        "USR{}NO{}{}",
        user_part.to_ascii_uppercase(),
        random_part,
        now.timestamp_millis()
    )
}

pub struct OrderUseCase {
    order_repo: Arc<dyn PaymentOrderRepository + Send + Sync>,
    package_repo: Arc<dyn SubscriptionPackageRepository + Send + Sync>,
    gateway: Arc<dyn PaymentGateway>,
    settings: OrderSettings,
}

impl OrderUseCase {
    pub fn new(
        order_repo: Arc<dyn PaymentOrderRepository + Send + Sync>,
        package_repo: Arc<dyn SubscriptionPackageRepository + Send + Sync>,
        gateway: Arc<dyn PaymentGateway>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            order_repo,
            package_repo,
            gateway,
            settings,
        }
    }

    pub async fn create_order(
        &self,
        user_id: Uuid,
        package_id: Uuid,
    ) -> BillingResult<PaymentOrderEntity> {
        let package = self
            .package_repo
            .find_by_id(package_id)
            .await
            .map_err(|err| storage_failure("packages.find_by_id", err))?
            .ok_or(BillingError::NotFound("package"))?;
        if !package.is_active {
            return Err(BillingError::InvalidState(format!(
                "package {package_id} is not available"
            )));
        }

        let now = Utc::now();
        let order = self
            .order_repo
            .create(InsertPaymentOrderEntity {
                order_no: generate_order_no(user_id, now),
                user_id,
                package_id,
                amount_minor: package.price_minor,
                expires_at: now + self.settings.order_ttl,
            })
            .await
            .map_err(|err| storage_failure("orders.create", err))?;

        info!(
            %user_id,
            order_no = %order.order_no,
            amount_minor = order.amount_minor,
            "orders: order created"
        );
        Ok(order)
    }

    pub async fn request_payment(
        &self,
        order_no: &str,
        user_id: Uuid,
        method: &str,
    ) -> BillingResult<PaymentForm> {
        if !self.settings.pay_methods.iter().any(|m| m == method) {
            return Err(BillingError::InvalidPayload(format!(
                "unsupported payment method: {method}"
            )));
        }

        let order = self.find_owned(order_no, user_id).await?;
        if order.status != PaymentStatus::Pending {
            return Err(BillingError::InvalidState(format!(
                "order is {}",
                order.status
            )));
        }

        let now = Utc::now();
        if order.is_stale(now) {
            self.order_repo
                .mark_expired(order_no, now)
                .await
                .map_err(|err| storage_failure("orders.mark_expired", err))?;
            info!(%order_no, "orders: order expired before payment");
            return Err(BillingError::InvalidState("order has expired".to_string()));
        }

        let package = self
            .package_repo
            .find_by_id(order.package_id)
            .await
            .map_err(|err| storage_failure("packages.find_by_id", err))?
            .ok_or(BillingError::NotFound("package"))?;

        let form = self
            .gateway
            .build_payment_form(&PaymentRequest {
                order_no: order.order_no.clone(),
                method: method.to_string(),
                name: package.name,
                money: format_money(order.amount_minor),
                device: DEFAULT_DEVICE.to_string(),
            })
            .map_err(|err| {
                error!(%order_no, error = ?err, "orders: failed to build payment form");
                BillingError::InvalidState(format!("payment gateway unavailable: {err}"))
            })?;

        self.order_repo
            .set_payment_method(order_no, method, now)
            .await
            .map_err(|err| storage_failure("orders.set_payment_method", err))?;

        info!(%order_no, method, "orders: payment requested");
        Ok(form)
    }

    pub async fn cancel_order(
        &self,
        order_no: &str,
        user_id: Uuid,
    ) -> BillingResult<PaymentOrderEntity> {
        let order = self.find_owned(order_no, user_id).await?;
        if order.status != PaymentStatus::Pending {
            return Err(BillingError::InvalidState(format!(
                "only pending orders can be cancelled, order is {}",
                order.status
            )));
        }

        let cancelled = self
            .order_repo
            .cancel(order_no, user_id, Utc::now())
            .await
            .map_err(|err| storage_failure("orders.cancel", err))?
            .ok_or_else(|| {
                BillingError::InvalidState("order changed while cancelling".to_string())
            })?;

        info!(%order_no, %user_id, "orders: order cancelled");
        Ok(cancelled)
    }

    /// Lookup by order number alone, for the post-payment return page.
    pub async fn get_order(&self, order_no: &str) -> BillingResult<PaymentOrderEntity> {
        self.order_repo
            .find_by_order_no(order_no)
            .await
            .map_err(|err| storage_failure("orders.find_by_order_no", err))?
            .ok_or(BillingError::NotFound("order"))
    }

    pub async fn get_order_by_id(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> BillingResult<PaymentOrderEntity> {
        self.order_repo
            .find_by_id(order_id)
            .await
            .map_err(|err| storage_failure("orders.find_by_id", err))?
            .filter(|order| order.user_id == user_id)
            .ok_or(BillingError::NotFound("order"))
    }

    pub async fn list_orders(&self, user_id: Uuid, filter: OrderFilter) -> BillingResult<OrderPage> {
        self.order_repo
            .list_by_user(user_id, filter)
            .await
            .map_err(|err| storage_failure("orders.list_by_user", err))
    }

    pub async fn expire_stale_orders(&self, now: DateTime<Utc>) -> BillingResult<usize> {
        let expired = self
            .order_repo
            .expire_stale(now)
            .await
            .map_err(|err| storage_failure("orders.expire_stale", err))?;
        if expired > 0 {
            info!(expired, "orders: stale pending orders expired");
        }
        Ok(expired)
    }

    async fn find_owned(&self, order_no: &str, user_id: Uuid) -> BillingResult<PaymentOrderEntity> {
        let order = self
            .order_repo
            .find_by_order_no(order_no)
            .await
            .map_err(|err| storage_failure("orders.find_by_order_no", err))?
            .ok_or(BillingError::NotFound("order"))?;

        if order.user_id != user_id {
            warn!(%order_no, %user_id, "orders: order belongs to another user");
            return Err(BillingError::NotFound("order"));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use domain::{
        entities::subscription_packages::SubscriptionPackageEntity,
        repositories::{
            payment_orders::MockPaymentOrderRepository,
            subscription_packages::MockSubscriptionPackageRepository,
        },
    };

    use crate::gateways::MockPaymentGateway;

    fn package(id: Uuid, is_active: bool) -> SubscriptionPackageEntity {
        SubscriptionPackageEntity {
            id,
            name: "Starter".to_string(),
            cycle_days: 30,
            price_minor: 2990,
            base_credits: 1000,
            replenish_credits: 100,
            is_active,
        }
    }

    fn order(user_id: Uuid, package_id: Uuid, expires_in: Duration) -> PaymentOrderEntity {
        let now = Utc::now();
        PaymentOrderEntity {
            id: Uuid::new_v4(),
            order_no: "USRABCDEF01NOXYZ1231700000000000".to_string(),
            user_id,
            package_id,
            amount_minor: 2990,
            status: PaymentStatus::Pending,
            payment_method: None,
            transaction_id: None,
            expires_at: now + expires_in,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn settings() -> OrderSettings {
        OrderSettings {
            order_ttl: Duration::minutes(30),
            pay_methods: vec!["alipay".to_string(), "wxpay".to_string()],
        }
    }

    #[test]
    fn order_no_has_expected_shape() {
        let user_id = Uuid::parse_str("1f2e3d4c-0000-0000-0000-000000000000").unwrap();
        let now = Utc::now();
        let order_no = generate_order_no(user_id, now);

        assert!(order_no.starts_with("USR1F2E3D4CNO"));
        let suffix = &order_no["USR1F2E3D4CNO".len()..];
        assert!(suffix[..6].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(&suffix[6..], now.timestamp_millis().to_string());
    }

    #[tokio::test]
    async fn create_order_prices_from_package() {
        let user_id = Uuid::new_v4();
        let package_id = Uuid::new_v4();

        let mut package_repo = MockSubscriptionPackageRepository::new();
        package_repo
            .expect_find_by_id()
            .returning(move |id| Ok(Some(package(id, true))));

        let mut order_repo = MockPaymentOrderRepository::new();
        order_repo
            .expect_create()
            .withf(move |insert| insert.user_id == user_id && insert.amount_minor == 2990)
            .times(1)
            .returning(move |insert| {
                let mut created = order(insert.user_id, insert.package_id, Duration::minutes(30));
                created.order_no = insert.order_no;
                Ok(created)
            });

        let use_case = OrderUseCase::new(
            Arc::new(order_repo),
            Arc::new(package_repo),
            Arc::new(MockPaymentGateway::new()),
            settings(),
        );

        let created = use_case.create_order(user_id, package_id).await.unwrap();
        assert!(created.order_no.starts_with("USR"));
    }

    #[tokio::test]
    async fn inactive_package_cannot_be_ordered() {
        let mut package_repo = MockSubscriptionPackageRepository::new();
        package_repo
            .expect_find_by_id()
            .returning(move |id| Ok(Some(package(id, false))));
        let mut order_repo = MockPaymentOrderRepository::new();
        order_repo.expect_create().never();

        let use_case = OrderUseCase::new(
            Arc::new(order_repo),
            Arc::new(package_repo),
            Arc::new(MockPaymentGateway::new()),
            settings(),
        );

        let result = use_case.create_order(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(BillingError::InvalidState(_))));
    }

    #[tokio::test]
    async fn expired_order_is_marked_and_rejected() {
        let user_id = Uuid::new_v4();
        let stale = order(user_id, Uuid::new_v4(), -Duration::minutes(1));

        let mut order_repo = MockPaymentOrderRepository::new();
        order_repo
            .expect_find_by_order_no()
            .returning(move |_| Ok(Some(stale.clone())));
        order_repo
            .expect_mark_expired()
            .times(1)
            .returning(|_, _| Ok(true));

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_build_payment_form().never();

        let use_case = OrderUseCase::new(
            Arc::new(order_repo),
            Arc::new(MockSubscriptionPackageRepository::new()),
            Arc::new(gateway),
            settings(),
        );

        let result = use_case
            .request_payment("USRABCDEF01NOXYZ1231700000000000", user_id, "alipay")
            .await;
        assert!(matches!(result, Err(BillingError::InvalidState(_))));
    }

    #[tokio::test]
    async fn payment_form_uses_formatted_money_and_records_method() {
        let user_id = Uuid::new_v4();
        let pending = order(user_id, Uuid::new_v4(), Duration::minutes(10));

        let mut order_repo = MockPaymentOrderRepository::new();
        order_repo
            .expect_find_by_order_no()
            .returning(move |_| Ok(Some(pending.clone())));
        order_repo
            .expect_set_payment_method()
            .withf(|_, method, _| method == "wxpay")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut package_repo = MockSubscriptionPackageRepository::new();
        package_repo
            .expect_find_by_id()
            .returning(move |id| Ok(Some(package(id, true))));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_build_payment_form()
            .withf(|request| request.money == "29.90" && request.method == "wxpay")
            .returning(|request| {
                Ok(PaymentForm {
                    url: "https://pay.example.com/submit.php".to_string(),
                    params: BTreeMap::from([(
                        "out_trade_no".to_string(),
                        request.order_no.clone(),
                    )]),
                })
            });

        let use_case = OrderUseCase::new(
            Arc::new(order_repo),
            Arc::new(package_repo),
            Arc::new(gateway),
            settings(),
        );

        let form = use_case
            .request_payment("USRABCDEF01NOXYZ1231700000000000", user_id, "wxpay")
            .await
            .unwrap();
        assert!(form.url.ends_with("/submit.php"));
    }

    #[tokio::test]
    async fn order_by_id_is_scoped_to_its_owner() {
        let owner = Uuid::new_v4();
        let pending = order(owner, Uuid::new_v4(), Duration::minutes(10));
        let order_id = pending.id;

        let mut order_repo = MockPaymentOrderRepository::new();
        order_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(pending.clone())));

        let use_case = OrderUseCase::new(
            Arc::new(order_repo),
            Arc::new(MockSubscriptionPackageRepository::new()),
            Arc::new(MockPaymentGateway::new()),
            settings(),
        );

        assert_eq!(use_case.get_order_by_id(order_id, owner).await.unwrap().id, order_id);
        let result = use_case.get_order_by_id(order_id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(BillingError::NotFound("order"))));
    }

    #[tokio::test]
    async fn list_orders_passes_the_filter_through() {
        let user_id = Uuid::new_v4();
        let paid = OrderFilter::new(Some(2), Some(5), Some(PaymentStatus::Paid));

        let mut order_repo = MockPaymentOrderRepository::new();
        order_repo
            .expect_list_by_user()
            .withf(move |id, filter| *id == user_id && *filter == paid)
            .times(1)
            .returning(|_, filter| Ok(OrderPage::new(vec![], 7, &filter)));

        let use_case = OrderUseCase::new(
            Arc::new(order_repo),
            Arc::new(MockSubscriptionPackageRepository::new()),
            Arc::new(MockPaymentGateway::new()),
            settings(),
        );

        let page = use_case.list_orders(user_id, paid).await.unwrap();
        assert_eq!((page.page, page.page_size, page.total_pages), (2, 5, 2));
    }

    #[tokio::test]
    async fn other_users_order_is_not_found() {
        let owner = Uuid::new_v4();
        let pending = order(owner, Uuid::new_v4(), Duration::minutes(10));

        let mut order_repo = MockPaymentOrderRepository::new();
        order_repo
            .expect_find_by_order_no()
            .returning(move |_| Ok(Some(pending.clone())));
        order_repo.expect_cancel().never();

        let use_case = OrderUseCase::new(
            Arc::new(order_repo),
            Arc::new(MockSubscriptionPackageRepository::new()),
            Arc::new(MockPaymentGateway::new()),
            settings(),
        );

        let result = use_case
            .cancel_order("USRABCDEF01NOXYZ1231700000000000", Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(BillingError::NotFound("order"))));
    }
}
