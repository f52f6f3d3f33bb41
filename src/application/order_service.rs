use std::sync::Arc;
use std::time::{Duration, Instant};

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    OrderLineInput, OrderListQuery, OrderPage, OrderStatus, OrderView, RequestedLine,
};
use crate::domain::ports::{
    NotificationKind, NotificationSender, PaymentRequester, ProductCatalog,
};
use crate::infrastructure::{inventory_repo, order_repo};

/// Orchestrates order creation and progression.
///
/// Everything an order mutation touches (order row, lines, reservations,
/// payment, history) is written through one connection inside one
/// transaction, so a failure at any step rolls the whole request back.
/// Collaborators arrive as capabilities: the catalog prices lines, billing
/// produces the payment on our connection, the notifier is fire-and-forget.
#[derive(Clone)]
pub struct OrderService {
    pool: DbPool,
    catalog: Arc<dyn ProductCatalog>,
    billing: Arc<dyn PaymentRequester>,
    notifier: Arc<dyn NotificationSender>,
    payment_deadline: Option<Duration>,
}

impl OrderService {
    pub fn new(
        pool: DbPool,
        catalog: Arc<dyn ProductCatalog>,
        billing: Arc<dyn PaymentRequester>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            pool,
            catalog,
            billing,
            notifier,
            payment_deadline: None,
        }
    }

    /// Cap the time the payment retry loop may spend per order; the budget
    /// starts counting when the payment is requested.
    pub fn with_payment_deadline(mut self, budget: Duration) -> Self {
        self.payment_deadline = Some(budget);
        self
    }

    pub fn create_order(
        &self,
        user_id: Uuid,
        lines: Vec<RequestedLine>,
    ) -> Result<OrderView, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::Validation(
                "an order needs at least one line".to_string(),
            ));
        }
        if let Some(bad) = lines.iter().find(|l| l.quantity < 1) {
            return Err(DomainError::Validation(format!(
                "line quantity must be at least 1 (product {})",
                bad.product_id
            )));
        }

        // 1. Price every line against the catalog and accumulate the total.
        let mut priced = Vec::with_capacity(lines.len());
        let mut total = BigDecimal::from(0);
        for line in &lines {
            let product = self
                .catalog
                .get(line.product_id)?
                .ok_or_else(|| DomainError::not_found("product", line.product_id))?;
            total += &product.price * BigDecimal::from(line.quantity);
            priced.push(OrderLineInput {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }
        // Lock inventory rows in a stable order so two orders covering the
        // same products cannot deadlock each other.
        priced.sort_by_key(|l| l.product_id);

        let mut conn = self.pool.get()?;
        let view = conn.transaction::<_, DomainError, _>(|conn| {
            // 2. Persist the order shell in PENDING.
            let order_id = order_repo::insert_order(conn, user_id, &total, OrderStatus::Pending)?;

            // 3. Reserve stock per line. A failing line aborts the
            //    transaction and takes the earlier reservations with it.
            for line in &priced {
                inventory_repo::reserve(conn, line.product_id, line.quantity)?;
            }

            // 4. Ask billing for the payment on this same connection. A
            //    declined payment comes back FAILED, not as an error.
            let deadline = self.payment_deadline.map(|budget| Instant::now() + budget);
            self.billing.request_payment(conn, order_id, &total, deadline)?;

            // 5. Persist the priced lines.
            order_repo::insert_lines(conn, order_id, &priced)?;

            // 6. First audit row: nothing -> PENDING.
            order_repo::insert_history(conn, order_id, None, OrderStatus::Pending)?;

            order_repo::find_view(conn, order_id)?
                .ok_or_else(|| DomainError::Internal("order vanished mid-transaction".to_string()))
        })?;

        // 7. Fire-and-forget; a lost notification never unwinds an order.
        self.notify(
            user_id,
            format!("Your order {} has been created", view.id),
            NotificationKind::OrderCreated,
        );
        log::info!(
            "order {} created for user {} ({} lines, total {})",
            view.id,
            user_id,
            view.lines.len(),
            view.total_amount
        );
        Ok(view)
    }

    pub fn get_order(&self, order_id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;
        order_repo::find_view(&mut conn, order_id)
    }

    pub fn list_orders(&self, query: OrderListQuery) -> Result<OrderPage, DomainError> {
        let query = OrderListQuery {
            page: query.page.max(1),
            size: query.size.clamp(1, 100),
            ..query
        };
        let mut conn = self.pool.get()?;
        let (items, total_elements) = order_repo::list(&mut conn, &query)?;
        let total_pages = if total_elements == 0 {
            0
        } else {
            (total_elements + query.size - 1) / query.size
        };
        Ok(OrderPage {
            items,
            total_elements,
            total_pages,
            page: query.page,
            size: query.size,
        })
    }

    /// Validate and record a status transition. The order row stays locked
    /// from the read to the update, so two racing transitions serialize and
    /// the loser revalidates against the winner's outcome.
    pub fn change_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;
        let (view, user_id) = conn.transaction::<_, DomainError, _>(|conn| {
            let row = order_repo::lock_order(conn, order_id)?
                .ok_or_else(|| DomainError::not_found("order", order_id))?;
            let current = order_repo::parse_status(&row.status)?;
            OrderStatus::ensure_transition(Some(current), new_status)?;

            order_repo::insert_history(conn, order_id, Some(current), new_status)?;
            order_repo::update_status(conn, order_id, new_status)?;

            let view = order_repo::find_view(conn, order_id)?.ok_or_else(|| {
                DomainError::Internal("order vanished mid-transaction".to_string())
            })?;
            Ok((view, row.user_id))
        })?;

        self.notify(
            user_id,
            format!("Your order {order_id} is now {new_status}"),
            NotificationKind::OrderStatusChanged,
        );
        Ok(view)
    }

    fn notify(&self, user_id: Uuid, message: String, kind: NotificationKind) {
        if let Err(e) = self.notifier.send(user_id, &message, kind) {
            log::warn!("notification to user {user_id} dropped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bigdecimal::BigDecimal;
    use diesel::prelude::*;
    use uuid::Uuid;

    use super::OrderService;
    use crate::application::payment_service::PaymentProcessor;
    use crate::db::DbPool;
    use crate::domain::errors::{DomainError, NotifyError, ProviderError};
    use crate::domain::order::{OrderListQuery, OrderStatus, RequestedLine};
    use crate::domain::payment::RetryPolicy;
    use crate::domain::ports::{NotificationKind, NotificationSender, PaymentProvider};
    use crate::infrastructure::catalog::DieselProductCatalog;
    use crate::infrastructure::models::StatusHistoryRow;
    use crate::infrastructure::notifier::LogNotifier;
    use crate::infrastructure::provider::AutoApproveProvider;
    use crate::schema::{order_lines, order_status_history, orders, payments};
    use crate::test_support;

    struct DecliningProvider {
        calls: AtomicU32,
    }

    impl DecliningProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
            })
        }
    }

    impl PaymentProvider for DecliningProvider {
        fn charge(&self, _order_id: Uuid, _amount: &BigDecimal) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError("declined".to_string()))
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<(Uuid, NotificationKind)>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    impl NotificationSender for RecordingNotifier {
        fn send(
            &self,
            user_id: Uuid,
            _message: &str,
            kind: NotificationKind,
        ) -> Result<(), NotifyError> {
            self.sent.lock().expect("lock poisoned").push((user_id, kind));
            Ok(())
        }
    }

    struct FailingNotifier;

    impl NotificationSender for FailingNotifier {
        fn send(&self, _: Uuid, _: &str, _: NotificationKind) -> Result<(), NotifyError> {
            Err(NotifyError("smtp down".to_string()))
        }
    }

    fn service_with(
        pool: &DbPool,
        provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn NotificationSender>,
    ) -> OrderService {
        let retry = RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::from_millis(5),
        };
        let processor = PaymentProcessor::new(pool.clone(), provider, retry);
        OrderService::new(
            pool.clone(),
            Arc::new(DieselProductCatalog::new(pool.clone())),
            Arc::new(processor),
            notifier,
        )
    }

    fn default_service(pool: &DbPool) -> OrderService {
        service_with(pool, Arc::new(AutoApproveProvider), Arc::new(LogNotifier))
    }

    fn line(product_id: Uuid, quantity: i32) -> RequestedLine {
        RequestedLine {
            product_id,
            quantity,
        }
    }

    fn decimal(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    fn table_counts(pool: &DbPool) -> (i64, i64, i64, i64) {
        let mut conn = pool.get().expect("pool get failed");
        (
            orders::table.count().get_result(&mut conn).expect("orders"),
            order_lines::table
                .count()
                .get_result(&mut conn)
                .expect("lines"),
            payments::table
                .count()
                .get_result(&mut conn)
                .expect("payments"),
            order_status_history::table
                .count()
                .get_result(&mut conn)
                .expect("history"),
        )
    }

    #[tokio::test]
    async fn two_line_order_creates_order_lines_history_and_payment() {
        let (_container, pool) = test_support::postgres().await;
        let product_a = test_support::seed_product(&pool, "widget", "99.99");
        let product_b = test_support::seed_product(&pool, "gadget", "49.99");
        test_support::seed_inventory(&pool, product_a, 10, 0);
        test_support::seed_inventory(&pool, product_b, 5, 0);
        let service = default_service(&pool);
        let user_id = Uuid::new_v4();

        let order = service
            .create_order(user_id, vec![line(product_a, 2), line(product_b, 1)])
            .expect("create failed");

        assert_eq!(order.user_id, user_id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, decimal("249.97"));
        assert_eq!(order.lines.len(), 2);
        let snapshot_a = order
            .lines
            .iter()
            .find(|l| l.product_id == product_a)
            .expect("line for product A");
        assert_eq!(snapshot_a.quantity, 2);
        assert_eq!(snapshot_a.unit_price, decimal("99.99"));

        // Stock moved from available to reserved for both lines.
        let mut conn = pool.get().expect("pool get failed");
        let inventory = crate::infrastructure::inventory_repo::levels(&mut conn, product_a)
            .expect("levels failed")
            .expect("record exists");
        assert_eq!((inventory.available_qty, inventory.reserved_qty), (8, 2));

        // One creation audit row, from NULL to PENDING.
        let history: Vec<StatusHistoryRow> = order_status_history::table
            .filter(order_status_history::order_id.eq(order.id))
            .select(StatusHistoryRow::as_select())
            .load(&mut conn)
            .expect("history query failed");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_status, None);
        assert_eq!(history[0].to_status, "PENDING");

        // Exactly one payment over the order total.
        let (amounts, statuses): (Vec<BigDecimal>, Vec<String>) = payments::table
            .filter(payments::order_id.eq(order.id))
            .select((payments::amount, payments::status))
            .load::<(BigDecimal, String)>(&mut conn)
            .expect("payment query failed")
            .into_iter()
            .unzip();
        assert_eq!(amounts, vec![decimal("249.97")]);
        assert_eq!(statuses, vec!["SUCCESS".to_string()]);
    }

    #[tokio::test]
    async fn short_stock_on_any_line_rolls_back_the_entire_order() {
        let (_container, pool) = test_support::postgres().await;
        let product_a = test_support::seed_product(&pool, "widget", "10.00");
        let product_b = test_support::seed_product(&pool, "gadget", "20.00");
        test_support::seed_inventory(&pool, product_a, 10, 0);
        test_support::seed_inventory(&pool, product_b, 0, 0);
        let service = default_service(&pool);

        let err = service
            .create_order(Uuid::new_v4(), vec![line(product_a, 2), line(product_b, 1)])
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }), "{err:?}");

        assert_eq!(table_counts(&pool), (0, 0, 0, 0));
        let levels = {
            let mut conn = pool.get().expect("pool get failed");
            crate::infrastructure::inventory_repo::levels(&mut conn, product_a)
                .expect("levels failed")
                .expect("record exists")
        };
        // The first line's reservation must have been rolled back too.
        assert_eq!((levels.available_qty, levels.reserved_qty), (10, 0));
    }

    #[tokio::test]
    async fn unknown_product_fails_creation_before_any_write() {
        let (_container, pool) = test_support::postgres().await;
        let service = default_service(&pool);

        let err = service
            .create_order(Uuid::new_v4(), vec![line(Uuid::new_v4(), 1)])
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { .. }), "{err:?}");
        assert_eq!(table_counts(&pool), (0, 0, 0, 0));
    }

    #[tokio::test]
    async fn declined_payment_still_creates_the_order() {
        let (_container, pool) = test_support::postgres().await;
        let product = test_support::seed_product(&pool, "widget", "15.50");
        test_support::seed_inventory(&pool, product, 3, 0);
        let provider = DecliningProvider::new();
        let service = service_with(&pool, provider.clone(), Arc::new(LogNotifier));

        let order = service
            .create_order(Uuid::new_v4(), vec![line(product, 1)])
            .expect("a declined payment must not abort creation");

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        let mut conn = pool.get().expect("pool get failed");
        let status: String = payments::table
            .filter(payments::order_id.eq(order.id))
            .select(payments::status)
            .first(&mut conn)
            .expect("payment missing");
        assert_eq!(status, "FAILED");
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn zero_payment_budget_stops_retrying_after_one_attempt() {
        let (_container, pool) = test_support::postgres().await;
        let product = test_support::seed_product(&pool, "widget", "8.00");
        test_support::seed_inventory(&pool, product, 2, 0);
        let provider = DecliningProvider::new();
        let service = service_with(&pool, provider.clone(), Arc::new(LogNotifier))
            .with_payment_deadline(Duration::ZERO);

        service
            .create_order(Uuid::new_v4(), vec![line(product, 1)])
            .expect("create failed");

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn notifier_failure_never_fails_creation() {
        let (_container, pool) = test_support::postgres().await;
        let product = test_support::seed_product(&pool, "widget", "5.00");
        test_support::seed_inventory(&pool, product, 10, 0);
        let service = service_with(&pool, Arc::new(AutoApproveProvider), Arc::new(FailingNotifier));

        let order = service
            .create_order(Uuid::new_v4(), vec![line(product, 1)])
            .expect("notification failures must be swallowed");

        assert_eq!(order.lines.len(), 1);
    }

    #[tokio::test]
    async fn happy_path_sends_a_creation_notification() {
        let (_container, pool) = test_support::postgres().await;
        let product = test_support::seed_product(&pool, "widget", "5.00");
        test_support::seed_inventory(&pool, product, 10, 0);
        let notifier = RecordingNotifier::new();
        let service = service_with(&pool, Arc::new(AutoApproveProvider), notifier.clone());
        let user_id = Uuid::new_v4();

        service
            .create_order(user_id, vec![line(product, 1)])
            .expect("create failed");

        let sent = notifier.sent.lock().expect("lock poisoned");
        assert_eq!(sent.as_slice(), &[(user_id, NotificationKind::OrderCreated)]);
    }

    #[tokio::test]
    async fn empty_or_nonpositive_lines_are_rejected() {
        let (_container, pool) = test_support::postgres().await;
        let service = default_service(&pool);

        assert!(matches!(
            service.create_order(Uuid::new_v4(), vec![]).unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(matches!(
            service
                .create_order(Uuid::new_v4(), vec![line(Uuid::new_v4(), 0)])
                .unwrap_err(),
            DomainError::Validation(_)
        ));
        assert_eq!(table_counts(&pool), (0, 0, 0, 0));
    }

    #[tokio::test]
    async fn confirming_a_pending_order_appends_history() {
        let (_container, pool) = test_support::postgres().await;
        let product = test_support::seed_product(&pool, "widget", "5.00");
        test_support::seed_inventory(&pool, product, 10, 0);
        let service = default_service(&pool);

        let order = service
            .create_order(Uuid::new_v4(), vec![line(product, 1)])
            .expect("create failed");
        let updated = service
            .change_status(order.id, OrderStatus::Confirmed)
            .expect("transition failed");

        assert_eq!(updated.status, OrderStatus::Confirmed);
        let mut conn = pool.get().expect("pool get failed");
        let history: Vec<StatusHistoryRow> = order_status_history::table
            .filter(order_status_history::order_id.eq(order.id))
            .order(order_status_history::changed_at.asc())
            .select(StatusHistoryRow::as_select())
            .load(&mut conn)
            .expect("history query failed");
        let pairs: Vec<(Option<&str>, &str)> = history
            .iter()
            .map(|h| (h.from_status.as_deref(), h.to_status.as_str()))
            .collect();
        assert_eq!(pairs, vec![(None, "PENDING"), (Some("PENDING"), "CONFIRMED")]);
    }

    #[tokio::test]
    async fn backwards_transition_is_rejected_and_leaves_no_trace() {
        let (_container, pool) = test_support::postgres().await;
        let product = test_support::seed_product(&pool, "widget", "5.00");
        test_support::seed_inventory(&pool, product, 10, 0);
        let service = default_service(&pool);

        let order = service
            .create_order(Uuid::new_v4(), vec![line(product, 1)])
            .expect("create failed");
        service
            .change_status(order.id, OrderStatus::Confirmed)
            .expect("transition failed");
        let err = service
            .change_status(order.id, OrderStatus::Pending)
            .unwrap_err();

        assert!(matches!(err, DomainError::InvalidTransition { .. }), "{err:?}");
        let current = service
            .get_order(order.id)
            .expect("get failed")
            .expect("order exists");
        assert_eq!(current.status, OrderStatus::Confirmed);
        let mut conn = pool.get().expect("pool get failed");
        let history_rows: i64 = order_status_history::table
            .filter(order_status_history::order_id.eq(order.id))
            .count()
            .get_result(&mut conn)
            .expect("count failed");
        assert_eq!(history_rows, 2);
    }

    #[tokio::test]
    async fn delivered_orders_accept_no_further_transitions() {
        let (_container, pool) = test_support::postgres().await;
        let product = test_support::seed_product(&pool, "widget", "5.00");
        test_support::seed_inventory(&pool, product, 10, 0);
        let service = default_service(&pool);

        let order = service
            .create_order(Uuid::new_v4(), vec![line(product, 1)])
            .expect("create failed");
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            service
                .change_status(order.id, status)
                .expect("lifecycle step failed");
        }

        for status in OrderStatus::ALL {
            let err = service.change_status(order.id, status).unwrap_err();
            assert!(matches!(err, DomainError::InvalidTransition { .. }));
        }
    }

    #[tokio::test]
    async fn changing_status_of_missing_order_is_not_found() {
        let (_container, pool) = test_support::postgres().await;
        let service = default_service(&pool);

        let err = service
            .change_status(Uuid::new_v4(), OrderStatus::Confirmed)
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn listing_filters_by_user_and_status_and_paginates() {
        let (_container, pool) = test_support::postgres().await;
        let product = test_support::seed_product(&pool, "widget", "5.00");
        test_support::seed_inventory(&pool, product, 100, 0);
        let service = default_service(&pool);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let mut alice_orders = Vec::new();
        for _ in 0..3 {
            alice_orders.push(
                service
                    .create_order(alice, vec![line(product, 1)])
                    .expect("create failed"),
            );
        }
        for _ in 0..2 {
            service
                .create_order(bob, vec![line(product, 1)])
                .expect("create failed");
        }
        service
            .change_status(alice_orders[0].id, OrderStatus::Confirmed)
            .expect("transition failed");

        let all = service
            .list_orders(OrderListQuery {
                page: 1,
                size: 20,
                ..Default::default()
            })
            .expect("list failed");
        assert_eq!(all.total_elements, 5);
        assert_eq!(all.total_pages, 1);
        assert_eq!(all.items.len(), 5);

        let alices = service
            .list_orders(OrderListQuery {
                user_id: Some(alice),
                page: 1,
                size: 20,
                ..Default::default()
            })
            .expect("list failed");
        assert_eq!(alices.total_elements, 3);
        assert!(alices.items.iter().all(|o| o.user_id == alice));

        let alice_pending = service
            .list_orders(OrderListQuery {
                user_id: Some(alice),
                status: Some(OrderStatus::Pending),
                page: 1,
                size: 20,
            })
            .expect("list failed");
        assert_eq!(alice_pending.total_elements, 2);

        let paged = service
            .list_orders(OrderListQuery {
                page: 3,
                size: 2,
                ..Default::default()
            })
            .expect("list failed");
        assert_eq!(paged.total_elements, 5);
        assert_eq!(paged.total_pages, 3);
        assert_eq!(paged.items.len(), 1);

        let beyond = service
            .list_orders(OrderListQuery {
                page: 9,
                size: 2,
                ..Default::default()
            })
            .expect("list failed");
        assert!(beyond.items.is_empty());
    }
}
