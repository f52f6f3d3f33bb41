use std::time::Instant;

use bigdecimal::BigDecimal;
use diesel::PgConnection;
use uuid::Uuid;

use super::errors::{DomainError, NotifyError, ProviderError};
use super::payment::PaymentView;

/// What the catalog knows about a product, as far as ordering is concerned.
#[derive(Debug, Clone)]
pub struct CatalogProduct {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
}

/// Price/existence lookup. Catalog management itself lives elsewhere; order
/// creation only ever asks "does this product exist and what does it cost".
pub trait ProductCatalog: Send + Sync + 'static {
    fn get(&self, product_id: Uuid) -> Result<Option<CatalogProduct>, DomainError>;
}

/// The external charge call. One invocation is one attempt; the payment
/// processor owns retries and never lets these errors escape.
pub trait PaymentProvider: Send + Sync + 'static {
    fn charge(&self, order_id: Uuid, amount: &BigDecimal) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    OrderCreated,
    OrderStatusChanged,
}

/// Fire-and-forget user notification. Callers treat failures as non-fatal.
pub trait NotificationSender: Send + Sync + 'static {
    fn send(&self, user_id: Uuid, message: &str, kind: NotificationKind)
        -> Result<(), NotifyError>;
}

/// How the order module asks billing for a payment without depending on the
/// billing service type. The connection argument scopes the payment rows to
/// the caller's transaction: if order creation rolls back, so does the
/// payment. A provider failure is not an `Err` here; it comes back as a
/// `FAILED` payment.
pub trait PaymentRequester: Send + Sync + 'static {
    fn request_payment(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        amount: &BigDecimal,
        deadline: Option<Instant>,
    ) -> Result<PaymentView, DomainError>;
}
