use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;

/// Lifecycle of an order. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "PROCESSING" => Some(OrderStatus::Processing),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether an order may move from `from` to `to`. `from = None` is a
    /// brand-new order, which may only enter `Pending`.
    ///
    /// Pure and table-driven so it can be checked without touching storage;
    /// the persistence layer re-runs it inside the updating transaction.
    pub fn can_transition(from: Option<OrderStatus>, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match (from, to) {
            (None, Pending) => true,
            (Some(Pending), Confirmed) | (Some(Pending), Cancelled) => true,
            (Some(Confirmed), Processing) | (Some(Confirmed), Cancelled) => true,
            (Some(Processing), Shipped) | (Some(Processing), Cancelled) => true,
            (Some(Shipped), Delivered) => true,
            _ => false,
        }
    }

    pub fn ensure_transition(from: Option<OrderStatus>, to: OrderStatus) -> Result<(), DomainError> {
        if Self::can_transition(from, to) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition { from, to })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line as requested by the client: no price yet, that comes from the
/// catalog at order time.
#[derive(Debug, Clone)]
pub struct RequestedLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A line priced against the catalog, ready to persist. The unit price is a
/// snapshot taken when the order was placed and never changes afterwards.
#[derive(Debug, Clone)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: BigDecimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<OrderLineView>,
}

/// Filter + pagination for order listings. `page` is 1-based.
#[derive(Debug, Clone, Default)]
pub struct OrderListQuery {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub page: i64,
    pub size: i64,
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub items: Vec<OrderView>,
    pub total_elements: i64,
    pub total_pages: i64,
    pub page: i64,
    pub size: i64,
}
