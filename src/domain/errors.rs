use thiserror::Error;
use uuid::Uuid;

use super::order::OrderStatus;

/// Failures surfaced by the order, inventory and billing services.
///
/// `Internal` carries storage/pool problems; everything else is a business
/// outcome the HTTP layer translates into a 4xx response.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invalid status transition {} -> {}", from_label(.from), .to)]
    InvalidTransition {
        from: Option<OrderStatus>,
        to: OrderStatus,
    },

    #[error("{0}")]
    BusinessRule(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

fn from_label(from: &Option<OrderStatus>) -> &'static str {
    match from {
        Some(status) => status.as_str(),
        None => "NONE",
    }
}

/// Error returned by an external payment provider call. Absorbed by the
/// payment processor's retry loop, never propagated to callers.
#[derive(Debug, Error)]
#[error("payment provider failure: {0}")]
pub struct ProviderError(pub String);

/// Error returned by a notification sender. Callers log and discard it.
#[derive(Debug, Error)]
#[error("notification failure: {0}")]
pub struct NotifyError(pub String);
