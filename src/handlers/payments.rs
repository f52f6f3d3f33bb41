use std::str::FromStr;

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::payment_service::PaymentProcessor;
use crate::domain::payment::PaymentView;
use crate::errors::ApiError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    /// Decimal amount as a string to avoid floating-point issues, e.g. "9.99"
    pub amount: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePaymentResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Decimal amount as a string to avoid floating-point issues, e.g. "9.99"
    pub amount: String,
    pub status: String,
    pub provider_ref: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn to_response(payment: PaymentView) -> PaymentResponse {
    PaymentResponse {
        id: payment.id,
        order_id: payment.order_id,
        amount: payment.amount.to_string(),
        status: payment.status.to_string(),
        provider_ref: payment.provider_ref,
        created_at: payment.created_at.to_rfc3339(),
        updated_at: payment.updated_at.to_rfc3339(),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /billing/payments
///
/// Charges the provider for an order and records the outcome. The provider
/// is retried with growing backoff; exhausting the attempts still creates
/// the payment, finalized as FAILED.
#[utoipa::path(
    post,
    path = "/billing/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = CreatePaymentResponse),
        (status = 400, description = "Amount missing, malformed or not positive"),
        (status = 422, description = "The order already has a payment"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "billing"
)]
pub async fn create_payment(
    service: web::Data<PaymentProcessor>,
    body: web::Json<CreatePaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let amount = BigDecimal::from_str(&body.amount)
        .map_err(|e| ApiError::BadRequest(format!("invalid amount '{}': {}", body.amount, e)))?;

    let payment = web::block(move || service.process_payment(body.order_id, &amount))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(json!({ "id": payment.id })))
}

/// GET /billing/payments/{order_id}
///
/// Returns the payment recorded for an order.
#[utoipa::path(
    get,
    path = "/billing/payments/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Payment found", body = PaymentResponse),
        (status = 404, description = "No payment for the order"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "billing"
)]
pub async fn get_payment_by_order(
    service: web::Data<PaymentProcessor>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order_id = path.into_inner();

    let result = web::block(move || service.find_by_order(order_id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    match result {
        Some(payment) => Ok(HttpResponse::Ok().json(to_response(payment))),
        None => Err(ApiError::NotFound(format!(
            "payment for order {order_id} not found"
        ))),
    }
}
