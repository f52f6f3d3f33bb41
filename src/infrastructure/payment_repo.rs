use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::payment::{PaymentStatus, PaymentView};
use crate::schema::payments;

use super::models::{NewPaymentRow, PaymentRow};

/// Create the payment row in `PROCESSING`. One payment per order: a second
/// insert for the same order trips the unique index and comes back as a
/// business-rule failure.
pub fn insert_processing(
    conn: &mut PgConnection,
    order_id: Uuid,
    amount: &BigDecimal,
) -> Result<Uuid, DomainError> {
    let payment_id = Uuid::new_v4();
    diesel::insert_into(payments::table)
        .values(&NewPaymentRow {
            id: payment_id,
            order_id,
            amount: amount.clone(),
            status: PaymentStatus::Processing.as_str().to_string(),
        })
        .execute(conn)
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                DomainError::BusinessRule(format!("a payment already exists for order {order_id}"))
            }
            other => other.into(),
        })?;
    Ok(payment_id)
}

/// Record the terminal outcome. The provider reference is only ever present
/// for successful charges.
pub fn finalize(
    conn: &mut PgConnection,
    payment_id: Uuid,
    status: PaymentStatus,
    provider_ref: Option<&str>,
) -> Result<(), DomainError> {
    diesel::update(payments::table.find(payment_id))
        .set((
            payments::status.eq(status.as_str()),
            payments::provider_ref.eq(provider_ref),
            payments::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn find(
    conn: &mut PgConnection,
    payment_id: Uuid,
) -> Result<Option<PaymentView>, DomainError> {
    let row = payments::table
        .find(payment_id)
        .select(PaymentRow::as_select())
        .first(conn)
        .optional()?;
    row.map(to_view).transpose()
}

pub fn find_by_order(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Option<PaymentView>, DomainError> {
    let row = payments::table
        .filter(payments::order_id.eq(order_id))
        .select(PaymentRow::as_select())
        .first(conn)
        .optional()?;
    row.map(to_view).transpose()
}

fn to_view(row: PaymentRow) -> Result<PaymentView, DomainError> {
    let status = PaymentStatus::parse(&row.status).ok_or_else(|| {
        DomainError::Internal(format!("unknown payment status in storage: {}", row.status))
    })?;
    Ok(PaymentView {
        id: row.id,
        order_id: row.order_id,
        amount: row.amount,
        status,
        provider_ref: row.provider_ref,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
