use std::sync::Arc;
use std::thread;
use std::time::Instant;

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::payment::{PaymentStatus, PaymentView, RetryPolicy};
use crate::domain::ports::{PaymentProvider, PaymentRequester};
use crate::infrastructure::payment_repo;

/// Drives the external provider with a bounded retry and records the outcome.
///
/// A provider failure is an expected outcome, not an error: the processor
/// always lands the payment on SUCCESS or FAILED and only errors for invalid
/// input or storage trouble.
#[derive(Clone)]
pub struct PaymentProcessor {
    pool: DbPool,
    provider: Arc<dyn PaymentProvider>,
    retry: RetryPolicy,
}

impl PaymentProcessor {
    pub fn new(pool: DbPool, provider: Arc<dyn PaymentProvider>, retry: RetryPolicy) -> Self {
        Self {
            pool,
            provider,
            retry,
        }
    }

    /// Standalone entry point for the billing endpoint: runs the processing
    /// flow in its own transaction.
    pub fn process_payment(
        &self,
        order_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<PaymentView, DomainError> {
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| self.process_within(conn, order_id, amount, None))
    }

    /// The processing flow on an existing connection, joining whatever
    /// transaction the caller has open.
    ///
    /// 1. Reject non-positive amounts before any write or provider call.
    /// 2. Insert the payment as PROCESSING.
    /// 3. Call the provider up to `retry.max_attempts` times, backing off
    ///    `attempt × backoff_step` between failures. The backoff never starts
    ///    if it would cross `deadline`; an interrupted wait means FAILED.
    /// 4. Persist the terminal status (+ provider reference on success).
    pub fn process_within(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        amount: &BigDecimal,
        deadline: Option<Instant>,
    ) -> Result<PaymentView, DomainError> {
        if *amount <= BigDecimal::from(0) {
            return Err(DomainError::Validation(
                "payment amount must be positive".to_string(),
            ));
        }

        let payment_id = payment_repo::insert_processing(conn, order_id, amount)?;

        let mut outcome = (PaymentStatus::Failed, None);
        for attempt in 1..=self.retry.max_attempts {
            match self.provider.charge(order_id, amount) {
                Ok(reference) => {
                    outcome = (PaymentStatus::Success, Some(reference));
                    break;
                }
                Err(e) => {
                    log::warn!(
                        "payment attempt {attempt}/{} for order {order_id} failed: {e}",
                        self.retry.max_attempts
                    );
                    if attempt == self.retry.max_attempts {
                        break;
                    }
                    let backoff = self.retry.backoff_for(attempt);
                    if let Some(deadline) = deadline {
                        if Instant::now() + backoff > deadline {
                            log::warn!(
                                "giving up on payment for order {order_id}: backoff would cross the deadline"
                            );
                            break;
                        }
                    }
                    thread::sleep(backoff);
                }
            }
        }

        let (status, reference) = outcome;
        payment_repo::finalize(conn, payment_id, status, reference.as_deref())?;
        payment_repo::find(conn, payment_id)?
            .ok_or_else(|| DomainError::Internal("payment row vanished mid-transaction".to_string()))
    }

    pub fn find_by_order(&self, order_id: Uuid) -> Result<Option<PaymentView>, DomainError> {
        let mut conn = self.pool.get()?;
        payment_repo::find_by_order(&mut conn, order_id)
    }
}

impl PaymentRequester for PaymentProcessor {
    fn request_payment(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        amount: &BigDecimal,
        deadline: Option<Instant>,
    ) -> Result<PaymentView, DomainError> {
        self.process_within(conn, order_id, amount, deadline)
    }
}
