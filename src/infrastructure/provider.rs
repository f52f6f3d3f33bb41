use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::errors::ProviderError;
use crate::domain::ports::PaymentProvider;

/// Gateway stand-in that approves every charge and mints an opaque
/// reference. Deployments integrating a real provider swap this at the
/// composition root.
pub struct AutoApproveProvider;

impl PaymentProvider for AutoApproveProvider {
    fn charge(&self, order_id: Uuid, amount: &BigDecimal) -> Result<String, ProviderError> {
        let reference = format!("auth-{}", Uuid::new_v4().simple());
        log::debug!("approved charge of {amount} for order {order_id}: {reference}");
        Ok(reference)
    }
}
