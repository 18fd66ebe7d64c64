//! # Payment Gateway Boundary
//!
//! The external payment capability the engine consumes: given a reference
//! the customer's client obtained from the processor, report what the
//! processor thinks of it. Protocol details live entirely behind this trait.
//!
//! Orders are never advanced to PAID from a gateway response; the reported
//! status is recorded on the order and an explicit payment confirmation
//! performs the transition.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Gateway round-trip failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The processor could not be reached or rejected the call.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The reference does not exist at the processor.
    #[error("unknown payment reference: {0}")]
    UnknownReference(String),
}

/// Status of a payment intent as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentIntentStatus {
    /// The processor confirmed the charge.
    Succeeded,
    /// Still in flight (requires action, processing).
    Pending,
    /// Declined or expired.
    Failed,
}

impl PaymentIntentStatus {
    /// Stable name recorded on the order row.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Pending => "pending",
            PaymentIntentStatus::Failed => "failed",
        }
    }
}

/// Trait for payment processor lookups.
pub trait PaymentGateway: Send + Sync {
    /// Retrieves the current status of a payment reference.
    fn retrieve_status(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<PaymentIntentStatus, GatewayError>> + Send;
}

// =============================================================================
// No-op gateway
// =============================================================================

/// Placeholder gateway for deployments that only take offline/COD payments.
/// Every lookup fails as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGateway;

impl PaymentGateway for NoGateway {
    fn retrieve_status(
        &self,
        _reference: &str,
    ) -> impl Future<Output = Result<PaymentIntentStatus, GatewayError>> + Send {
        async { Err(GatewayError::Unavailable("no payment gateway configured".into())) }
    }
}

// =============================================================================
// In-memory gateway
// =============================================================================

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    intents: HashMap<String, PaymentIntentStatus>,
    fail_next: bool,
}

/// In-memory gateway for tests and local development.
///
/// Statuses are programmed per reference; unknown references error. The
/// next lookup can be forced to fail to exercise the error path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    /// Creates an empty in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs the status returned for a reference.
    pub fn set_status(&self, reference: &str, status: PaymentIntentStatus) {
        self.state
            .write()
            .unwrap()
            .intents
            .insert(reference.to_string(), status);
    }

    /// Forces the next lookup to fail with `Unavailable`.
    pub fn fail_next(&self) {
        self.state.write().unwrap().fail_next = true;
    }
}

impl PaymentGateway for InMemoryGateway {
    fn retrieve_status(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<PaymentIntentStatus, GatewayError>> + Send {
        let state = Arc::clone(&self.state);
        let reference = reference.to_string();
        async move {
            let mut guard = state.write().unwrap();
            if guard.fail_next {
                guard.fail_next = false;
                return Err(GatewayError::Unavailable("simulated outage".into()));
            }
            guard
                .intents
                .get(&reference)
                .copied()
                .ok_or(GatewayError::UnknownReference(reference.clone()))
        }
    }
}
