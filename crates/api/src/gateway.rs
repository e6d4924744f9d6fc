//! Request gateway: validates purchase requests and forwards them to the coordinator.

use coordinator::{
    AccountDirectory, CoordinatorError, ItemCatalog, TransactionCoordinator, TransactionReceipt,
};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use thiserror::Error;

/// A raw purchase request as submitted by a caller.
///
/// Missing or null fields are reported by validation rather than by the extractor.
/// A quantity that is not an integer binds to zero, so form submissions see the
/// same validation message as JSON callers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub client: Option<String>,
}

impl PurchaseRequest {
    pub fn new(title: impl Into<String>, quantity: i64, client: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            quantity,
            client: Some(client.into()),
        }
    }
}

fn lenient_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    struct QuantityVisitor;

    impl<'de> Visitor<'de> for QuantityVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a quantity")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            Ok(i64::try_from(v).unwrap_or(i64::MAX))
        }

        fn visit_f64<E: de::Error>(self, _: f64) -> Result<i64, E> {
            Ok(0)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            Ok(v.trim().parse().unwrap_or(0))
        }

        fn visit_bool<E: de::Error>(self, _: bool) -> Result<i64, E> {
            Ok(0)
        }

        fn visit_unit<E: de::Error>(self) -> Result<i64, E> {
            Ok(0)
        }

        fn visit_none<E: de::Error>(self) -> Result<i64, E> {
            Ok(0)
        }
    }

    deserializer.deserialize_any(QuantityVisitor)
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPurchase {
    pub title: String,
    pub quantity: u32,
    pub client: String,
}

/// Errors surfaced to gateway callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request was rejected before the coordinator was invoked.
    #[error("{0}")]
    Validation(String),

    /// The coordinator failed the purchase.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}

impl GatewayError {
    /// Returns the message shown to the caller.
    ///
    /// Protocol-level failures are unwrapped to the ledger error that caused them.
    pub fn caller_message(&self) -> String {
        match self {
            GatewayError::Validation(message) => message.clone(),
            GatewayError::Coordinator(err) => match err {
                CoordinatorError::Lookup(source)
                | CoordinatorError::CommitRejected { source, .. }
                | CoordinatorError::Protocol { source, .. }
                | CoordinatorError::PartialCommit { source, .. } => source.to_string(),
                other => other.to_string(),
            },
        }
    }
}

/// Validates a request without touching any ledger.
pub fn validate(request: &PurchaseRequest) -> Result<ValidatedPurchase, GatewayError> {
    let title = request.title.as_deref().unwrap_or_default().trim();
    if title.is_empty() {
        return Err(GatewayError::Validation(
            "Title cannot be null or empty. Please provide a valid title.".to_string(),
        ));
    }

    if request.quantity <= 0 {
        return Err(GatewayError::Validation(
            "Quantity must be greater than zero. Please provide a valid quantity.".to_string(),
        ));
    }
    let quantity = u32::try_from(request.quantity).map_err(|_| {
        GatewayError::Validation(format!(
            "Quantity cannot exceed {}. Please provide a valid quantity.",
            u32::MAX
        ))
    })?;

    let client = request.client.as_deref().unwrap_or_default().trim();
    if client.is_empty() {
        return Err(GatewayError::Validation(
            "Client cannot be null or empty. Please provide a valid client name.".to_string(),
        ));
    }

    Ok(ValidatedPurchase {
        title: title.to_string(),
        quantity,
        client: client.to_string(),
    })
}

/// Entry point for human-facing purchase requests.
#[derive(Debug, Clone)]
pub struct RequestGateway<I, F> {
    coordinator: TransactionCoordinator<I, F>,
}

impl<I, F> RequestGateway<I, F>
where
    I: ItemCatalog,
    F: AccountDirectory,
{
    pub fn new(coordinator: TransactionCoordinator<I, F>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &TransactionCoordinator<I, F> {
        &self.coordinator
    }

    /// Validates the request and runs the purchase transaction.
    #[tracing::instrument(skip(self, request), fields(title = ?request.title, quantity = request.quantity, client = ?request.client))]
    pub async fn purchase(
        &self,
        request: PurchaseRequest,
    ) -> Result<TransactionReceipt, GatewayError> {
        let purchase = validate(&request).inspect_err(|e| {
            metrics::counter!("purchase_requests_invalid_total").increment(1);
            tracing::info!(reason = %e, "purchase request rejected");
        })?;

        let receipt = self
            .coordinator
            .start_transaction(&purchase.title, purchase.quantity, &purchase.client)
            .await?;
        Ok(receipt)
    }
}
