//! Payment provider boundary
//!
//! The reconciler consumes the external payment rail through this narrow
//! trait. Provider payloads are loosely typed strings; they decode here, at
//! the boundary, into strict tagged variants before touching core logic.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::core_types::AmountMinor;
use crate::error::WalletError;

/// Invoice state as reported by the provider, decoded strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceState {
    Paid,
    Pending,
    Failed,
}

/// Terminal outcome carried by the asynchronous event feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceOutcome {
    Succeeded,
    Failed,
}

/// Exhaustive mapping from provider status strings to internal states.
/// Unknown strings decode to `None` and are rejected at the call site;
/// intent is never inferred.
pub fn decode_invoice_status(raw: &str) -> Option<InvoiceState> {
    match raw {
        "paid" => Some(InvoiceState::Paid),
        "pending" | "posted" | "payment_due" => Some(InvoiceState::Pending),
        "not_paid" | "voided" | "failed" => Some(InvoiceState::Failed),
        _ => None,
    }
}

/// Event types the feed acts on. Anything else is acknowledged and ignored.
pub fn decode_event_type(raw: &str) -> Option<InvoiceOutcome> {
    match raw {
        "payment_succeeded" => Some(InvoiceOutcome::Succeeded),
        "payment_failed" => Some(InvoiceOutcome::Failed),
        _ => None,
    }
}

/// Invoice handle returned by `create_invoice`.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub invoice_ref: String,
    pub state: InvoiceState,
}

/// Provider call failures. Timeouts are special: the invoice may exist
/// provider-side, so the caller leaves its transaction PENDING for later
/// reconciliation instead of failing it.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider call timed out: {0}")]
    Timeout(String),

    #[error("provider rejected the request: {0}")]
    Rejected(String),

    #[error("provider unreachable: {0}")]
    Unavailable(String),

    #[error("provider response malformed: {0}")]
    Malformed(String),
}

impl From<ProviderError> for WalletError {
    fn from(e: ProviderError) -> Self {
        WalletError::Provider(e.to_string())
    }
}

/// Narrow client interface for invoice creation. The terminal outcome
/// arrives separately through the event feed.
#[async_trait]
pub trait PaymentProvider: Send + Sync + fmt::Debug {
    /// Rail name recorded on transactions, e.g. "chargebee".
    fn name(&self) -> &str;

    async fn create_invoice(
        &self,
        customer_ref: &str,
        amount_minor: AmountMinor,
        description: &str,
    ) -> Result<Invoice, ProviderError>;
}

/// REST client for the real payment rail. One call, bounded timeout, JSON.
#[derive(Debug)]
pub struct RestProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateInvoiceRequest<'a> {
    customer_ref: &'a str,
    amount_minor: AmountMinor,
    description: &'a str,
}

#[derive(Deserialize)]
struct CreateInvoiceResponse {
    invoice_id: String,
    status: String,
}

impl RestProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WalletError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Internal(format!("failed to build HTTP client: {}", e)))?;

        let name = name.into();
        let base_url = base_url.into();
        info!(provider = %name, base_url = %base_url, "payment provider client ready");

        Ok(Self {
            name,
            base_url,
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl PaymentProvider for RestProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_invoice(
        &self,
        customer_ref: &str,
        amount_minor: AmountMinor,
        description: &str,
    ) -> Result<Invoice, ProviderError> {
        let url = format!("{}/invoices", self.base_url.trim_end_matches('/'));
        let request = CreateInvoiceRequest {
            customer_ref,
            amount_minor,
            description,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            return Err(ProviderError::Rejected(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }

        let body: CreateInvoiceResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let state = decode_invoice_status(&body.status).ok_or_else(|| {
            ProviderError::Malformed(format!("unknown invoice status '{}'", body.status))
        })?;

        Ok(Invoice {
            invoice_ref: body.invoice_id,
            state,
        })
    }
}

/// Deterministic in-process provider for dev mode and tests.
#[cfg(any(test, feature = "mock-provider"))]
#[derive(Debug)]
pub struct MockProvider {
    default_behavior: Result<InvoiceState, ProviderError>,
    /// One-shot behaviors consumed before the default applies.
    script: tokio::sync::Mutex<VecDeque<Result<InvoiceState, ProviderError>>>,
    /// Every accepted create call, for assertions.
    created: tokio::sync::Mutex<Vec<Invoice>>,
}

#[cfg(any(test, feature = "mock-provider"))]
impl MockProvider {
    fn with_default(default_behavior: Result<InvoiceState, ProviderError>) -> Self {
        Self {
            default_behavior,
            script: tokio::sync::Mutex::new(VecDeque::new()),
            created: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every invoice settles immediately.
    pub fn paying() -> Self {
        Self::with_default(Ok(InvoiceState::Paid))
    }

    /// Every invoice stays pending until an outcome event arrives.
    pub fn pending() -> Self {
        Self::with_default(Ok(InvoiceState::Pending))
    }

    /// Every invoice is rejected by the rail.
    pub fn rejecting() -> Self {
        Self::with_default(Ok(InvoiceState::Failed))
    }

    /// Every call times out.
    pub fn timing_out() -> Self {
        Self::with_default(Err(ProviderError::Timeout("mock timeout".into())))
    }

    /// Every call fails to reach the rail.
    pub fn unreachable() -> Self {
        Self::with_default(Err(ProviderError::Unavailable("mock unreachable".into())))
    }

    /// Queue a one-shot behavior ahead of the default.
    pub async fn script_next(&self, behavior: Result<InvoiceState, ProviderError>) {
        self.script.lock().await.push_back(behavior);
    }

    pub async fn created_invoices(&self) -> Vec<Invoice> {
        self.created.lock().await.clone()
    }
}

#[cfg(any(test, feature = "mock-provider"))]
#[async_trait]
impl PaymentProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_invoice(
        &self,
        _customer_ref: &str,
        _amount_minor: AmountMinor,
        _description: &str,
    ) -> Result<Invoice, ProviderError> {
        let behavior = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone());

        let state = behavior?;
        let invoice = Invoice {
            invoice_ref: format!("inv_{}", ulid::Ulid::new()),
            state,
        };
        self.created.lock().await.push(invoice.clone());
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_status_mapping_table() {
        assert_eq!(decode_invoice_status("paid"), Some(InvoiceState::Paid));
        assert_eq!(decode_invoice_status("pending"), Some(InvoiceState::Pending));
        assert_eq!(decode_invoice_status("posted"), Some(InvoiceState::Pending));
        assert_eq!(
            decode_invoice_status("payment_due"),
            Some(InvoiceState::Pending)
        );
        assert_eq!(decode_invoice_status("not_paid"), Some(InvoiceState::Failed));
        assert_eq!(decode_invoice_status("voided"), Some(InvoiceState::Failed));
        assert_eq!(decode_invoice_status("failed"), Some(InvoiceState::Failed));
    }

    #[test]
    fn test_unknown_status_never_inferred() {
        assert_eq!(decode_invoice_status("PAID"), None);
        assert_eq!(decode_invoice_status("settled"), None);
        assert_eq!(decode_invoice_status(""), None);
    }

    #[test]
    fn test_event_type_mapping() {
        assert_eq!(
            decode_event_type("payment_succeeded"),
            Some(InvoiceOutcome::Succeeded)
        );
        assert_eq!(
            decode_event_type("payment_failed"),
            Some(InvoiceOutcome::Failed)
        );
        assert_eq!(decode_event_type("payment_source_added"), None);
        assert_eq!(decode_event_type("subscription_created"), None);
    }

    #[tokio::test]
    async fn test_mock_scripted_behavior_then_default() {
        let mock = MockProvider::paying();
        mock.script_next(Ok(InvoiceState::Pending)).await;

        let first = mock.create_invoice("cus_1", 100, "top-up").await.unwrap();
        assert_eq!(first.state, InvoiceState::Pending);

        let second = mock.create_invoice("cus_1", 100, "top-up").await.unwrap();
        assert_eq!(second.state, InvoiceState::Paid);

        assert_eq!(mock.created_invoices().await.len(), 2);
        // Refs are unique
        assert_ne!(first.invoice_ref, second.invoice_ref);
    }

    #[tokio::test]
    async fn test_mock_timeout() {
        let mock = MockProvider::timing_out();
        let err = mock.create_invoice("cus_1", 100, "top-up").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }
}
