//! Top-up intake through the external payment rail.

pub mod provider;
pub mod reconciler;

#[cfg(any(test, feature = "mock-provider"))]
pub use provider::MockProvider;
pub use provider::{
    Invoice, InvoiceOutcome, InvoiceState, PaymentProvider, ProviderError, RestProvider,
    decode_event_type, decode_invoice_status,
};
pub use reconciler::{ApplyReceipt, TopupReceipt, TopupReconciler};
