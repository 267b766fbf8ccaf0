//! Webhook ingestion
//!
//! Verifies the provider signature, de-duplicates deliveries by event id
//! and triggers the fraud pipeline in the background.

mod gate;
mod payload;
mod signature;

pub use gate::{WebhookGate, WebhookReceipt};
pub use payload::{EventKind, PaymentObject, WebhookEnvelope};
pub use signature::{SignatureVerifier, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER};
