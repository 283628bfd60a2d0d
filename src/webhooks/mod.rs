//! Webhook ingestion: signature verification for GitHub deliveries.

pub mod signature;

pub use signature::{compute_signature, format_signature_header, verify_signature};
