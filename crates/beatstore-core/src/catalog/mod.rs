//! Beat catalog and purchase API
//!
//! Thin blocking client over the REST backend: list beats, check ownership,
//! run the payment-intent handshake and download purchased files.

mod client;
mod error;
mod messages;

pub use client::CatalogClient;
pub use error::{CatalogError, Result};
pub use messages::{
    ConfirmPaymentRequest, PaymentConfirmation, PaymentIntent, PaymentIntentRequest, PurchaseCheck,
};
