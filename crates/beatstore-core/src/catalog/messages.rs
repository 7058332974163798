//! Request and response bodies of the purchase endpoints

use serde::{Deserialize, Serialize};

use crate::types::Tier;

/// `GET beats/{id}/check_purchase/?type=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PurchaseCheck {
    pub has_purchase: bool,
}

/// `POST beats/{id}/create_payment_intent/`
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentRequest {
    pub download_type: Tier,
    pub price_paid: f64,
}

/// Handed to the payment processor SDK as-is
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub purchase_id: i64,
}

/// `POST beats/{id}/confirm_payment/`
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentConfirmation {
    pub message: String,
    pub purchase_id: i64,
    pub download_type: String,
}

impl PaymentConfirmation {
    /// Tier the purchase unlocked, if the server sent a known name
    pub fn tier(&self) -> Option<Tier> {
        Tier::parse(&self.download_type)
    }
}
