use super::order::{OrderId, PaymentType};
use super::payment_link::LinkToken;
use super::settlement::Outcome;
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Gateway-side lifecycle of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    Failed,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    /// Ledger outcome for a terminal gateway status; `None` while the intent
    /// can still move.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            IntentStatus::Succeeded => Some(Outcome::Succeeded),
            IntentStatus::Canceled | IntentStatus::Failed => Some(Outcome::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::RequiresCapture => "requires_capture",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Canceled => "canceled",
            IntentStatus::Failed => "failed",
            IntentStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayIntent {
    pub id: String,
    pub status: IntentStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl GatewayIntent {
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata
            .get("order_id")
            .and_then(|v| v.trim().parse().ok())
            .map(OrderId)
    }

    pub fn payment_type(&self) -> Option<PaymentType> {
        self.metadata
            .get("payment_type")
            .and_then(|v| v.parse().ok())
    }

    pub fn link_token(&self) -> Option<LinkToken> {
        self.metadata
            .get("payment_link_token")
            .filter(|v| !v.trim().is_empty())
            .map(|v| LinkToken::from(v.as_str()))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("intent {0} not found")]
    NotFound(String),
}

impl From<GatewayError> for PaymentError {
    fn from(e: GatewayError) -> Self {
        PaymentError::GatewayUnavailable(e.to_string())
    }
}

/// Push notification from the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayEventData {
    pub object: GatewayIntent,
}

impl GatewayEvent {
    pub const INTENT_SUCCEEDED: &'static str = "payment_intent.succeeded";
    pub const INTENT_FAILED: &'static str = "payment_intent.payment_failed";
    pub const INTENT_CANCELED: &'static str = "payment_intent.canceled";

    pub fn from_json(payload: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(payload)
            .map_err(|e| PaymentError::InvalidInput(format!("malformed gateway event: {}", e)))
    }

    /// Outcome announced by the event type, if it is one the ledger handles.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.kind.as_str() {
            Self::INTENT_SUCCEEDED => Some(Outcome::Succeeded),
            Self::INTENT_FAILED | Self::INTENT_CANCELED => Some(Outcome::Failed),
            _ => None,
        }
    }

    pub fn intent(&self) -> &GatewayIntent {
        &self.data.object
    }
}
