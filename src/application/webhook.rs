use super::ledger::{SettlementLedger, SettlementResult};
use crate::domain::gateway::GatewayEvent;
use crate::domain::ports::OrderStoreRef;
use crate::error::{PaymentError, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// What happened to a delivered gateway event.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied(SettlementResult),
    /// Acknowledged without touching any order.
    Ignored(&'static str),
}

/// Turns gateway push notifications into ledger outcomes.
pub struct WebhookHandler {
    orders: OrderStoreRef,
    ledger: Arc<SettlementLedger>,
}

impl WebhookHandler {
    pub fn new(orders: OrderStoreRef, ledger: Arc<SettlementLedger>) -> Self {
        Self { orders, ledger }
    }

    pub async fn handle_json(&self, payload: &[u8]) -> Result<WebhookOutcome> {
        let event = GatewayEvent::from_json(payload)?;
        self.handle(&event).await
    }

    /// Resolves the order from intent metadata, falling back to the intent
    /// id stored on the order, and applies the announced outcome. Metadata
    /// that disagrees with the order the intent is attached to is ignored.
    pub async fn handle(&self, event: &GatewayEvent) -> Result<WebhookOutcome> {
        let Some(outcome) = event.outcome() else {
            info!(event_type = %event.kind, "unhandled gateway event type");
            return Ok(WebhookOutcome::Ignored("unhandled event type"));
        };
        let intent = event.intent();

        let stored = self
            .orders
            .find_by_intent(&intent.id)
            .await?
            .map(|(order, payment_type)| (order.id, payment_type));
        let target = match (intent.order_id(), intent.payment_type()) {
            (Some(order_id), Some(payment_type)) => {
                if let Some((stored_order, stored_type)) = stored
                    && (stored_order, stored_type) != (order_id, payment_type)
                {
                    warn!(
                        intent_id = %intent.id,
                        order_id = %order_id,
                        %payment_type,
                        stored_order_id = %stored_order,
                        stored_payment_type = %stored_type,
                        "gateway event metadata contradicts the attached intent"
                    );
                    return Ok(WebhookOutcome::Ignored("intent mismatch"));
                }
                Some((order_id, payment_type))
            }
            _ => stored,
        };
        let Some((order_id, payment_type)) = target else {
            warn!(intent_id = %intent.id, event_type = %event.kind, "gateway event for unknown intent");
            return Ok(WebhookOutcome::Ignored("unknown intent"));
        };

        match self
            .ledger
            .apply(order_id, payment_type, outcome, intent.link_token().as_ref())
            .await
        {
            Ok(result) => Ok(WebhookOutcome::Applied(result)),
            Err(PaymentError::OrderNotFound(id)) => {
                warn!(order_id = %id, intent_id = %intent.id, "gateway event references unknown order");
                Ok(WebhookOutcome::Ignored("unknown order"))
            }
            Err(e) => Err(e),
        }
    }
}
