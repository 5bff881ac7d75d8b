use super::ledger::SettlementLedger;
use crate::domain::gateway::IntentStatus;
use crate::domain::order::{Order, OrderId, PaymentType};
use crate::domain::ports::{OrderStoreRef, PaymentGatewayRef};
use crate::domain::settlement::FieldChange;
use crate::error::{PaymentError, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An intent the gateway reports as still in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingIntent {
    pub payment_type: PaymentType,
    pub intent_id: String,
    pub status: IntentStatus,
}

/// An intent whose status could not be read from the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentFailure {
    pub payment_type: PaymentType,
    pub intent_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub order_id: OrderId,
    pub changes: Vec<FieldChange>,
    pub pending: Vec<PendingIntent>,
    pub errors: Vec<IntentFailure>,
    /// Order snapshot after reconciliation.
    pub order: Order,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Re-derives an order's settlement state from the gateway.
pub struct Reconciler {
    orders: OrderStoreRef,
    gateway: PaymentGatewayRef,
    ledger: Arc<SettlementLedger>,
}

impl Reconciler {
    pub fn new(orders: OrderStoreRef, gateway: PaymentGatewayRef, ledger: Arc<SettlementLedger>) -> Self {
        Self {
            orders,
            gateway,
            ledger,
        }
    }

    /// Queries every intent attached to the order and applies terminal
    /// statuses through the ledger.
    ///
    /// A gateway failure on one intent is recorded in the report and the
    /// remaining intents are still processed. Missing orders and store
    /// failures abort.
    pub async fn reconcile(&self, order_id: OrderId) -> Result<ReconciliationReport> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        let intents: Vec<(PaymentType, String)> = order
            .intents()
            .map(|(t, id)| (t, id.to_string()))
            .collect();

        let mut report = ReconciliationReport {
            order_id,
            changes: Vec::new(),
            pending: Vec::new(),
            errors: Vec::new(),
            order,
        };

        for (payment_type, intent_id) in intents {
            let intent = match self.gateway.retrieve_intent(&intent_id).await {
                Ok(intent) => intent,
                Err(e) => {
                    warn!(order_id = %order_id, %payment_type, intent_id = %intent_id, error = %e, "gateway lookup failed");
                    report.errors.push(IntentFailure {
                        payment_type,
                        intent_id,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let Some(outcome) = intent.status.outcome() else {
                debug!(order_id = %order_id, %payment_type, intent_id = %intent_id, status = %intent.status, "intent still pending");
                report.pending.push(PendingIntent {
                    payment_type,
                    intent_id,
                    status: intent.status,
                });
                continue;
            };

            let result = self
                .ledger
                .apply(order_id, payment_type, outcome, intent.link_token().as_ref())
                .await?;
            report.changes.extend(result.changes);
            report.order = result.order;
        }

        info!(
            order_id = %order_id,
            changes = report.changes.len(),
            pending = report.pending.len(),
            errors = report.errors.len(),
            payment_status = %report.order.payment_status,
            "order reconciled"
        );
        Ok(report)
    }
}
