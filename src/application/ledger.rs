use crate::domain::order::{Order, OrderId, PaymentType};
use crate::domain::payment_link::{LinkStatus, LinkToken};
use crate::domain::ports::{NotifierRef, OrderStoreRef, PaymentLinkStoreRef};
use crate::domain::settlement::{self, FieldChange, Outcome};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// How many times a write is re-planned after losing a compare-and-swap.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

/// Result of feeding one outcome into the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementResult {
    /// Order snapshot after the call.
    pub order: Order,
    /// Empty when the outcome was a no-op.
    pub changes: Vec<FieldChange>,
    pub link_redeemed: bool,
    pub notified: bool,
}

impl SettlementResult {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

enum Write<T> {
    Unchanged(Order),
    Written(Order, T),
}

/// Owns the payment fields of orders and applies gateway-confirmed outcomes
/// to them.
pub struct SettlementLedger {
    orders: OrderStoreRef,
    links: PaymentLinkStoreRef,
    notifier: NotifierRef,
}

impl SettlementLedger {
    pub fn new(orders: OrderStoreRef, links: PaymentLinkStoreRef, notifier: NotifierRef) -> Self {
        Self {
            orders,
            links,
            notifier,
        }
    }

    pub async fn apply(
        &self,
        order_id: OrderId,
        payment_type: PaymentType,
        outcome: Outcome,
        link: Option<&LinkToken>,
    ) -> Result<SettlementResult> {
        self.apply_at(order_id, payment_type, outcome, link, Utc::now())
            .await
    }

    /// Applies `outcome` for `payment_type` to the order.
    ///
    /// When `link` is given and the payment type ends up paid, the link is
    /// redeemed (`active -> used`). A link that is no longer active keeps its
    /// status; the order is settled regardless because the gateway has the
    /// money.
    pub async fn apply_at(
        &self,
        order_id: OrderId,
        payment_type: PaymentType,
        outcome: Outcome,
        link: Option<&LinkToken>,
        now: DateTime<Utc>,
    ) -> Result<SettlementResult> {
        let write = self
            .write_with_retry(order_id, |order| {
                Ok(settlement::plan(order, payment_type, outcome, now)
                    .map(|s| (s.order, (s.changes, s.newly_paid))))
            })
            .await?;

        let (order, changes, newly_paid) = match write {
            Write::Unchanged(order) => {
                debug!(order_id = %order_id, %payment_type, %outcome, "outcome already applied");
                (order, Vec::new(), false)
            }
            Write::Written(order, (changes, newly_paid)) => {
                for change in &changes {
                    info!(order_id = %order_id, %payment_type, %outcome, %change, "settlement transition");
                }
                (order, changes, newly_paid)
            }
        };

        let mut link_redeemed = false;
        if let Some(token) = link
            && outcome == Outcome::Succeeded
            && order.is_settled(payment_type)
        {
            link_redeemed = self.redeem(&order, payment_type, token, now).await?;
        }

        let mut notified = false;
        if newly_paid {
            notified = self
                .notifier
                .send_order_confirmation(&order, &order.customer, &order.items, payment_type)
                .await;
            if !notified {
                warn!(order_id = %order_id, %payment_type, "order confirmation was not delivered");
            }
        }

        Ok(SettlementResult {
            order,
            changes,
            link_redeemed,
            notified,
        })
    }

    /// Records the gateway intent collecting `payment_type` on the order.
    pub async fn attach_intent(
        &self,
        order_id: OrderId,
        payment_type: PaymentType,
        intent_id: &str,
    ) -> Result<Order> {
        let intent_id = intent_id.trim();
        if intent_id.is_empty() {
            return Err(PaymentError::InvalidInput("intent id is empty".to_string()));
        }
        let now = Utc::now();
        let write = self
            .write_with_retry(order_id, |order| {
                if order.is_settled(payment_type) {
                    return Err(PaymentError::AlreadyPaid(payment_type));
                }
                if order.intent_id(payment_type) == Some(intent_id) {
                    return Ok(None);
                }
                let mut next = order.clone();
                next.set_intent_id(payment_type, intent_id.to_string());
                next.updated_at = now;
                Ok(Some((next, ())))
            })
            .await?;
        Ok(match write {
            Write::Unchanged(order) => order,
            Write::Written(order, ()) => {
                info!(order_id = %order_id, %payment_type, intent_id, "gateway intent attached");
                order
            }
        })
    }

    /// Splits the order total into a deposit and a balance.
    pub async fn configure_deposit(&self, order_id: OrderId, percentage: Decimal) -> Result<Order> {
        let now = Utc::now();
        let write = self
            .write_with_retry(order_id, |order| {
                let mut next = order.clone();
                next.configure_deposit(percentage)?;
                if next == *order {
                    return Ok(None);
                }
                next.updated_at = now;
                Ok(Some((next, ())))
            })
            .await?;
        Ok(match write {
            Write::Unchanged(order) | Write::Written(order, ()) => order,
        })
    }

    async fn redeem(
        &self,
        order: &Order,
        payment_type: PaymentType,
        token: &LinkToken,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(link) = self.links.get_by_token(token).await? else {
            warn!(order_id = %order.id, "paying link not found; nothing to redeem");
            return Ok(false);
        };
        if link.order_id != order.id || link.payment_type != payment_type {
            warn!(
                link_id = %link.id,
                order_id = %order.id,
                link_order_id = %link.order_id,
                %payment_type,
                link_payment_type = %link.payment_type,
                "paying link does not match the settled payment"
            );
            return Ok(false);
        }
        let redeemed = self
            .links
            .update_status_if(link.id, LinkStatus::Active, LinkStatus::Used, now)
            .await?;
        if redeemed {
            info!(link_id = %link.id, order_id = %order.id, "payment link redeemed");
        } else if link.status != LinkStatus::Used {
            warn!(
                link_id = %link.id,
                status = %link.status,
                "payment settled through a link that is no longer active; link left unchanged"
            );
        }
        Ok(redeemed)
    }

    /// Read-modify-write of one order under optimistic concurrency.
    ///
    /// `mutate` is re-run against a fresh snapshot after every lost
    /// compare-and-swap, so a retry can legitimately turn into a no-op.
    async fn write_with_retry<T, F>(&self, order_id: OrderId, mut mutate: F) -> Result<Write<T>>
    where
        F: FnMut(&Order) -> Result<Option<(Order, T)>>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self
                .orders
                .get(order_id)
                .await?
                .ok_or(PaymentError::OrderNotFound(order_id))?;
            let Some((next, extra)) = mutate(&current)? else {
                return Ok(Write::Unchanged(current));
            };
            match self.orders.compare_and_swap(next).await? {
                Some(written) => return Ok(Write::Written(written, extra)),
                None => debug!(order_id = %order_id, attempt, "lost compare-and-swap, re-reading order"),
            }
        }
        Err(PaymentError::PersistenceFailure(format!(
            "order {} kept changing concurrently after {} attempts",
            order_id, MAX_WRITE_ATTEMPTS
        )))
    }
}
