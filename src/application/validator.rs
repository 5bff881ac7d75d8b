use crate::domain::order::Order;
use crate::domain::payment_link::{LinkToken, LinkVerdict, PaymentLink};
use crate::domain::ports::{OrderStoreRef, PaymentLinkStoreRef};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

/// What the payment page needs once a token has been accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutView {
    pub link: PaymentLink,
    pub order: Order,
}

/// Decides whether a token may be used to pay.
pub struct LinkValidator {
    orders: OrderStoreRef,
    links: PaymentLinkStoreRef,
}

impl LinkValidator {
    pub fn new(orders: OrderStoreRef, links: PaymentLinkStoreRef) -> Self {
        Self { orders, links }
    }

    pub async fn validate_link(&self, token: &LinkToken) -> Result<LinkVerdict> {
        self.validate_link_at(token, Utc::now()).await
    }

    /// Classifies `token` at `now`. Store failures are errors; every other
    /// rejection is a verdict.
    pub async fn validate_link_at(&self, token: &LinkToken, now: DateTime<Utc>) -> Result<LinkVerdict> {
        let Some(link) = self.links.get_by_token(token).await? else {
            return Ok(LinkVerdict::NotFound);
        };
        let order = self.orders.get(link.order_id).await?;
        let verdict = LinkVerdict::evaluate(link, order.as_ref(), now);
        if !verdict.is_valid() {
            debug!(token = ?token, verdict = verdict.message(), "payment link rejected");
        }
        Ok(verdict)
    }

    /// Records the first time the link was opened. Later calls are no-ops.
    pub async fn mark_as_accessed(&self, token: &LinkToken) -> Result<bool> {
        self.links.mark_accessed(token, Utc::now()).await
    }

    pub async fn open_link(&self, token: &LinkToken) -> Result<CheckoutView> {
        self.open_link_at(token, Utc::now()).await
    }

    /// Validates the token and, when it is accepted, marks it accessed and
    /// returns the link with its order.
    pub async fn open_link_at(&self, token: &LinkToken, now: DateTime<Utc>) -> Result<CheckoutView> {
        let link = self.validate_link_at(token, now).await?.into_result()?;
        self.links.mark_accessed(token, now).await?;
        let order = self
            .orders
            .get(link.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(link.order_id))?;
        let link = self
            .links
            .get(link.id)
            .await?
            .ok_or(PaymentError::LinkNotFound)?;
        Ok(CheckoutView { link, order })
    }
}
