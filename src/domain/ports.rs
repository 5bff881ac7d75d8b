use super::gateway::{GatewayError, GatewayIntent};
use super::order::{Amount, Customer, Order, OrderId, OrderItem, PaymentType};
use super::payment_link::{LinkId, LinkStatus, LinkToken, PaymentLink};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order. Fails if the id or order number is taken.
    async fn insert(&self, order: Order) -> Result<()>;
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;
    /// Finds the order holding `intent_id` in one of its intent slots.
    async fn find_by_intent(&self, intent_id: &str) -> Result<Option<(Order, PaymentType)>>;
    /// Replaces the stored order only if its version still equals
    /// `order.version`. On success the stored version is bumped and the new
    /// snapshot returned; `None` means another writer got there first.
    async fn compare_and_swap(&self, order: Order) -> Result<Option<Order>>;
    async fn all(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait PaymentLinkStore: Send + Sync {
    /// Inserts a new link. Fails if the token already exists.
    async fn insert(&self, link: PaymentLink) -> Result<()>;
    async fn get(&self, id: LinkId) -> Result<Option<PaymentLink>>;
    async fn get_by_token(&self, token: &LinkToken) -> Result<Option<PaymentLink>>;
    /// Links of an order, newest first.
    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<PaymentLink>>;
    async fn all(&self) -> Result<Vec<PaymentLink>>;
    /// Moves a link from `expected` to `new` and returns whether it did.
    /// Moving to `Used` stamps `paid_at` with `at`. Edges other than
    /// `Active` to a terminal status fail with `InvalidInput`.
    async fn update_status_if(
        &self,
        id: LinkId,
        expected: LinkStatus,
        new: LinkStatus,
        at: DateTime<Utc>,
    ) -> Result<bool>;
    /// Sets `accessed_at` if it is still unset. Returns whether it did.
    async fn mark_accessed(&self, token: &LinkToken, at: DateTime<Utc>) -> Result<bool>;
    /// Moves every active link with `expires_at < now` to `Expired`.
    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Vec<LinkId>>;
}

/// Read side of the external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn retrieve_intent(&self, intent_id: &str) -> std::result::Result<GatewayIntent, GatewayError>;
}

/// Customer notifications. Delivery is best effort: `false` means the
/// message was not sent, and callers log it rather than fail.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_payment_link_email(
        &self,
        customer_email: &str,
        customer_name: &str,
        order_number: &str,
        url: &str,
        expires_at: DateTime<Utc>,
        amount: Amount,
    ) -> bool;

    async fn send_order_confirmation(
        &self,
        order: &Order,
        customer: &Customer,
        items: &[OrderItem],
        payment_type: PaymentType,
    ) -> bool;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type PaymentLinkStoreRef = Arc<dyn PaymentLinkStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type NotifierRef = Arc<dyn Notifier>;
