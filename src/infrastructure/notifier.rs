use crate::domain::order::{Amount, Customer, Order, OrderId, OrderItem, PaymentType};
use crate::domain::ports::Notifier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Emits notifications as structured log events instead of sending mail.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_payment_link_email(
        &self,
        customer_email: &str,
        customer_name: &str,
        order_number: &str,
        url: &str,
        expires_at: DateTime<Utc>,
        amount: Amount,
    ) -> bool {
        info!(
            to = customer_email,
            name = customer_name,
            order_number,
            url,
            %expires_at,
            %amount,
            "payment link email"
        );
        true
    }

    async fn send_order_confirmation(
        &self,
        order: &Order,
        customer: &Customer,
        items: &[OrderItem],
        payment_type: PaymentType,
    ) -> bool {
        info!(
            to = %customer.email,
            order_number = %order.order_number,
            items = items.len(),
            %payment_type,
            payment_status = %order.payment_status,
            "order confirmation email"
        );
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentLinkEmail {
    pub customer_email: String,
    pub customer_name: String,
    pub order_number: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentConfirmation {
    pub order_id: OrderId,
    pub customer_email: String,
    pub payment_type: PaymentType,
}

/// Captures every notification in memory. Can be switched to report
/// delivery failures.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    link_emails: Arc<Mutex<Vec<SentLinkEmail>>>,
    confirmations: Arc<Mutex<Vec<SentConfirmation>>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records calls but reports every delivery as failed.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub async fn link_emails(&self) -> Vec<SentLinkEmail> {
        self.link_emails.lock().await.clone()
    }

    pub async fn confirmations(&self) -> Vec<SentConfirmation> {
        self.confirmations.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_payment_link_email(
        &self,
        customer_email: &str,
        customer_name: &str,
        order_number: &str,
        url: &str,
        expires_at: DateTime<Utc>,
        amount: Amount,
    ) -> bool {
        self.link_emails.lock().await.push(SentLinkEmail {
            customer_email: customer_email.to_string(),
            customer_name: customer_name.to_string(),
            order_number: order_number.to_string(),
            url: url.to_string(),
            expires_at,
            amount,
        });
        !self.failing
    }

    async fn send_order_confirmation(
        &self,
        order: &Order,
        customer: &Customer,
        _items: &[OrderItem],
        payment_type: PaymentType,
    ) -> bool {
        self.confirmations.lock().await.push(SentConfirmation {
            order_id: order.id,
            customer_email: customer.email.clone(),
            payment_type,
        });
        !self.failing
    }
}
