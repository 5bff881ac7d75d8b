use super::issuer::LinkIssuer;
use super::ledger::SettlementLedger;
use super::reconciler::{ReconciliationReport, Reconciler};
use super::validator::LinkValidator;
use super::webhook::WebhookHandler;
use crate::domain::order::{Order, OrderId, PaymentType};
use crate::domain::payment_link::{LinkId, LinkStatistics, PaymentLink};
use crate::domain::ports::{NotifierRef, OrderStoreRef, PaymentGatewayRef, PaymentLinkStoreRef};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// A link together with the URL the customer opens.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedLink {
    pub link: PaymentLink,
    pub url: String,
    /// Whether the customer email went out.
    pub notified: bool,
}

/// Admin operation surface, wiring the services over shared stores.
pub struct AdminConsole {
    orders: OrderStoreRef,
    notifier: NotifierRef,
    frontend_url: String,
    issuer: LinkIssuer,
    validator: LinkValidator,
    ledger: Arc<SettlementLedger>,
    reconciler: Reconciler,
    webhooks: WebhookHandler,
}

impl AdminConsole {
    pub fn new(
        orders: OrderStoreRef,
        links: PaymentLinkStoreRef,
        gateway: PaymentGatewayRef,
        notifier: NotifierRef,
        frontend_url: impl Into<String>,
    ) -> Self {
        let ledger = Arc::new(SettlementLedger::new(
            orders.clone(),
            links.clone(),
            notifier.clone(),
        ));
        Self {
            issuer: LinkIssuer::new(orders.clone(), links.clone()),
            validator: LinkValidator::new(orders.clone(), links),
            reconciler: Reconciler::new(orders.clone(), gateway, ledger.clone()),
            webhooks: WebhookHandler::new(orders.clone(), ledger.clone()),
            ledger,
            orders,
            notifier,
            frontend_url: frontend_url.into(),
        }
    }

    pub fn issuer(&self) -> &LinkIssuer {
        &self.issuer
    }

    pub fn validator(&self) -> &LinkValidator {
        &self.validator
    }

    pub fn ledger(&self) -> &SettlementLedger {
        &self.ledger
    }

    pub fn webhooks(&self) -> &WebhookHandler {
        &self.webhooks
    }

    pub fn url_for(&self, link: &PaymentLink) -> String {
        link.url(&self.frontend_url)
    }

    pub async fn import_order(&self, order: Order) -> Result<()> {
        let id = order.id;
        self.orders.insert(order).await?;
        info!(order_id = %id, "order imported");
        Ok(())
    }

    pub async fn orders(&self) -> Result<Vec<Order>> {
        self.orders.all().await
    }

    /// Generates a link, builds its URL and emails it to the customer.
    /// A failed email is logged; the link stays valid.
    pub async fn issue_link(
        &self,
        order_id: OrderId,
        issuer: &str,
        expiry_days: i64,
        payment_type: PaymentType,
        amount: Option<Decimal>,
    ) -> Result<IssuedLink> {
        let link = self
            .issuer
            .generate_link(order_id, issuer, expiry_days, payment_type, amount)
            .await?;
        let url = self.url_for(&link);
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        let notified = self
            .notifier
            .send_payment_link_email(
                &order.customer.email,
                &order.customer.name,
                &order.order_number,
                &url,
                link.expires_at,
                link.amount,
            )
            .await;
        if !notified {
            warn!(link_id = %link.id, order_id = %order_id, "payment link email was not delivered");
        }
        Ok(IssuedLink {
            link,
            url,
            notified,
        })
    }

    /// Links of an order, newest first, each with its customer URL.
    pub async fn list_links(&self, order_id: OrderId) -> Result<Vec<(PaymentLink, String)>> {
        let links = self.issuer.list_links(order_id).await?;
        Ok(links
            .into_iter()
            .map(|l| {
                let url = self.url_for(&l);
                (l, url)
            })
            .collect())
    }

    pub async fn all_links(&self) -> Result<Vec<PaymentLink>> {
        self.issuer.all_links().await
    }

    pub async fn revoke_link(&self, link_id: LinkId) -> Result<bool> {
        self.issuer.revoke_link(link_id).await
    }

    pub async fn reconcile(&self, order_id: OrderId) -> Result<ReconciliationReport> {
        self.reconciler.reconcile(order_id).await
    }

    pub async fn sweep_expired(&self) -> Result<usize> {
        self.issuer.sweep_expired().await
    }

    pub async fn statistics(&self) -> Result<LinkStatistics> {
        self.issuer.statistics().await
    }
}
