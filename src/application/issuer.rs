use crate::domain::order::{Amount, OrderId, PaymentType};
use crate::domain::payment_link::{LinkId, LinkStatistics, LinkStatus, LinkToken, PaymentLink};
use crate::domain::ports::{OrderStoreRef, PaymentLinkStoreRef};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// Issues payment links and manages their administrative lifecycle.
pub struct LinkIssuer {
    orders: OrderStoreRef,
    links: PaymentLinkStoreRef,
}

impl LinkIssuer {
    pub fn new(orders: OrderStoreRef, links: PaymentLinkStoreRef) -> Self {
        Self { orders, links }
    }

    pub async fn generate_link(
        &self,
        order_id: OrderId,
        issuer: &str,
        expiry_days: i64,
        payment_type: PaymentType,
        amount: Option<Decimal>,
    ) -> Result<PaymentLink> {
        self.generate_link_at(order_id, issuer, expiry_days, payment_type, amount, Utc::now())
            .await
    }

    /// Creates and persists a new `active` link for `payment_type`.
    ///
    /// Without an explicit `amount` the link collects what the order owes for
    /// that type at issuance time.
    pub async fn generate_link_at(
        &self,
        order_id: OrderId,
        issuer: &str,
        expiry_days: i64,
        payment_type: PaymentType,
        amount: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<PaymentLink> {
        if expiry_days < 1 {
            return Err(PaymentError::InvalidExpiry(expiry_days));
        }
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        if order.is_settled(payment_type) {
            return Err(PaymentError::AlreadyPaid(payment_type));
        }
        let amount = Amount::new(amount.unwrap_or_else(|| order.amount_due(payment_type)))?;

        let link = PaymentLink {
            id: LinkId::new(),
            order_id,
            token: LinkToken::generate(),
            payment_type,
            amount,
            status: LinkStatus::Active,
            created_by: issuer.to_string(),
            created_at: now,
            expires_at: now + Duration::days(expiry_days),
            accessed_at: None,
            paid_at: None,
        };
        self.links.insert(link.clone()).await?;

        info!(
            link_id = %link.id,
            order_id = %order_id,
            %payment_type,
            %amount,
            expires_at = %link.expires_at,
            created_by = issuer,
            "payment link issued"
        );
        Ok(link)
    }

    pub async fn list_links(&self, order_id: OrderId) -> Result<Vec<PaymentLink>> {
        self.links.list_by_order(order_id).await
    }

    pub async fn all_links(&self) -> Result<Vec<PaymentLink>> {
        self.links.all().await
    }

    /// Revokes an active link. Returns `false` if the link had already left
    /// `active`; a terminal status is never overwritten.
    pub async fn revoke_link(&self, link_id: LinkId) -> Result<bool> {
        let link = self
            .links
            .get(link_id)
            .await?
            .ok_or(PaymentError::LinkNotFound)?;
        let revoked = self
            .links
            .update_status_if(link.id, LinkStatus::Active, LinkStatus::Revoked, Utc::now())
            .await?;
        if revoked {
            info!(link_id = %link_id, order_id = %link.order_id, "payment link revoked");
        } else {
            debug!(link_id = %link_id, status = %link.status, "revoke ignored, link not active");
        }
        Ok(revoked)
    }

    pub async fn sweep_expired(&self) -> Result<usize> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Moves every active link past its expiry to `expired`.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired = self.links.expire_stale(now).await?;
        if !expired.is_empty() {
            info!(count = expired.len(), "expired payment links swept");
        }
        Ok(expired.len())
    }

    pub async fn statistics(&self) -> Result<LinkStatistics> {
        let links = self.links.all().await?;
        Ok(LinkStatistics::tally(&links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Customer, Order};
    use crate::domain::ports::{OrderStore, PaymentLinkStore};
    use crate::infrastructure::in_memory::{InMemoryOrderStore, InMemoryPaymentLinkStore};
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::Arc;

    async fn setup() -> (LinkIssuer, Arc<InMemoryOrderStore>, Arc<InMemoryPaymentLinkStore>) {
        let orders = Arc::new(InMemoryOrderStore::new());
        let links = Arc::new(InMemoryPaymentLinkStore::new());
        let mut order = Order::new(
            OrderId(1),
            "CMD-1",
            dec!(1000),
            Customer {
                email: "c@example.com".to_string(),
                name: "C".to_string(),
            },
            Utc::now(),
        );
        order.configure_deposit(dec!(30)).unwrap();
        orders.insert(order).await.unwrap();
        (
            LinkIssuer::new(orders.clone(), links.clone()),
            orders,
            links,
        )
    }

    #[tokio::test]
    async fn test_generate_derives_amount_per_type() {
        let (issuer, _, _) = setup().await;
        let full = issuer
            .generate_link(OrderId(1), "admin", 30, PaymentType::Full, None)
            .await
            .unwrap();
        let deposit = issuer
            .generate_link(OrderId(1), "admin", 30, PaymentType::Deposit, None)
            .await
            .unwrap();
        let balance = issuer
            .generate_link(OrderId(1), "admin", 30, PaymentType::Balance, None)
            .await
            .unwrap();

        assert_eq!(full.amount.value(), dec!(1000));
        assert_eq!(deposit.amount.value(), dec!(300));
        assert_eq!(balance.amount.value(), dec!(700));
        assert_eq!(full.status, LinkStatus::Active);
        assert_eq!(full.created_by, "admin");
    }

    #[tokio::test]
    async fn test_generate_sets_expiry() {
        let (issuer, _, _) = setup().await;
        let now = Utc::now();
        let link = issuer
            .generate_link_at(OrderId(1), "admin", 7, PaymentType::Full, None, now)
            .await
            .unwrap();
        assert_eq!(link.created_at, now);
        assert_eq!(link.expires_at, now + Duration::days(7));
        assert!(link.expires_at > link.created_at);
    }

    #[tokio::test]
    async fn test_generate_rejections() {
        let (issuer, orders, _) = setup().await;

        let err = issuer
            .generate_link(OrderId(9), "admin", 30, PaymentType::Full, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::OrderNotFound(OrderId(9))));

        let err = issuer
            .generate_link(OrderId(1), "admin", 0, PaymentType::Full, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidExpiry(0)));

        let err = issuer
            .generate_link(OrderId(1), "admin", 30, PaymentType::Full, Some(dec!(-5)))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidAmount(_)));

        let mut paid = orders.get(OrderId(1)).await.unwrap().unwrap();
        paid.deposit_payment_status = crate::domain::order::InstallmentStatus::Paid;
        orders.compare_and_swap(paid).await.unwrap();
        let err = issuer
            .generate_link(OrderId(1), "admin", 30, PaymentType::Deposit, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::AlreadyPaid(PaymentType::Deposit)));
    }

    #[tokio::test]
    async fn test_deposit_link_without_split_is_rejected() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let links = Arc::new(InMemoryPaymentLinkStore::new());
        orders
            .insert(Order::new(
                OrderId(2),
                "CMD-2",
                dec!(500),
                Customer {
                    email: "d@example.com".to_string(),
                    name: "D".to_string(),
                },
                Utc::now(),
            ))
            .await
            .unwrap();
        let issuer = LinkIssuer::new(orders, links);
        let err = issuer
            .generate_link(OrderId(2), "admin", 30, PaymentType::Deposit, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_balance_link_without_split_is_rejected() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let links = Arc::new(InMemoryPaymentLinkStore::new());
        orders
            .insert(Order::new(
                OrderId(3),
                "CMD-3",
                dec!(1200),
                Customer {
                    email: "e@example.com".to_string(),
                    name: "E".to_string(),
                },
                Utc::now(),
            ))
            .await
            .unwrap();
        let issuer = LinkIssuer::new(orders, links.clone());
        let err = issuer
            .generate_link(OrderId(3), "admin", 30, PaymentType::Balance, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidAmount(_)));
        assert!(links.list_by_order(OrderId(3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let (issuer, _, _) = setup().await;
        let mut tokens = HashSet::new();
        for _ in 0..200 {
            let link = issuer
                .generate_link(OrderId(1), "admin", 30, PaymentType::Full, None)
                .await
                .unwrap();
            assert_eq!(link.token.as_str().len(), LinkToken::LEN);
            assert!(tokens.insert(link.token));
        }
    }

    #[tokio::test]
    async fn test_revoke_is_conditional() {
        let (issuer, _, links) = setup().await;
        let link = issuer
            .generate_link(OrderId(1), "admin", 30, PaymentType::Full, None)
            .await
            .unwrap();
        assert!(issuer.revoke_link(link.id).await.unwrap());
        assert!(!issuer.revoke_link(link.id).await.unwrap());

        let used = issuer
            .generate_link(OrderId(1), "admin", 30, PaymentType::Full, None)
            .await
            .unwrap();
        links
            .update_status_if(used.id, LinkStatus::Active, LinkStatus::Used, Utc::now())
            .await
            .unwrap();
        assert!(!issuer.revoke_link(used.id).await.unwrap());
        assert_eq!(links.get(used.id).await.unwrap().unwrap().status, LinkStatus::Used);

        assert!(matches!(
            issuer.revoke_link(LinkId::new()).await,
            Err(PaymentError::LinkNotFound)
        ));
    }

    #[tokio::test]
    async fn test_sweep_and_statistics() {
        let (issuer, _, links) = setup().await;
        let now = Utc::now();
        let old = issuer
            .generate_link_at(OrderId(1), "admin", 1, PaymentType::Full, None, now - Duration::days(3))
            .await
            .unwrap();
        let fresh = issuer
            .generate_link_at(OrderId(1), "admin", 30, PaymentType::Full, None, now)
            .await
            .unwrap();
        links.mark_accessed(&fresh.token, now).await.unwrap();

        assert_eq!(issuer.sweep_expired_at(now).await.unwrap(), 1);
        assert_eq!(issuer.sweep_expired_at(now).await.unwrap(), 0);

        let stats = issuer.statistics().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.accessed, 1);

        let listed = issuer.list_links(OrderId(1)).await.unwrap();
        assert_eq!(listed[0].id, fresh.id);
        assert_eq!(listed[1].id, old.id);
    }
}
