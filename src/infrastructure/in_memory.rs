use crate::domain::order::{Order, OrderId, PaymentType};
use crate::domain::payment_link::{LinkId, LinkStatus, LinkToken, PaymentLink};
use crate::domain::ports::{OrderStore, PaymentLinkStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory order store.
///
/// Every conditional write checks and mutates under a single write guard, so
/// two racing compare-and-swaps on the same order cannot both succeed.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(PaymentError::DuplicateOrder(order.id.to_string()));
        }
        if orders.values().any(|o| o.order_number == order.order_number) {
            return Err(PaymentError::DuplicateOrder(order.order_number.clone()));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id).cloned())
    }

    async fn find_by_intent(&self, intent_id: &str) -> Result<Option<(Order, PaymentType)>> {
        let orders = self.orders.read().await;
        Ok(orders.values().find_map(|o| {
            o.intents()
                .find(|(_, id)| *id == intent_id)
                .map(|(t, _)| (o.clone(), t))
        }))
    }

    async fn compare_and_swap(&self, mut order: Order) -> Result<Option<Order>> {
        let mut orders = self.orders.write().await;
        let Some(current) = orders.get_mut(&order.id) else {
            return Err(PaymentError::OrderNotFound(order.id));
        };
        if current.version != order.version {
            return Ok(None);
        }
        order.version += 1;
        *current = order.clone();
        Ok(Some(order))
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by_key(|o| o.id);
        Ok(all)
    }
}

/// A thread-safe in-memory payment link store, indexed by id and by token.
#[derive(Default, Clone)]
pub struct InMemoryPaymentLinkStore {
    inner: Arc<RwLock<LinkTables>>,
}

#[derive(Default)]
struct LinkTables {
    links: HashMap<LinkId, PaymentLink>,
    by_token: HashMap<LinkToken, LinkId>,
}

impl InMemoryPaymentLinkStore {
    /// Creates a new, empty in-memory payment link store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentLinkStore for InMemoryPaymentLinkStore {
    async fn insert(&self, link: PaymentLink) -> Result<()> {
        let mut tables = self.inner.write().await;
        if tables.by_token.contains_key(&link.token) || tables.links.contains_key(&link.id) {
            return Err(PaymentError::PersistenceFailure(
                "payment link token or id already exists".to_string(),
            ));
        }
        tables.by_token.insert(link.token.clone(), link.id);
        tables.links.insert(link.id, link);
        Ok(())
    }

    async fn get(&self, id: LinkId) -> Result<Option<PaymentLink>> {
        let tables = self.inner.read().await;
        Ok(tables.links.get(&id).cloned())
    }

    async fn get_by_token(&self, token: &LinkToken) -> Result<Option<PaymentLink>> {
        let tables = self.inner.read().await;
        Ok(tables
            .by_token
            .get(token)
            .and_then(|id| tables.links.get(id))
            .cloned())
    }

    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<PaymentLink>> {
        let tables = self.inner.read().await;
        let mut links: Vec<PaymentLink> = tables
            .links
            .values()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn all(&self) -> Result<Vec<PaymentLink>> {
        let tables = self.inner.read().await;
        let mut links: Vec<PaymentLink> = tables.links.values().cloned().collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn update_status_if(
        &self,
        id: LinkId,
        expected: LinkStatus,
        new: LinkStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        expected.check_transition(new)?;
        let mut tables = self.inner.write().await;
        match tables.links.get_mut(&id) {
            Some(link) if link.status == expected => {
                link.status = new;
                if new == LinkStatus::Used {
                    link.paid_at = Some(at);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_accessed(&self, token: &LinkToken, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.inner.write().await;
        let Some(id) = tables.by_token.get(token).copied() else {
            return Ok(false);
        };
        match tables.links.get_mut(&id) {
            Some(link) if link.accessed_at.is_none() => {
                link.accessed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Vec<LinkId>> {
        let mut tables = self.inner.write().await;
        let mut expired = Vec::new();
        for link in tables.links.values_mut() {
            if link.status == LinkStatus::Active && link.expires_at < now {
                link.status = LinkStatus::Expired;
                expired.push(link.id);
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Amount, Customer};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn order(id: u64) -> Order {
        Order::new(
            OrderId(id),
            format!("CMD-{}", id),
            dec!(500),
            Customer {
                email: "c@example.com".to_string(),
                name: "C".to_string(),
            },
            Utc::now(),
        )
    }

    fn link(order_id: u64, expires_in: Duration) -> PaymentLink {
        let now = Utc::now();
        PaymentLink {
            id: LinkId::new(),
            order_id: OrderId(order_id),
            token: LinkToken::generate(),
            payment_type: PaymentType::Full,
            amount: Amount::new(dec!(500)).unwrap(),
            status: LinkStatus::Active,
            created_by: "admin@example.com".to_string(),
            created_at: now,
            expires_at: now + expires_in,
            accessed_at: None,
            paid_at: None,
        }
    }

    #[tokio::test]
    async fn test_in_memory_order_store() {
        let store = InMemoryOrderStore::new();
        let o = order(1);
        store.insert(o.clone()).await.unwrap();
        assert_eq!(store.get(OrderId(1)).await.unwrap(), Some(o));
        assert!(store.get(OrderId(2)).await.unwrap().is_none());
        assert!(matches!(
            store.insert(order(1)).await,
            Err(PaymentError::DuplicateOrder(_))
        ));
    }

    #[tokio::test]
    async fn test_order_number_is_unique() {
        let store = InMemoryOrderStore::new();
        store.insert(order(1)).await.unwrap();
        let mut twin = order(2);
        twin.order_number = order(1).order_number;
        assert!(matches!(
            store.insert(twin).await,
            Err(PaymentError::DuplicateOrder(_))
        ));
        assert!(store.get(OrderId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compare_and_swap_rejects_stale_version() {
        let store = InMemoryOrderStore::new();
        store.insert(order(1)).await.unwrap();

        let snapshot = store.get(OrderId(1)).await.unwrap().unwrap();
        let written = store.compare_and_swap(snapshot.clone()).await.unwrap().unwrap();
        assert_eq!(written.version, 1);

        // Same stale snapshot again: loses.
        assert!(store.compare_and_swap(snapshot).await.unwrap().is_none());
        assert_eq!(store.get(OrderId(1)).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_find_by_intent() {
        let store = InMemoryOrderStore::new();
        let mut o = order(3);
        o.set_intent_id(PaymentType::Deposit, "pi_dep".to_string());
        store.insert(o).await.unwrap();

        let (found, t) = store.find_by_intent("pi_dep").await.unwrap().unwrap();
        assert_eq!(found.id, OrderId(3));
        assert_eq!(t, PaymentType::Deposit);
        assert!(store.find_by_intent("pi_other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_link_store_token_uniqueness() {
        let store = InMemoryPaymentLinkStore::new();
        let l = link(1, Duration::days(1));
        store.insert(l.clone()).await.unwrap();

        let mut dup = link(1, Duration::days(1));
        dup.token = l.token.clone();
        assert!(store.insert(dup).await.is_err());

        assert_eq!(store.get_by_token(&l.token).await.unwrap(), Some(l));
    }

    #[tokio::test]
    async fn test_update_status_if_is_conditional() {
        let store = InMemoryPaymentLinkStore::new();
        let l = link(1, Duration::days(1));
        store.insert(l.clone()).await.unwrap();
        let now = Utc::now();

        assert!(store.update_status_if(l.id, LinkStatus::Active, LinkStatus::Used, now).await.unwrap());
        assert!(!store.update_status_if(l.id, LinkStatus::Active, LinkStatus::Revoked, now).await.unwrap());

        let stored = store.get(l.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LinkStatus::Used);
        assert_eq!(stored.paid_at, Some(now));
    }

    #[tokio::test]
    async fn test_update_status_if_refuses_edges_out_of_terminal_states() {
        let store = InMemoryPaymentLinkStore::new();
        let l = link(1, Duration::days(1));
        store.insert(l.clone()).await.unwrap();
        let now = Utc::now();
        assert!(store.update_status_if(l.id, LinkStatus::Active, LinkStatus::Revoked, now).await.unwrap());

        assert!(matches!(
            store.update_status_if(l.id, LinkStatus::Revoked, LinkStatus::Active, now).await,
            Err(PaymentError::InvalidInput(_))
        ));
        assert!(matches!(
            store.update_status_if(l.id, LinkStatus::Revoked, LinkStatus::Used, now).await,
            Err(PaymentError::InvalidInput(_))
        ));
        assert_eq!(store.get(l.id).await.unwrap().unwrap().status, LinkStatus::Revoked);
    }

    #[tokio::test]
    async fn test_mark_accessed_only_first_time() {
        let store = InMemoryPaymentLinkStore::new();
        let l = link(1, Duration::days(1));
        store.insert(l.clone()).await.unwrap();

        let first = Utc::now();
        assert!(store.mark_accessed(&l.token, first).await.unwrap());
        assert!(!store.mark_accessed(&l.token, first + Duration::hours(1)).await.unwrap());
        let stored = store.get(l.id).await.unwrap().unwrap();
        assert_eq!(stored.accessed_at, Some(first));
    }

    #[tokio::test]
    async fn test_expire_stale_skips_terminal_links() {
        let store = InMemoryPaymentLinkStore::new();
        let stale = link(1, -Duration::days(1));
        let used = link(1, -Duration::days(1));
        let fresh = link(1, Duration::days(1));
        for l in [&stale, &used, &fresh] {
            store.insert(l.clone()).await.unwrap();
        }
        store
            .update_status_if(used.id, LinkStatus::Active, LinkStatus::Used, Utc::now())
            .await
            .unwrap();

        let expired = store.expire_stale(Utc::now()).await.unwrap();
        assert_eq!(expired, vec![stale.id]);
        assert_eq!(store.get(used.id).await.unwrap().unwrap().status, LinkStatus::Used);
        assert_eq!(store.get(fresh.id).await.unwrap().unwrap().status, LinkStatus::Active);
    }

    #[tokio::test]
    async fn test_list_by_order_newest_first() {
        let store = InMemoryPaymentLinkStore::new();
        let mut older = link(1, Duration::days(1));
        older.created_at -= Duration::hours(2);
        let newer = link(1, Duration::days(1));
        store.insert(older.clone()).await.unwrap();
        store.insert(newer.clone()).await.unwrap();
        store.insert(link(2, Duration::days(1))).await.unwrap();

        let links = store.list_by_order(OrderId(1)).await.unwrap();
        assert_eq!(links.iter().map(|l| l.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
    }
}
