use crate::domain::order::{Order, OrderId, PaymentType};
use crate::domain::payment_link::{LinkId, LinkStatus, LinkToken, PaymentLink};
use crate::domain::ports::{OrderStore, PaymentLinkStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for order snapshots, keyed by big-endian order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for payment links, keyed by link UUID bytes.
pub const CF_PAYMENT_LINKS: &str = "payment_links";
/// Column Family mapping a link token to its link UUID.
pub const CF_LINK_TOKENS: &str = "link_tokens";

/// A persistent store implementation using RocksDB.
///
/// Stores `Order` and `PaymentLink` records as JSON in separate Column
/// Families, with a secondary token index for links.
///
/// RocksDB has no compare-and-set primitive, so every read-check-write goes
/// through `write_lock`. `Clone` shares both the database and the lock.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// the column families on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ORDERS, CF_PAYMENT_LINKS, CF_LINK_TOKENS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::PersistenceFailure(format!("column family {} not found", name)))
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        self.db.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    fn link_id_for(&self, token: &LinkToken) -> Result<Option<LinkId>> {
        let Some(bytes) = self.db.get_cf(self.cf(CF_LINK_TOKENS)?, token.as_str().as_bytes())? else {
            return Ok(None);
        };
        let id = Uuid::from_slice(&bytes)
            .map_err(|e| PaymentError::PersistenceFailure(format!("corrupt token index: {}", e)))?;
        Ok(Some(LinkId(id)))
    }

    fn newest_first(mut links: Vec<PaymentLink>) -> Vec<PaymentLink> {
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        links
    }
}

fn order_key(id: OrderId) -> [u8; 8] {
    id.0.to_be_bytes()
}

fn link_key(id: LinkId) -> [u8; 16] {
    *id.0.as_bytes()
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.read::<Order>(CF_ORDERS, &order_key(order.id))?.is_some() {
            return Err(PaymentError::DuplicateOrder(order.id.to_string()));
        }
        if self
            .scan::<Order>(CF_ORDERS)?
            .iter()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(PaymentError::DuplicateOrder(order.order_number.clone()));
        }
        self.write(CF_ORDERS, &order_key(order.id), &order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        self.read(CF_ORDERS, &order_key(id))
    }

    async fn find_by_intent(&self, intent_id: &str) -> Result<Option<(Order, PaymentType)>> {
        Ok(self.scan::<Order>(CF_ORDERS)?.into_iter().find_map(|o| {
            let found = o
                .intents()
                .find(|(_, id)| *id == intent_id)
                .map(|(t, _)| t);
            found.map(|t| (o, t))
        }))
    }

    async fn compare_and_swap(&self, mut order: Order) -> Result<Option<Order>> {
        let _guard = self.write_lock.lock().await;
        let current: Order = self
            .read(CF_ORDERS, &order_key(order.id))?
            .ok_or(PaymentError::OrderNotFound(order.id))?;
        if current.version != order.version {
            return Ok(None);
        }
        order.version += 1;
        self.write(CF_ORDERS, &order_key(order.id), &order)?;
        Ok(Some(order))
    }

    async fn all(&self) -> Result<Vec<Order>> {
        // Big-endian keys iterate in id order.
        self.scan(CF_ORDERS)
    }
}

#[async_trait]
impl PaymentLinkStore for RocksDBStore {
    async fn insert(&self, link: PaymentLink) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.link_id_for(&link.token)?.is_some()
            || self.read::<PaymentLink>(CF_PAYMENT_LINKS, &link_key(link.id))?.is_some()
        {
            return Err(PaymentError::PersistenceFailure(
                "payment link token or id already exists".to_string(),
            ));
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_PAYMENT_LINKS)?,
            link_key(link.id),
            serde_json::to_vec(&link)?,
        );
        batch.put_cf(
            self.cf(CF_LINK_TOKENS)?,
            link.token.as_str().as_bytes(),
            link_key(link.id),
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, id: LinkId) -> Result<Option<PaymentLink>> {
        self.read(CF_PAYMENT_LINKS, &link_key(id))
    }

    async fn get_by_token(&self, token: &LinkToken) -> Result<Option<PaymentLink>> {
        match self.link_id_for(token)? {
            Some(id) => self.read(CF_PAYMENT_LINKS, &link_key(id)),
            None => Ok(None),
        }
    }

    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<PaymentLink>> {
        let links = self
            .scan::<PaymentLink>(CF_PAYMENT_LINKS)?
            .into_iter()
            .filter(|l| l.order_id == order_id)
            .collect();
        Ok(Self::newest_first(links))
    }

    async fn all(&self) -> Result<Vec<PaymentLink>> {
        Ok(Self::newest_first(self.scan(CF_PAYMENT_LINKS)?))
    }

    async fn update_status_if(
        &self,
        id: LinkId,
        expected: LinkStatus,
        new: LinkStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        expected.check_transition(new)?;
        let _guard = self.write_lock.lock().await;
        let Some(mut link) = self.read::<PaymentLink>(CF_PAYMENT_LINKS, &link_key(id))? else {
            return Ok(false);
        };
        if link.status != expected {
            return Ok(false);
        }
        link.status = new;
        if new == LinkStatus::Used {
            link.paid_at = Some(at);
        }
        self.write(CF_PAYMENT_LINKS, &link_key(id), &link)?;
        Ok(true)
    }

    async fn mark_accessed(&self, token: &LinkToken, at: DateTime<Utc>) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(id) = self.link_id_for(token)? else {
            return Ok(false);
        };
        let Some(mut link) = self.read::<PaymentLink>(CF_PAYMENT_LINKS, &link_key(id))? else {
            return Ok(false);
        };
        if link.accessed_at.is_some() {
            return Ok(false);
        }
        link.accessed_at = Some(at);
        self.write(CF_PAYMENT_LINKS, &link_key(id), &link)?;
        Ok(true)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Vec<LinkId>> {
        let _guard = self.write_lock.lock().await;
        let mut expired = Vec::new();
        let mut batch = WriteBatch::default();
        for mut link in self.scan::<PaymentLink>(CF_PAYMENT_LINKS)? {
            if link.status == LinkStatus::Active && link.expires_at < now {
                link.status = LinkStatus::Expired;
                batch.put_cf(
                    self.cf(CF_PAYMENT_LINKS)?,
                    link_key(link.id),
                    serde_json::to_vec(&link)?,
                );
                expired.push(link.id);
            }
        }
        self.db.write(batch)?;
        Ok(expired)
    }
}
