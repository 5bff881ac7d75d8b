use crate::domain::order::{Amount, Customer, Order, OrderId};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of an order import file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderRecord {
    pub order_id: u64,
    pub order_number: String,
    pub customer_email: String,
    pub customer_name: String,
    pub total_amount: Decimal,
    #[serde(default)]
    pub deposit_percentage: Option<Decimal>,
}

impl OrderRecord {
    /// Builds the order, applying the deposit split when a percentage is set.
    pub fn into_order(self, now: DateTime<Utc>) -> Result<Order> {
        let total = Amount::new(self.total_amount)?;
        if self.order_number.is_empty() {
            return Err(PaymentError::InvalidInput(format!(
                "order {} has no order number",
                self.order_id
            )));
        }
        let mut order = Order::new(
            OrderId(self.order_id),
            self.order_number,
            total.value(),
            Customer {
                email: self.customer_email,
                name: self.customer_name,
            },
            now,
        );
        if let Some(pct) = self.deposit_percentage {
            order.configure_deposit(pct)?;
        }
        Ok(order)
    }
}

/// Reads orders from a CSV source.
///
/// Whitespace is trimmed and the deposit column may be left empty or
/// omitted entirely.
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and builds orders, one `Result` per row.
    pub fn orders(self, now: DateTime<Utc>) -> impl Iterator<Item = Result<Order>> {
        self.reader
            .into_deserialize::<OrderRecord>()
            .map(move |record| record.map_err(PaymentError::from)?.into_order(now))
    }
}
