#![allow(dead_code)]

use chrono::Utc;
use paylink::application::admin::AdminConsole;
use paylink::domain::order::{Customer, Order, OrderId};
use paylink::infrastructure::gateway::StaticGateway;
use paylink::infrastructure::in_memory::{InMemoryOrderStore, InMemoryPaymentLinkStore};
use paylink::infrastructure::notifier::RecordingNotifier;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

pub const FRONTEND: &str = "http://127.0.0.1:3000";

pub struct Harness {
    pub admin: AdminConsole,
    pub orders: Arc<InMemoryOrderStore>,
    pub links: Arc<InMemoryPaymentLinkStore>,
    pub gateway: Arc<StaticGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness() -> Harness {
    let orders = Arc::new(InMemoryOrderStore::new());
    let links = Arc::new(InMemoryPaymentLinkStore::new());
    let gateway = Arc::new(StaticGateway::new());
    let notifier = Arc::new(RecordingNotifier::new());
    Harness {
        admin: AdminConsole::new(
            orders.clone(),
            links.clone(),
            gateway.clone(),
            notifier.clone(),
            FRONTEND,
        ),
        orders,
        links,
        gateway,
        notifier,
    }
}

pub fn order(id: u64, total: Decimal) -> Order {
    Order::new(
        OrderId(id),
        format!("CMD-{:04}", id),
        total,
        Customer {
            email: format!("customer{}@example.com", id),
            name: format!("Customer {}", id),
        },
        Utc::now(),
    )
}

pub fn write_orders_csv(path: &Path, rows: &[(u64, &str, &str)]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record([
        "order_id",
        "order_number",
        "customer_email",
        "customer_name",
        "total_amount",
        "deposit_percentage",
    ])?;
    for (id, total, deposit) in rows {
        wtr.write_record([
            id.to_string(),
            format!("CMD-{:04}", id),
            format!("customer{}@example.com", id),
            format!("Customer {}", id),
            total.to_string(),
            deposit.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
