use chrono::Utc;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use paylink::application::admin::AdminConsole;
use paylink::application::webhook::WebhookOutcome;
use paylink::config::Settings;
use paylink::domain::order::{OrderId, PaymentType};
use paylink::domain::payment_link::{LinkId, LinkToken};
use paylink::domain::ports::{NotifierRef, OrderStoreRef, PaymentGatewayRef, PaymentLinkStoreRef};
use paylink::error::PaymentError;
use paylink::infrastructure::gateway::StaticGateway;
use paylink::infrastructure::in_memory::{InMemoryOrderStore, InMemoryPaymentLinkStore};
use paylink::infrastructure::notifier::LogNotifier;
use paylink::interfaces::csv::link_writer::LinkWriter;
use paylink::interfaces::csv::order_reader::OrderReader;
use paylink::telemetry;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Orders CSV loaded before the command runs. Already known orders are skipped.
    #[arg(long, global = true)]
    orders: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import orders from a CSV file.
    ImportOrders { input: PathBuf },
    /// Split an order into a deposit and a balance.
    Deposit {
        #[arg(long)]
        order: u64,
        #[arg(long)]
        percentage: Decimal,
    },
    /// Issue a payment link and email it to the customer.
    Generate {
        #[arg(long)]
        order: u64,
        #[arg(long = "type", default_value = "full")]
        payment_type: PaymentType,
        /// Overrides the amount derived from the order.
        #[arg(long)]
        amount: Option<Decimal>,
        /// Defaults to the configured link expiry.
        #[arg(long)]
        expiry_days: Option<i64>,
        #[arg(long, default_value = "admin")]
        issuer: String,
    },
    /// List payment links of an order, newest first.
    Links {
        #[arg(long)]
        order: u64,
    },
    /// Revoke an active payment link.
    Revoke { link_id: Uuid },
    /// Check whether a token may be used to pay.
    Validate {
        token: String,
        /// Record the access, as the payment page does.
        #[arg(long)]
        open: bool,
    },
    /// Record the gateway intent collecting a payment type.
    AttachIntent {
        #[arg(long)]
        order: u64,
        #[arg(long = "type")]
        payment_type: PaymentType,
        #[arg(long)]
        intent: String,
    },
    /// Apply a gateway event read from a JSON file ("-" for stdin).
    Webhook { input: PathBuf },
    /// Re-derive an order's payment state from the gateway.
    Reconcile {
        #[arg(long)]
        order: u64,
        /// JSON map of intent id to status, used instead of a live gateway.
        #[arg(long)]
        gateway_fixture: Option<PathBuf>,
    },
    /// Mark every overdue active link as expired.
    Sweep,
    /// Link counts per status.
    Stats,
    /// Export all payment links as CSV.
    Export,
}

fn open_stores(db_path: Option<&Path>) -> Result<(OrderStoreRef, PaymentLinkStoreRef)> {
    #[cfg(feature = "storage-rocksdb")]
    {
        if let Some(db_path) = db_path {
            let store = paylink::infrastructure::rocksdb::RocksDBStore::open(db_path).into_diagnostic()?;
            let orders: OrderStoreRef = Arc::new(store.clone());
            let links: PaymentLinkStoreRef = Arc::new(store);
            return Ok((orders, links));
        }
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    {
        if db_path.is_some() {
            warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
        }
    }

    let orders: OrderStoreRef = Arc::new(InMemoryOrderStore::new());
    let links: PaymentLinkStoreRef = Arc::new(InMemoryPaymentLinkStore::new());
    Ok((orders, links))
}

fn open_gateway(settings: &Settings, fixture: Option<&Path>) -> Result<PaymentGatewayRef> {
    if let Some(path) = fixture {
        return Ok(Arc::new(StaticGateway::from_file(path).into_diagnostic()?));
    }

    #[cfg(feature = "gateway-stripe")]
    {
        if let Some(key) = &settings.stripe_secret_key {
            let gateway = paylink::infrastructure::gateway::StripeGateway::new(
                key.clone(),
                settings.stripe_api_base.clone(),
            )
            .into_diagnostic()?;
            return Ok(Arc::new(gateway));
        }
    }

    if settings.stripe_secret_key.is_some() && cfg!(not(feature = "gateway-stripe")) {
        warn!("STRIPE_SECRET_KEY is set but the 'gateway-stripe' feature is not enabled");
    }
    warn!("no payment gateway configured; every intent lookup will fail");
    Ok(Arc::new(StaticGateway::new()))
}

/// Loads orders from a CSV file, skipping rows that fail. Returns
/// `(imported, skipped)`.
async fn load_orders(admin: &AdminConsole, path: &Path) -> Result<(usize, usize)> {
    let file = File::open(path).into_diagnostic()?;
    let now = Utc::now();
    let (mut imported, mut skipped) = (0, 0);
    for order in OrderReader::new(file).orders(now) {
        let outcome = match order {
            Ok(order) => admin.import_order(order).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => imported += 1,
            Err(PaymentError::DuplicateOrder(_)) => skipped += 1,
            Err(e) => {
                warn!(error = %e, "order row rejected");
                skipped += 1;
            }
        }
    }
    Ok((imported, skipped))
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    if path == Path::new("-") {
        io::stdin().read_to_end(&mut buf).into_diagnostic()?;
    } else {
        File::open(path)
            .into_diagnostic()?
            .read_to_end(&mut buf)
            .into_diagnostic()?;
    }
    Ok(buf)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings;
    telemetry::init_logging(&settings.log_level);

    let (orders, links) = open_stores(settings.db_path.as_deref())?;
    // Only reconciliation talks to the gateway.
    let gateway: PaymentGatewayRef = match &cli.command {
        Command::Reconcile { gateway_fixture, .. } => open_gateway(&settings, gateway_fixture.as_deref())?,
        _ => Arc::new(StaticGateway::new()),
    };
    let notifier: NotifierRef = Arc::new(LogNotifier);
    let admin = AdminConsole::new(orders, links, gateway, notifier, settings.frontend_url.clone());

    if let Some(path) = &cli.orders {
        load_orders(&admin, path).await?;
    }

    match cli.command {
        Command::ImportOrders { input } => {
            let (imported, skipped) = load_orders(&admin, &input).await?;
            println!("imported {} orders, skipped {}", imported, skipped);
        }
        Command::Deposit { order, percentage } => {
            let order = admin
                .ledger()
                .configure_deposit(OrderId(order), percentage)
                .await
                .into_diagnostic()?;
            println!(
                "order {}: deposit {} ({}%), balance {}",
                order.id, order.deposit_amount, percentage, order.remaining_amount
            );
        }
        Command::Generate {
            order,
            payment_type,
            amount,
            expiry_days,
            issuer,
        } => {
            let issued = admin
                .issue_link(
                    OrderId(order),
                    &issuer,
                    expiry_days.unwrap_or(settings.link_expiry_days),
                    payment_type,
                    amount,
                )
                .await
                .into_diagnostic()?;
            println!("link_id: {}", issued.link.id);
            println!("payment_type: {}", issued.link.payment_type);
            println!("amount: {}", issued.link.amount);
            println!("expires_at: {}", issued.link.expires_at.to_rfc3339());
            println!("url: {}", issued.url);
        }
        Command::Links { order } => {
            for (link, url) in admin.list_links(OrderId(order)).await.into_diagnostic()? {
                println!(
                    "{} {} {} {} {} {}",
                    link.id,
                    link.payment_type,
                    link.amount,
                    link.status,
                    link.expires_at.to_rfc3339(),
                    url
                );
            }
        }
        Command::Revoke { link_id } => {
            let revoked = admin.revoke_link(LinkId(link_id)).await.into_diagnostic()?;
            if revoked {
                println!("link {} revoked", link_id);
            } else {
                println!("link {} is no longer active; nothing to revoke", link_id);
            }
        }
        Command::Validate { token, open } => {
            let token = LinkToken::from(token);
            if open {
                let view = admin.validator().open_link(&token).await.into_diagnostic()?;
                println!(
                    "order {} ({}): pay {} {}",
                    view.order.order_number, view.order.customer.name, view.link.amount, view.link.payment_type
                );
            } else {
                let verdict = admin.validator().validate_link(&token).await.into_diagnostic()?;
                println!("{}", verdict.message());
                if !verdict.is_valid() {
                    return Err(miette!("payment link rejected"));
                }
            }
        }
        Command::AttachIntent {
            order,
            payment_type,
            intent,
        } => {
            admin
                .ledger()
                .attach_intent(OrderId(order), payment_type, &intent)
                .await
                .into_diagnostic()?;
            println!("order {}: {} intent {}", order, payment_type, intent);
        }
        Command::Webhook { input } => {
            let payload = read_input(&input)?;
            match admin.webhooks().handle_json(&payload).await.into_diagnostic()? {
                WebhookOutcome::Applied(result) => {
                    for change in &result.changes {
                        println!("{}", change);
                    }
                    println!("payment_status: {}", result.order.payment_status);
                }
                WebhookOutcome::Ignored(reason) => println!("ignored: {}", reason),
            }
        }
        Command::Reconcile { order, .. } => {
            let report = admin.reconcile(OrderId(order)).await.into_diagnostic()?;
            for change in &report.changes {
                println!("{}", change);
            }
            for pending in &report.pending {
                println!(
                    "pending: {} {} {}",
                    pending.payment_type, pending.intent_id, pending.status
                );
            }
            for failure in &report.errors {
                println!(
                    "error: {} {} {}",
                    failure.payment_type, failure.intent_id, failure.message
                );
            }
            println!("payment_status: {}", report.order.payment_status);
            println!("status: {}", report.order.status);
        }
        Command::Sweep => {
            let count = admin.sweep_expired().await.into_diagnostic()?;
            println!("expired {} links", count);
        }
        Command::Stats => {
            let stats = admin.statistics().await.into_diagnostic()?;
            println!(
                "total={} active={} used={} expired={} revoked={} accessed={}",
                stats.total, stats.active, stats.used, stats.expired, stats.revoked, stats.accessed
            );
        }
        Command::Export => {
            let links = admin.all_links().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = LinkWriter::new(stdout.lock());
            writer
                .write_links(&links, &settings.frontend_url)
                .into_diagnostic()?;
        }
    }

    Ok(())
}
