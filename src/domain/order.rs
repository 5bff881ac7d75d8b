use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a strictly positive monetary amount.
///
/// Payment links snapshot what they collect as an `Amount`, so a link can
/// never be created for zero or a negative sum.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::InvalidAmount(value))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a payment collects: the whole order, or one of the two installments
/// of a deposit/balance split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Full,
    Deposit,
    Balance,
}

impl PaymentType {
    pub const ALL: [PaymentType; 3] = [PaymentType::Full, PaymentType::Deposit, PaymentType::Balance];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Full => "full",
            PaymentType::Deposit => "deposit",
            PaymentType::Balance => "balance",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(PaymentType::Full),
            "deposit" => Ok(PaymentType::Deposit),
            "balance" => Ok(PaymentType::Balance),
            other => Err(PaymentError::InvalidInput(format!(
                "unknown payment type '{}'",
                other
            ))),
        }
    }
}

/// Aggregate payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    PartiallyPaid,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single installment (deposit or balance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fulfillment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    InProduction,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InProduction => "in_production",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Snapshot of an order's settlement-relevant fields.
///
/// `version` is owned by the store: it is bumped on every successful
/// compare-and-swap and must not be edited by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer: Customer,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub deposit_percentage: Option<Decimal>,
    pub deposit_amount: Decimal,
    pub remaining_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub deposit_payment_status: InstallmentStatus,
    pub balance_payment_status: InstallmentStatus,
    pub status: OrderStatus,
    pub full_intent_id: Option<String>,
    pub deposit_intent_id: Option<String>,
    pub balance_intent_id: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Order {
    pub fn new(
        id: OrderId,
        order_number: impl Into<String>,
        total_amount: Decimal,
        customer: Customer,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_number: order_number.into(),
            customer,
            items: Vec::new(),
            total_amount,
            deposit_percentage: None,
            deposit_amount: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
            payment_status: PaymentStatus::Pending,
            deposit_payment_status: InstallmentStatus::Pending,
            balance_payment_status: InstallmentStatus::Pending,
            status: OrderStatus::Pending,
            full_intent_id: None,
            deposit_intent_id: None,
            balance_intent_id: None,
            confirmed_at: None,
            updated_at: now,
            version: 0,
        }
    }

    pub fn with_items(mut self, items: Vec<OrderItem>) -> Self {
        self.items = items;
        self
    }

    /// Amount owed for a payment type, as derived from the current snapshot.
    ///
    /// Deposit and balance are zero until a split is configured.
    pub fn amount_due(&self, payment_type: PaymentType) -> Decimal {
        match payment_type {
            PaymentType::Full => self.total_amount,
            PaymentType::Deposit => self.deposit_amount,
            PaymentType::Balance => self.remaining_amount,
        }
    }

    /// Whether the status field tracking `payment_type` is already `paid`.
    pub fn is_settled(&self, payment_type: PaymentType) -> bool {
        match payment_type {
            PaymentType::Full => self.payment_status == PaymentStatus::Paid,
            PaymentType::Deposit => self.deposit_payment_status == InstallmentStatus::Paid,
            PaymentType::Balance => self.balance_payment_status == InstallmentStatus::Paid,
        }
    }

    pub fn intent_id(&self, payment_type: PaymentType) -> Option<&str> {
        match payment_type {
            PaymentType::Full => self.full_intent_id.as_deref(),
            PaymentType::Deposit => self.deposit_intent_id.as_deref(),
            PaymentType::Balance => self.balance_intent_id.as_deref(),
        }
    }

    pub fn set_intent_id(&mut self, payment_type: PaymentType, intent_id: String) {
        let slot = match payment_type {
            PaymentType::Full => &mut self.full_intent_id,
            PaymentType::Deposit => &mut self.deposit_intent_id,
            PaymentType::Balance => &mut self.balance_intent_id,
        };
        *slot = Some(intent_id);
    }

    /// Gateway intents attached to this order, in full/deposit/balance order.
    pub fn intents(&self) -> impl Iterator<Item = (PaymentType, &str)> {
        PaymentType::ALL
            .into_iter()
            .filter_map(|t| self.intent_id(t).map(|id| (t, id)))
    }

    /// Applies a deposit/balance split to the order.
    pub fn configure_deposit(&mut self, percentage: Decimal) -> Result<()> {
        if self.is_settled(PaymentType::Deposit) {
            return Err(PaymentError::AlreadyPaid(PaymentType::Deposit));
        }
        let (deposit, remaining) = split_deposit(self.total_amount, percentage)?;
        self.deposit_percentage = Some(percentage);
        self.deposit_amount = deposit;
        self.remaining_amount = remaining;
        Ok(())
    }
}

/// Splits `total` into `(deposit, remaining)` for a percentage in `(0, 100)`.
///
/// The deposit is rounded half-up to cents and the balance takes the
/// remainder, so the two always sum to `total`.
pub fn split_deposit(total: Decimal, percentage: Decimal) -> Result<(Decimal, Decimal)> {
    if percentage <= Decimal::ZERO || percentage >= Decimal::ONE_HUNDRED {
        return Err(PaymentError::InvalidDepositPercentage(percentage));
    }
    let deposit = (total * percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Ok((deposit, total - deposit))
}
