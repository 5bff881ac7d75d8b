//! Order settlement state machine.
//!
//! `plan` is a pure function from an order snapshot and a gateway-confirmed
//! outcome to the next snapshot. It never touches storage; the ledger service
//! persists the result with a compare-and-swap on `Order::version`.

use super::order::{InstallmentStatus, Order, OrderStatus, PaymentStatus, PaymentType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal result of one gateway intent, as far as the ledger is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded => f.write_str("succeeded"),
            Outcome::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    PaymentStatus,
    DepositPaymentStatus,
    BalancePaymentStatus,
    Status,
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderField::PaymentStatus => "payment_status",
            OrderField::DepositPaymentStatus => "deposit_payment_status",
            OrderField::BalancePaymentStatus => "balance_payment_status",
            OrderField::Status => "status",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: OrderField,
    pub from: String,
    pub to: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.from, self.to)
    }
}

/// A transition that changes at least one status field.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub payment_type: PaymentType,
    pub outcome: Outcome,
    pub changes: Vec<FieldChange>,
    /// The field tracking `payment_type` moved to `paid` in this transition
    /// on an order that was not already fully paid.
    pub newly_paid: bool,
    /// Next snapshot. Carries the version it was planned from.
    pub order: Order,
}

/// Plans the transition for `(payment_type, outcome)` on `order`.
///
/// Returns `None` when the outcome changes nothing: the type is already
/// `paid`, or the fields already hold the resulting values.
pub fn plan(
    order: &Order,
    payment_type: PaymentType,
    outcome: Outcome,
    now: DateTime<Utc>,
) -> Option<Settlement> {
    if order.is_settled(payment_type) {
        return None;
    }

    let mut next = order.clone();
    match (payment_type, outcome) {
        (PaymentType::Full, Outcome::Succeeded) => {
            next.payment_status = PaymentStatus::Paid;
            confirm(&mut next, now);
        }
        (PaymentType::Full, Outcome::Failed) => {
            // A confirmed deposit keeps the order partially paid.
            if next.payment_status != PaymentStatus::PartiallyPaid {
                next.payment_status = PaymentStatus::Failed;
            }
        }
        (PaymentType::Deposit, Outcome::Succeeded) => {
            next.deposit_payment_status = InstallmentStatus::Paid;
            next.payment_status = installment_aggregate(&next);
            confirm(&mut next, now);
        }
        (PaymentType::Deposit, Outcome::Failed) => {
            next.deposit_payment_status = InstallmentStatus::Failed;
        }
        (PaymentType::Balance, Outcome::Succeeded) => {
            next.balance_payment_status = InstallmentStatus::Paid;
            next.payment_status = installment_aggregate(&next);
        }
        (PaymentType::Balance, Outcome::Failed) => {
            next.balance_payment_status = InstallmentStatus::Failed;
        }
    }

    let changes = diff(order, &next);
    if changes.is_empty() {
        return None;
    }
    next.updated_at = now;

    Some(Settlement {
        payment_type,
        outcome,
        changes,
        newly_paid: next.is_settled(payment_type) && order.payment_status != PaymentStatus::Paid,
        order: next,
    })
}

/// Aggregate status after an installment succeeded. Never demotes `paid`.
fn installment_aggregate(order: &Order) -> PaymentStatus {
    let deposit = order.deposit_payment_status == InstallmentStatus::Paid;
    let balance = order.balance_payment_status == InstallmentStatus::Paid;
    if order.payment_status == PaymentStatus::Paid || (deposit && balance) {
        PaymentStatus::Paid
    } else {
        PaymentStatus::PartiallyPaid
    }
}

fn confirm(order: &mut Order, now: DateTime<Utc>) {
    if order.status == OrderStatus::Pending {
        order.status = OrderStatus::Confirmed;
    }
    if order.status == OrderStatus::Confirmed && order.confirmed_at.is_none() {
        order.confirmed_at = Some(now);
    }
}

fn diff(before: &Order, after: &Order) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut push = |field, from: &str, to: &str| {
        if from != to {
            changes.push(FieldChange {
                field,
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    };
    push(
        OrderField::PaymentStatus,
        before.payment_status.as_str(),
        after.payment_status.as_str(),
    );
    push(
        OrderField::DepositPaymentStatus,
        before.deposit_payment_status.as_str(),
        after.deposit_payment_status.as_str(),
    );
    push(
        OrderField::BalancePaymentStatus,
        before.balance_payment_status.as_str(),
        after.balance_payment_status.as_str(),
    );
    push(OrderField::Status, before.status.as_str(), after.status.as_str());
    changes
}
