use super::order::{Amount, Order, OrderId, PaymentStatus, PaymentType};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub Uuid);

impl LinkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bearer token embedded in the customer-facing payment URL.
///
/// 128 bits drawn from the operating system CSPRNG, rendered as 32 lowercase
/// hex characters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkToken(String);

impl LinkToken {
    pub const LEN: usize = 32;

    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(format!("{:032x}", u128::from_be_bytes(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LinkToken {
    fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }
}

impl From<String> for LinkToken {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for LinkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Tokens are bearer credentials; keep them out of debug logs.
impl fmt::Debug for LinkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "LinkToken({}…)", prefix)
    }
}

/// Link lifecycle. `Active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Active,
    Used,
    Expired,
    Revoked,
}

impl LinkStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LinkStatus::Active)
    }

    /// Links only ever leave `Active`, and only for a terminal state.
    pub fn can_transition_to(&self, next: LinkStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }

    /// Rejects an edge that `can_transition_to` does not allow.
    pub fn check_transition(&self, next: LinkStatus) -> Result<(), PaymentError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(PaymentError::InvalidInput(format!(
                "illegal link transition {} -> {}",
                self, next
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Active => "active",
            LinkStatus::Used => "used",
            LinkStatus::Expired => "expired",
            LinkStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record of an issued payment link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub id: LinkId,
    pub order_id: OrderId,
    pub token: LinkToken,
    pub payment_type: PaymentType,
    /// Snapshot taken at issuance; later edits to the order do not change it.
    pub amount: Amount,
    pub status: LinkStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentLink {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at || self.status == LinkStatus::Expired
    }

    /// Customer-facing URL for this link.
    pub fn url(&self, frontend_base: &str) -> String {
        payment_url(frontend_base, &self.token)
    }
}

pub fn payment_url(frontend_base: &str, token: &LinkToken) -> String {
    format!("{}/paiement/{}", frontend_base.trim_end_matches('/'), token)
}

/// Outcome of validating a token for payment.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkVerdict {
    Valid(PaymentLink),
    NotFound,
    Expired(PaymentLink),
    AlreadyUsed(PaymentLink),
    Revoked(PaymentLink),
    OrderAlreadySettled(PaymentLink),
}

impl LinkVerdict {
    /// Decides whether `link` may be used to pay `order` at `now`.
    ///
    /// Expiry is evaluated against `expires_at` first, whatever the stored
    /// status says, since the sweep may not have run yet.
    pub fn evaluate(link: PaymentLink, order: Option<&Order>, now: DateTime<Utc>) -> Self {
        if link.is_expired_at(now) {
            return LinkVerdict::Expired(link);
        }
        match link.status {
            LinkStatus::Used => return LinkVerdict::AlreadyUsed(link),
            LinkStatus::Revoked => return LinkVerdict::Revoked(link),
            LinkStatus::Active | LinkStatus::Expired => {}
        }
        if order.is_some_and(|o| o.payment_status == PaymentStatus::Paid) {
            return LinkVerdict::OrderAlreadySettled(link);
        }
        LinkVerdict::Valid(link)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, LinkVerdict::Valid(_))
    }

    pub fn link(&self) -> Option<&PaymentLink> {
        match self {
            LinkVerdict::Valid(l)
            | LinkVerdict::Expired(l)
            | LinkVerdict::AlreadyUsed(l)
            | LinkVerdict::Revoked(l)
            | LinkVerdict::OrderAlreadySettled(l) => Some(l),
            LinkVerdict::NotFound => None,
        }
    }

    /// Message shown on the payment page.
    pub fn message(&self) -> &'static str {
        match self {
            LinkVerdict::Valid(_) => "This payment link is valid.",
            LinkVerdict::NotFound => "This payment link is invalid or does not exist.",
            LinkVerdict::Expired(_) => "This payment link has expired.",
            LinkVerdict::AlreadyUsed(_) => "This payment link has already been used.",
            LinkVerdict::Revoked(_) => "This payment link has been revoked.",
            LinkVerdict::OrderAlreadySettled(_) => "This order has already been paid.",
        }
    }

    pub fn into_result(self) -> Result<PaymentLink, PaymentError> {
        match self {
            LinkVerdict::Valid(link) => Ok(link),
            LinkVerdict::NotFound => Err(PaymentError::LinkNotFound),
            LinkVerdict::Expired(_) => Err(PaymentError::LinkExpired),
            LinkVerdict::AlreadyUsed(_) => Err(PaymentError::LinkUsed),
            LinkVerdict::Revoked(_) => Err(PaymentError::LinkRevoked),
            LinkVerdict::OrderAlreadySettled(_) => Err(PaymentError::OrderAlreadySettled),
        }
    }
}

/// Counts of links per status, plus how many were ever opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStatistics {
    pub total: usize,
    pub active: usize,
    pub used: usize,
    pub expired: usize,
    pub revoked: usize,
    pub accessed: usize,
}

impl LinkStatistics {
    pub fn tally<'a>(links: impl IntoIterator<Item = &'a PaymentLink>) -> Self {
        links.into_iter().fold(Self::default(), |mut s, link| {
            s.total += 1;
            match link.status {
                LinkStatus::Active => s.active += 1,
                LinkStatus::Used => s.used += 1,
                LinkStatus::Expired => s.expired += 1,
                LinkStatus::Revoked => s.revoked += 1,
            }
            if link.accessed_at.is_some() {
                s.accessed += 1;
            }
            s
        })
    }
}
