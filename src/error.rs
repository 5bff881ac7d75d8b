use crate::domain::order::{OrderId, PaymentType};
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("order {0} already exists")]
    DuplicateOrder(String),
    #[error("amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),
    #[error("{0} payment is already settled")]
    AlreadyPaid(PaymentType),
    #[error("payment link not found")]
    LinkNotFound,
    #[error("payment link has expired")]
    LinkExpired,
    #[error("payment link has already been used")]
    LinkUsed,
    #[error("payment link has been revoked")]
    LinkRevoked,
    #[error("order has already been paid")]
    OrderAlreadySettled,
    #[error("deposit percentage must be strictly between 0 and 100, got {0}")]
    InvalidDepositPercentage(Decimal),
    #[error("link expiry must be at least one day, got {0}")]
    InvalidExpiry(i64),
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for PaymentError {
    fn from(e: std::io::Error) -> Self {
        PaymentError::PersistenceFailure(e.to_string())
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(e: serde_json::Error) -> Self {
        PaymentError::PersistenceFailure(format!("serialization error: {}", e))
    }
}

impl From<csv::Error> for PaymentError {
    fn from(e: csv::Error) -> Self {
        PaymentError::InvalidInput(e.to_string())
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(e: rocksdb::Error) -> Self {
        PaymentError::PersistenceFailure(e.to_string())
    }
}
