//! Domain model: orders, payment links, the settlement state machine and the
//! ports the application layer talks through.

pub mod gateway;
pub mod order;
pub mod payment_link;
pub mod ports;
pub mod settlement;
