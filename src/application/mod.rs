//! Application services orchestrating the payment link lifecycle.
//!
//! Every service is stateless and holds shared handles to the store and
//! adapter ports; all state lives behind those ports.

pub mod admin;
pub mod issuer;
pub mod ledger;
pub mod reconciler;
pub mod validator;
pub mod webhook;
