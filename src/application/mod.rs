//! Application layer orchestrating the domain rules over the store.
//!
//! Everything hangs off [`engine::LedgerEngine`]; the sibling modules add
//! operations to it by concern.

pub mod activities;
mod authz;
pub mod engine;
pub mod payments;
pub mod standings;
