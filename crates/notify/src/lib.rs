//! Event delivery for ledger updates.
//!
//! This crate provides:
//! - `LedgerEvent`, the payloads published after ingestion and day rollover
//! - `EventSink` trait for pluggable delivery channels
//! - Broadcast (in-process subscribers), webhook, and email sinks
//! - Dispatcher that fans one event out to every configured channel

pub mod broadcast;
pub mod dispatcher;
pub mod email;
pub mod traits;
pub mod webhook;

pub use broadcast::BroadcastSink;
pub use dispatcher::Dispatcher;
pub use traits::{EventSink, LedgerCleared, LedgerEvent, NewRecords, NotifyError};
