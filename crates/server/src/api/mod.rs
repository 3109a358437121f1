//! HTTP read layer over the ledger and the scheduler.
//!
//! Each sub-module owns one endpoint group. Every JSON body carries a
//! `success` flag.

mod health;
mod leads;
mod poller;

pub use health::{config_summary, health, lead_stats, stats, LeadStats};
pub use leads::list_leads;
pub use poller::{poller_status, trigger_poll};
