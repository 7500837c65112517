//! Ad analytics: the append-only impression/click log and campaign
//! performance reports.

pub mod event_log;
pub mod reports;

pub use event_log::EventLog;
pub use reports::{AdFilter, CampaignReport};
