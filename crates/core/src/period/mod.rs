//! Period Manager.
//!
//! - `types` - Period keys, statuses, audit events, summaries
//! - `window` - Bounds for auto-creating periods
//! - `service` - OPEN / CLOSED / LOCKED state machine
//! - `closing` - Closing-entry generation and close preview

pub mod closing;
pub mod service;
pub mod types;
pub mod window;

#[cfg(test)]
mod closing_props;

pub use closing::{
    AccountClosure, ClosingCandidate, ClosingPlan, ClosingPreview, ClosingService, DraftWarning,
};
pub use service::PeriodService;
pub use types::{
    AccountingPeriod, PeriodAction, PeriodEvent, PeriodKey, PeriodStatus, PeriodStatusCounts,
    PeriodSummary,
};
pub use window::PostingWindow;
