//! Journal Entry Engine rules.
//!
//! - `types` - Entries, lines, statuses, source types, draft input
//! - `service` - Draft validation, posting preconditions, balance deltas
//! - `reversal` - Compensating entries for posted entries

pub mod reversal;
pub mod service;
pub mod types;

#[cfg(test)]
mod reversal_props;
#[cfg(test)]
mod service_props;

pub use reversal::{ReversalPlan, ReversalService};
pub use service::{AccountDelta, JournalService, PreparedDraft, PreparedLine};
pub use types::{
    ApprovalOutcome, DraftInput, EntryStatus, EntryTotals, JournalEntry, JournalLine, LineInput,
    SourceType, format_entry_number,
};
