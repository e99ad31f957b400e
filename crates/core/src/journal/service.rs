//! Journal entry validation.
//!
//! Pure rules shared by the in-memory engine and the database repositories:
//! draft shape validation, posting preconditions, and balance deltas.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tally_shared::types::{AccountId, JournalLineId};

use super::types::{
    ApprovalOutcome, DraftInput, EntryStatus, EntryTotals, JournalEntry, JournalLine, LineInput,
    SourceType,
};
use crate::error::LedgerError;

/// A validated line with its position assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedLine {
    /// 1-based position.
    pub line_number: u32,
    /// Account posted to.
    pub account_id: AccountId,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Optional description.
    pub description: Option<String>,
}

impl PreparedLine {
    /// Gives the line a fresh id.
    #[must_use]
    pub fn into_line(self) -> JournalLine {
        JournalLine {
            id: JournalLineId::new(),
            line_number: self.line_number,
            account_id: self.account_id,
            debit: self.debit,
            credit: self.credit,
            description: self.description,
        }
    }
}

/// A validated draft ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDraft {
    /// Trimmed description.
    pub description: String,
    /// Lines with numbers assigned.
    pub lines: Vec<PreparedLine>,
    /// Totals over the lines.
    pub totals: EntryTotals,
}

/// Net movement on one account caused by a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountDelta {
    /// The account.
    pub account_id: AccountId,
    /// Summed debits.
    pub debit: Decimal,
    /// Summed credits.
    pub credit: Decimal,
}

/// Stateless journal entry rules.
pub struct JournalService;

impl JournalService {
    /// Validates a draft coming from an origin subsystem.
    ///
    /// Checks, in order: reserved source types, purchase approval,
    /// description, empty entry, line count, each line's shape, and each
    /// line's account via `account_validator`. Balance is *not* required here;
    /// drafts may be works in progress.
    pub fn prepare_draft<A>(
        input: &DraftInput,
        account_validator: A,
    ) -> Result<PreparedDraft, LedgerError>
    where
        A: Fn(AccountId) -> Result<(), LedgerError>,
    {
        if input.source_type.is_reserved() {
            return Err(LedgerError::ReservedSourceType(input.source_type));
        }
        if input.source_type == SourceType::Purchase
            && input.approval != Some(ApprovalOutcome::Approved)
        {
            return Err(LedgerError::PurchaseNotApproved);
        }
        Self::prepare_lines(&input.description, &input.lines, account_validator)
    }

    /// Shape validation shared by drafts and engine-generated entries.
    pub fn prepare_lines<A>(
        description: &str,
        lines: &[LineInput],
        account_validator: A,
    ) -> Result<PreparedDraft, LedgerError>
    where
        A: Fn(AccountId) -> Result<(), LedgerError>,
    {
        let description = description.trim();
        if description.is_empty() {
            return Err(LedgerError::DescriptionRequired);
        }

        if lines
            .iter()
            .all(|l| l.debit.is_zero() && l.credit.is_zero())
        {
            return Err(LedgerError::EmptyEntry);
        }
        if lines.len() < 2 {
            return Err(LedgerError::InsufficientLines { count: lines.len() });
        }

        let mut prepared = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            let line_number = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            Self::validate_line_shape(line, line_number)?;
            account_validator(line.account_id)?;
            prepared.push(PreparedLine {
                line_number,
                account_id: line.account_id,
                debit: line.debit,
                credit: line.credit,
                description: line
                    .description
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            });
        }

        let totals = EntryTotals::from_amounts(prepared.iter().map(|l| (l.debit, l.credit)));
        Ok(PreparedDraft {
            description: description.to_string(),
            lines: prepared,
            totals,
        })
    }

    fn validate_line_shape(line: &LineInput, line_number: u32) -> Result<(), LedgerError> {
        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount { line_number });
        }
        match (line.debit.is_zero(), line.credit.is_zero()) {
            (false, false) => Err(LedgerError::LineHasBothSides { line_number }),
            (true, true) => Err(LedgerError::LineHasNoAmount { line_number }),
            _ => Ok(()),
        }
    }

    /// Checks that an entry may move DRAFT → POSTED.
    ///
    /// Balance is recomputed from the lines rather than trusting the cache.
    pub fn check_postable(entry: &JournalEntry) -> Result<EntryTotals, LedgerError> {
        if entry.status != EntryStatus::Draft {
            return Err(LedgerError::InvalidStatusTransition {
                entity: "journal entry",
                from: entry.status.as_str(),
                to: EntryStatus::Posted.as_str(),
            });
        }
        Self::require_balanced(entry.line_totals())
    }

    /// Fails with `UnbalancedEntry` unless debits equal credits within tolerance.
    pub fn require_balanced(totals: EntryTotals) -> Result<EntryTotals, LedgerError> {
        if totals.is_balanced {
            Ok(totals)
        } else {
            Err(LedgerError::UnbalancedEntry {
                debit: totals.total_debit,
                credit: totals.total_credit,
            })
        }
    }

    /// Validate that an entry can be edited.
    pub fn validate_can_modify(status: EntryStatus) -> Result<(), LedgerError> {
        if status.is_editable() {
            Ok(())
        } else {
            Err(LedgerError::InvalidStatusTransition {
                entity: "journal entry",
                from: status.as_str(),
                to: EntryStatus::Draft.as_str(),
            })
        }
    }

    /// Only draft entries can be deleted.
    pub fn validate_can_delete(status: EntryStatus) -> Result<(), LedgerError> {
        if status.is_editable() {
            Ok(())
        } else {
            Err(LedgerError::InvalidStatusTransition {
                entity: "journal entry",
                from: status.as_str(),
                to: "DELETED",
            })
        }
    }

    /// Only posted entries can be reversed.
    pub fn validate_can_reverse(status: EntryStatus) -> Result<(), LedgerError> {
        if status == EntryStatus::Posted {
            Ok(())
        } else {
            Err(LedgerError::InvalidStatusTransition {
                entity: "journal entry",
                from: status.as_str(),
                to: EntryStatus::Reversed.as_str(),
            })
        }
    }

    /// Aggregates `(account, debit, credit)` triples into one delta per
    /// distinct account, ordered by account id.
    ///
    /// The stable order doubles as the row-lock order in the database.
    pub fn balance_deltas(
        lines: impl IntoIterator<Item = (AccountId, Decimal, Decimal)>,
    ) -> Vec<AccountDelta> {
        let mut by_account: BTreeMap<AccountId, (Decimal, Decimal)> = BTreeMap::new();
        for (account_id, debit, credit) in lines {
            let slot = by_account.entry(account_id).or_default();
            slot.0 += debit;
            slot.1 += credit;
        }
        by_account
            .into_iter()
            .map(|(account_id, (debit, credit))| AccountDelta {
                account_id,
                debit,
                credit,
            })
            .collect()
    }
}
