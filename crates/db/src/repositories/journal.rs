//! Journal repository: drafts, posting, reversal.
//!
//! Every mutation runs in one SERIALIZABLE transaction, re-run on
//! serialization conflicts. The period row is locked before the entry and
//! account rows, so a posting either completes before a concurrent close
//! reads balances or sees the period CLOSED.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tally_core::auth::{Action, Actor};
use tally_core::journal::{
    DraftInput, EntryStatus, JournalEntry, JournalLine, JournalService, PreparedLine,
    ReversalService, SourceType,
};
use tally_core::ReversalOutcome;
use tally_core::period::PeriodKey;
use tally_shared::types::{JournalEntryId, PageRequest, PageResponse};
use tracing::info;
use uuid::Uuid;

use super::LedgerSettings;
use super::error::{RepoError, with_retry};
use super::ledger_tx::{
    apply_deltas, begin, ensure_period_row, entry_lines, insert_entry, insert_lines, load_chart,
    load_entry, lock_accounts, lock_entry, lock_period, mark_posted, mark_reversed,
    next_entry_number, posting_gate, require_postable,
};
use super::convert::entry_from_models;
use crate::entities::{journal_entries, journal_lines, sea_orm_active_enums};

/// Filter options for listing entries.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Only entries in this status.
    pub status: Option<EntryStatus>,
    /// Only entries from this source.
    pub source_type: Option<SourceType>,
    /// Entries dated on or after.
    pub from: Option<NaiveDate>,
    /// Entries dated on or before.
    pub to: Option<NaiveDate>,
}

/// Journal repository.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
}

impl JournalRepository {
    /// Creates a new journal repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: LedgerSettings) -> Self {
        Self { db, settings }
    }

    /// Gets an entry with its lines.
    pub async fn get_entry(&self, id: JournalEntryId) -> Result<JournalEntry, RepoError> {
        load_entry(&self.db, id).await
    }

    /// Lists entries, newest first.
    pub async fn list_entries(
        &self,
        filter: &EntryFilter,
        page: PageRequest,
    ) -> Result<PageResponse<JournalEntry>, RepoError> {
        let mut query = journal_entries::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(
                journal_entries::Column::Status.eq(sea_orm_active_enums::EntryStatus::from(status)),
            );
        }
        if let Some(source) = filter.source_type {
            query = query.filter(
                journal_entries::Column::SourceType
                    .eq(sea_orm_active_enums::EntrySource::from(source)),
            );
        }
        if let Some(from) = filter.from {
            query = query.filter(journal_entries::Column::EntryDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(journal_entries::Column::EntryDate.lte(to));
        }

        let paginator = query
            .order_by_desc(journal_entries::Column::EntryDate)
            .order_by_desc(journal_entries::Column::EntryNumber)
            .paginate(&self.db, page.limit());
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.page_index()).await?;

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let mut lines = entry_lines(&self.db, &ids).await?;
        let entries = models
            .into_iter()
            .map(|m| {
                let own = lines.remove(&m.id).unwrap_or_default();
                entry_from_models(m, own)
            })
            .collect();
        Ok(PageResponse::new(entries, page, total))
    }

    /// Creates a DRAFT entry.
    pub async fn create_draft(
        &self,
        actor: &Actor,
        input: &DraftInput,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, RepoError> {
        actor.authorize(Action::DraftEntry)?;
        let entry = with_retry(self.settings.max_retries, || async {
            let txn = begin(&self.db).await?;
            let chart = load_chart(&txn).await?;
            let prepared = JournalService::prepare_draft(input, |id| {
                chart.require_postable(id).map(|_| ())
            })?;

            let entry = JournalEntry {
                id: JournalEntryId::new(),
                entry_number: next_entry_number(&txn, input.entry_date.year()).await?,
                entry_date: input.entry_date,
                description: prepared.description,
                source_type: input.source_type,
                reference: input.reference.clone(),
                status: EntryStatus::Draft,
                totals: prepared.totals,
                reversal_of: None,
                reversed_by_entry: None,
                reversal_reason: None,
                created_by: actor.user_id,
                created_at: now,
                posted_by: None,
                posted_at: None,
                reversed_by: None,
                reversed_at: None,
                lines: into_lines(prepared.lines),
            };
            insert_entry(&txn, &entry).await?;
            txn.commit().await?;
            Ok(entry)
        })
        .await?;

        info!(
            entry_id = %entry.id,
            entry_number = %entry.entry_number,
            source_type = %entry.source_type,
            "Draft journal entry created"
        );
        Ok(entry)
    }

    /// Replaces the content of a DRAFT entry.
    pub async fn update_draft(
        &self,
        actor: &Actor,
        id: JournalEntryId,
        input: &DraftInput,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, RepoError> {
        actor.authorize(Action::DraftEntry)?;
        with_retry(self.settings.max_retries, || async {
            let txn = begin(&self.db).await?;
            let mut entry = lock_entry(&txn, id).await?;
            JournalService::validate_can_modify(entry.status)?;
            let chart = load_chart(&txn).await?;
            let prepared = JournalService::prepare_draft(input, |a| {
                chart.require_postable(a).map(|_| ())
            })?;

            entry.entry_date = input.entry_date;
            entry.description = prepared.description;
            entry.source_type = input.source_type;
            entry.reference.clone_from(&input.reference);
            entry.totals = prepared.totals;
            entry.lines = into_lines(prepared.lines);

            journal_entries::ActiveModel {
                id: Set(id.into_inner()),
                entry_date: Set(entry.entry_date),
                description: Set(entry.description.clone()),
                source_type: Set(entry.source_type.into()),
                reference: Set(entry.reference.clone()),
                total_debit: Set(entry.totals.total_debit),
                total_credit: Set(entry.totals.total_credit),
                is_balanced: Set(entry.totals.is_balanced),
                updated_at: Set(now.into()),
                ..Default::default()
            }
            .update(&txn)
            .await?;
            journal_lines::Entity::delete_many()
                .filter(journal_lines::Column::EntryId.eq(id.into_inner()))
                .exec(&txn)
                .await?;
            insert_lines(&txn, id, &entry.lines).await?;

            txn.commit().await?;
            Ok(entry)
        })
        .await
    }

    /// Posts a DRAFT entry and updates every touched balance.
    pub async fn post(
        &self,
        actor: &Actor,
        id: JournalEntryId,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, RepoError> {
        actor.authorize(Action::PostEntry)?;
        let window = self.settings.policy.window;
        let entry = with_retry(self.settings.max_retries, || async {
            let txn = begin(&self.db).await?;

            let draft = load_entry(&txn, id).await?;
            let period = lock_period(&txn, PeriodKey::from_date(draft.entry_date)).await?;
            let mut entry = lock_entry(&txn, id).await?;
            let mut locked = lock_accounts(&txn, entry.lines.iter().map(|l| l.account_id)).await?;

            let totals = JournalService::check_postable(&entry)?;
            for line in &entry.lines {
                require_postable(&locked, line.account_id)?;
            }
            let key = posting_gate(period.as_ref(), &window, entry.entry_date, now.date_naive())?;
            let deltas = JournalService::balance_deltas(
                entry.lines.iter().map(|l| (l.account_id, l.debit, l.credit)),
            );

            ensure_period_row(&txn, key, now).await?;
            apply_deltas(&txn, &mut locked, &deltas, now).await?;
            entry.status = EntryStatus::Posted;
            entry.totals = totals;
            entry.posted_by = Some(actor.user_id);
            entry.posted_at = Some(now);
            mark_posted(&txn, &entry, now).await?;

            txn.commit().await?;
            Ok(entry)
        })
        .await?;

        info!(
            entry_id = %entry.id,
            entry_number = %entry.entry_number,
            total = %entry.totals.total_debit,
            "Journal entry posted"
        );
        Ok(entry)
    }

    /// Reverses a POSTED entry with a compensating entry.
    pub async fn reverse(
        &self,
        actor: &Actor,
        id: JournalEntryId,
        reason: &str,
        entry_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<ReversalOutcome, RepoError> {
        actor.authorize(Action::ReverseEntry)?;
        let window = self.settings.policy.window;
        let today = now.date_naive();
        let outcome = with_retry(self.settings.max_retries, || async {
            let txn = begin(&self.db).await?;

            let snapshot = load_entry(&txn, id).await?;
            JournalService::validate_can_reverse(snapshot.status)?;
            let original_key = PeriodKey::from_date(snapshot.entry_date);
            let fallback_key = PeriodKey::from_date(entry_date.unwrap_or(today));

            // Both candidate periods are locked up front, in key order.
            let (first, second) = if fallback_key < original_key {
                (fallback_key, original_key)
            } else {
                (original_key, fallback_key)
            };
            let first_row = lock_period(&txn, first).await?;
            let second_row = if second == first {
                first_row.clone()
            } else {
                lock_period(&txn, second).await?
            };
            let row_for = |key: PeriodKey| if key == first { first_row.as_ref() } else { second_row.as_ref() };

            let mut original = lock_entry(&txn, id).await?;
            JournalService::validate_can_reverse(original.status)?;

            let original_open =
                posting_gate(row_for(original_key), &window, original.entry_date, today).is_ok();
            let date = ReversalService::reversal_date(
                original.entry_date,
                original_open,
                entry_date.unwrap_or(today),
            );
            let plan = ReversalService::plan(&original, reason, date)?;

            let mut locked = lock_accounts(&txn, plan.lines.iter().map(|l| l.account_id)).await?;
            let prepared = JournalService::prepare_lines(&plan.description, &plan.lines, |a| {
                require_postable(&locked, a)
            })?;
            JournalService::require_balanced(prepared.totals)?;
            let key = posting_gate(row_for(PeriodKey::from_date(date)), &window, date, today)?;

            ensure_period_row(&txn, key, now).await?;
            let deltas = JournalService::balance_deltas(
                prepared.lines.iter().map(|l| (l.account_id, l.debit, l.credit)),
            );
            apply_deltas(&txn, &mut locked, &deltas, now).await?;

            let reversal = JournalEntry {
                id: JournalEntryId::new(),
                entry_number: next_entry_number(&txn, date.year()).await?,
                entry_date: date,
                description: prepared.description,
                source_type: SourceType::Reversal,
                reference: Some(plan.reference),
                status: EntryStatus::Posted,
                totals: prepared.totals,
                reversal_of: Some(id),
                reversed_by_entry: None,
                reversal_reason: None,
                created_by: actor.user_id,
                created_at: now,
                posted_by: Some(actor.user_id),
                posted_at: Some(now),
                reversed_by: None,
                reversed_at: None,
                lines: into_lines(prepared.lines),
            };
            insert_entry(&txn, &reversal).await?;

            original.status = EntryStatus::Reversed;
            original.reversed_by_entry = Some(reversal.id);
            original.reversal_reason = Some(plan.reason);
            original.reversed_by = Some(actor.user_id);
            original.reversed_at = Some(now);
            mark_reversed(&txn, &original, now).await?;

            txn.commit().await?;
            Ok(ReversalOutcome { original, reversal })
        })
        .await?;

        info!(
            entry_id = %outcome.original.id,
            reversal_id = %outcome.reversal.id,
            reversal_date = %outcome.reversal.entry_date,
            "Journal entry reversed"
        );
        Ok(outcome)
    }

    /// Deletes a DRAFT entry and its lines.
    pub async fn delete(&self, actor: &Actor, id: JournalEntryId) -> Result<JournalEntry, RepoError> {
        actor.authorize(Action::DeleteEntry)?;
        let entry = with_retry(self.settings.max_retries, || async {
            let txn = begin(&self.db).await?;
            let entry = lock_entry(&txn, id).await?;
            JournalService::validate_can_delete(entry.status)?;
            journal_entries::Entity::delete_by_id(id.into_inner())
                .exec(&txn)
                .await?;
            txn.commit().await?;
            Ok(entry)
        })
        .await?;

        info!(entry_id = %id, entry_number = %entry.entry_number, "Draft journal entry deleted");
        Ok(entry)
    }
}

fn into_lines(lines: Vec<PreparedLine>) -> Vec<JournalLine> {
    lines.into_iter().map(PreparedLine::into_line).collect()
}
