//! Subledger reconciliation.
//!
//! A subledger (cash box, bank account module) keeps its own running total
//! for an economic account that also exists in the general ledger. The GL
//! balance derived from posted lines is the source of truth; discrepancies
//! are reported so the subledger can be adjusted, never the other way round.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, is_negligible};
use uuid::Uuid;

use crate::error::LedgerError;

/// A subledger's own view of its balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubledgerBalance {
    /// Subledger record id (bank account, cash box, ...).
    pub subledger_id: Uuid,
    /// Subledger code.
    pub code: String,
    /// Subledger name.
    pub name: String,
    /// Balance tracked by the subledger.
    pub balance: Decimal,
    /// Linked general ledger account.
    pub gl_account_id: AccountId,
}

/// The GL-derived balance for a linked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlBalance {
    /// Account id.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Balance recomputed from posted lines.
    pub balance: Decimal,
}

/// One subledger that disagrees with the GL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    /// Subledger record id.
    pub subledger_id: Uuid,
    /// Subledger code.
    pub subledger_code: String,
    /// Subledger name.
    pub subledger_name: String,
    /// Subledger balance.
    pub subledger_balance: Decimal,
    /// GL account id.
    pub gl_account_id: AccountId,
    /// GL account code.
    pub gl_account_code: String,
    /// GL account name.
    pub gl_account_name: String,
    /// GL balance.
    pub gl_balance: Decimal,
    /// Subledger minus GL.
    pub difference: Decimal,
    /// When the mismatch was observed.
    pub detected_at: DateTime<Utc>,
}

/// Overall reconciliation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    /// No discrepancies.
    Ok,
    /// Some discrepancies, at most the alert threshold.
    Warning,
    /// More discrepancies than the alert threshold.
    Error,
}

impl ReconciliationStatus {
    /// Classifies a discrepancy count against the alert threshold.
    #[must_use]
    pub const fn from_count(discrepancies: usize, alert_threshold: usize) -> Self {
        if discrepancies == 0 {
            Self::Ok
        } else if discrepancies <= alert_threshold {
            Self::Warning
        } else {
            Self::Error
        }
    }
}

/// Aggregate figures for a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationMetrics {
    /// Subledgers compared.
    pub total_subledgers: usize,
    /// Subledgers in agreement with the GL.
    pub in_sync: usize,
    /// `in_sync / total * 100`, two decimals; 100 when nothing was compared.
    pub sync_percentage: Decimal,
    /// Sum of absolute differences.
    pub total_abs_difference: Decimal,
    /// Largest absolute difference.
    pub max_abs_difference: Decimal,
}

/// Result of [`reconcile_subledger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Verdict.
    pub status: ReconciliationStatus,
    /// Mismatches beyond tolerance.
    pub discrepancies: Vec<Discrepancy>,
    /// Aggregate figures.
    pub metrics: ReconciliationMetrics,
    /// Run time.
    pub checked_at: DateTime<Utc>,
}

/// Compares every subledger snapshot against the GL balance of its linked account.
///
/// `gl_balance` must return the balance recomputed from posted lines, not a
/// cached value.
pub fn reconcile_subledger<G>(
    snapshots: &[SubledgerBalance],
    gl_balance: G,
    alert_threshold: usize,
    now: DateTime<Utc>,
) -> Result<ReconciliationReport, LedgerError>
where
    G: Fn(AccountId) -> Result<GlBalance, LedgerError>,
{
    let mut discrepancies = Vec::new();
    let mut total_abs_difference = Decimal::ZERO;
    let mut max_abs_difference = Decimal::ZERO;

    for snapshot in snapshots {
        let gl = gl_balance(snapshot.gl_account_id)?;
        let difference = snapshot.balance - gl.balance;
        if is_negligible(difference) {
            continue;
        }

        let abs = difference.abs();
        total_abs_difference += abs;
        max_abs_difference = max_abs_difference.max(abs);
        discrepancies.push(Discrepancy {
            subledger_id: snapshot.subledger_id,
            subledger_code: snapshot.code.clone(),
            subledger_name: snapshot.name.clone(),
            subledger_balance: snapshot.balance,
            gl_account_id: gl.account_id,
            gl_account_code: gl.code,
            gl_account_name: gl.name,
            gl_balance: gl.balance,
            difference,
            detected_at: now,
        });
    }

    let total = snapshots.len();
    let in_sync = total - discrepancies.len();
    let sync_percentage = if total == 0 {
        Decimal::ONE_HUNDRED
    } else {
        (Decimal::from(in_sync) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2)
    };

    Ok(ReconciliationReport {
        status: ReconciliationStatus::from_count(discrepancies.len(), alert_threshold),
        metrics: ReconciliationMetrics {
            total_subledgers: total,
            in_sync,
            sync_percentage,
            total_abs_difference,
            max_abs_difference,
        },
        discrepancies,
        checked_at: now,
    })
}
