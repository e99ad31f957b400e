//! Period state machine.
//!
//! ```text
//!            close             lock
//!   OPEN ────────────▶ CLOSED ───────▶ LOCKED
//!     ▲                  │
//!     └──────reopen──────┘
//! ```

use chrono::{DateTime, Utc};

use super::types::{AccountingPeriod, PeriodAction, PeriodEvent, PeriodKey, PeriodStatus};
use crate::auth::{Action, Actor};
use crate::error::LedgerError;

/// Stateless period lifecycle rules.
pub struct PeriodService;

impl PeriodService {
    /// Fails unless a period in `status` accepts ordinary postings.
    pub const fn require_open(key: PeriodKey, status: PeriodStatus) -> Result<(), LedgerError> {
        match status {
            PeriodStatus::Open => Ok(()),
            PeriodStatus::Closed => Err(LedgerError::PeriodClosed { period: key }),
            PeriodStatus::Locked => Err(LedgerError::PeriodLocked { period: key }),
        }
    }

    /// Returns true if `from → to` is an edge of the state machine.
    #[must_use]
    pub const fn can_transition(from: PeriodStatus, to: PeriodStatus) -> bool {
        matches!(
            (from, to),
            (PeriodStatus::Open, PeriodStatus::Closed)
                | (PeriodStatus::Closed, PeriodStatus::Open | PeriodStatus::Locked)
        )
    }

    /// Target status of an action.
    #[must_use]
    pub const fn target_status(action: PeriodAction) -> PeriodStatus {
        match action {
            PeriodAction::Close => PeriodStatus::Closed,
            PeriodAction::Reopen => PeriodStatus::Open,
            PeriodAction::Lock => PeriodStatus::Locked,
        }
    }

    /// Checks a close request and returns the trimmed reason.
    pub fn validate_close(
        actor: &Actor,
        period: &AccountingPeriod,
        reason: &str,
    ) -> Result<String, LedgerError> {
        actor.authorize(Action::ClosePeriod)?;
        let reason = Self::require_reason(reason, Action::ClosePeriod)?;
        Self::check_transition(period, PeriodAction::Close)?;
        Ok(reason)
    }

    /// Checks a reopen request and returns the trimmed reason.
    ///
    /// A locked period cannot be reopened through this path.
    pub fn validate_reopen(
        actor: &Actor,
        period: &AccountingPeriod,
        reason: &str,
    ) -> Result<String, LedgerError> {
        actor.authorize(Action::ReopenPeriod)?;
        let reason = Self::require_reason(reason, Action::ReopenPeriod)?;
        Self::check_transition(period, PeriodAction::Reopen)?;
        Ok(reason)
    }

    /// Checks a lock request.
    pub fn validate_lock(actor: &Actor, period: &AccountingPeriod) -> Result<(), LedgerError> {
        actor.authorize(Action::LockPeriod)?;
        Self::check_transition(period, PeriodAction::Lock)
    }

    fn require_reason(reason: &str, action: Action) -> Result<String, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            Err(LedgerError::ReasonRequired { action })
        } else {
            Ok(reason.to_string())
        }
    }

    fn check_transition(period: &AccountingPeriod, action: PeriodAction) -> Result<(), LedgerError> {
        let target = Self::target_status(action);
        if Self::can_transition(period.status, target) {
            return Ok(());
        }
        if period.status == PeriodStatus::Locked {
            return Err(LedgerError::PeriodLocked { period: period.key });
        }
        Err(LedgerError::InvalidStatusTransition {
            entity: "accounting period",
            from: period.status.as_str(),
            to: target.as_str(),
        })
    }

    /// Applies a validated transition and appends the audit event.
    ///
    /// Callers validate first; this only mutates.
    pub fn apply(
        period: &mut AccountingPeriod,
        action: PeriodAction,
        actor: &Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) {
        period.status = Self::target_status(action);
        match action {
            PeriodAction::Close => {
                period.closed_by = Some(actor.user_id);
                period.closed_at = Some(now);
            }
            PeriodAction::Reopen => {}
            PeriodAction::Lock => {
                period.locked_by = Some(actor.user_id);
                period.locked_at = Some(now);
            }
        }
        period.events.push(PeriodEvent {
            action,
            actor: actor.user_id,
            reason,
            at: now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRole;
    use rstest::rstest;
    use tally_shared::types::UserId;

    fn period(status: PeriodStatus) -> AccountingPeriod {
        let mut p = AccountingPeriod::open(PeriodKey::new(2026, 3).unwrap(), Utc::now());
        p.status = status;
        p
    }

    fn accountant() -> Actor {
        Actor::new(UserId::new(), UserRole::Accountant)
    }

    fn admin() -> Actor {
        Actor::new(UserId::new(), UserRole::Admin)
    }

    #[rstest]
    #[case(PeriodStatus::Open, PeriodStatus::Closed, true)]
    #[case(PeriodStatus::Closed, PeriodStatus::Open, true)]
    #[case(PeriodStatus::Closed, PeriodStatus::Locked, true)]
    #[case(PeriodStatus::Open, PeriodStatus::Locked, false)]
    #[case(PeriodStatus::Locked, PeriodStatus::Open, false)]
    #[case(PeriodStatus::Locked, PeriodStatus::Closed, false)]
    #[case(PeriodStatus::Open, PeriodStatus::Open, false)]
    fn test_transitions(#[case] from: PeriodStatus, #[case] to: PeriodStatus, #[case] ok: bool) {
        assert_eq!(PeriodService::can_transition(from, to), ok);
    }

    #[test]
    fn test_require_open() {
        let key = PeriodKey::new(2026, 3).unwrap();
        assert!(PeriodService::require_open(key, PeriodStatus::Open).is_ok());
        assert_eq!(
            PeriodService::require_open(key, PeriodStatus::Closed),
            Err(LedgerError::PeriodClosed { period: key })
        );
        assert_eq!(
            PeriodService::require_open(key, PeriodStatus::Locked),
            Err(LedgerError::PeriodLocked { period: key })
        );
    }

    #[test]
    fn test_close_requires_reason_and_role() {
        let open = period(PeriodStatus::Open);
        assert_eq!(
            PeriodService::validate_close(&accountant(), &open, " "),
            Err(LedgerError::ReasonRequired {
                action: Action::ClosePeriod
            })
        );

        let bookkeeper = Actor::new(UserId::new(), UserRole::Bookkeeper);
        assert!(matches!(
            PeriodService::validate_close(&bookkeeper, &open, "Month end"),
            Err(LedgerError::NotAuthorized { .. })
        ));

        assert_eq!(
            PeriodService::validate_close(&accountant(), &open, " Month end ").unwrap(),
            "Month end"
        );
    }

    #[test]
    fn test_close_twice_rejected() {
        let closed = period(PeriodStatus::Closed);
        assert!(matches!(
            PeriodService::validate_close(&accountant(), &closed, "again"),
            Err(LedgerError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_reopen_rules() {
        let closed = period(PeriodStatus::Closed);
        assert_eq!(
            PeriodService::validate_reopen(&accountant(), &closed, ""),
            Err(LedgerError::ReasonRequired {
                action: Action::ReopenPeriod
            })
        );
        assert!(PeriodService::validate_reopen(&accountant(), &closed, "Late invoice").is_ok());

        let locked = period(PeriodStatus::Locked);
        assert!(matches!(
            PeriodService::validate_reopen(&admin(), &locked, "Please"),
            Err(LedgerError::PeriodLocked { .. })
        ));

        let open = period(PeriodStatus::Open);
        assert!(matches!(
            PeriodService::validate_reopen(&accountant(), &open, "Already open"),
            Err(LedgerError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_lock_rules() {
        let closed = period(PeriodStatus::Closed);
        assert!(matches!(
            PeriodService::validate_lock(&accountant(), &closed),
            Err(LedgerError::NotAuthorized { .. })
        ));
        assert!(PeriodService::validate_lock(&admin(), &closed).is_ok());
        assert!(PeriodService::validate_lock(&admin(), &period(PeriodStatus::Open)).is_err());
        assert!(matches!(
            PeriodService::validate_lock(&admin(), &period(PeriodStatus::Locked)),
            Err(LedgerError::PeriodLocked { .. })
        ));
    }

    #[test]
    fn test_apply_records_events() {
        let mut p = period(PeriodStatus::Open);
        let actor = accountant();
        let now = Utc::now();

        PeriodService::apply(&mut p, PeriodAction::Close, &actor, Some("Month end".into()), now);
        assert_eq!(p.status, PeriodStatus::Closed);
        assert_eq!(p.closed_by, Some(actor.user_id));

        PeriodService::apply(&mut p, PeriodAction::Reopen, &actor, Some("Late invoice".into()), now);
        assert_eq!(p.status, PeriodStatus::Open);

        assert_eq!(p.events.len(), 2);
        let reopens: Vec<_> = p.reopen_history().collect();
        assert_eq!(reopens.len(), 1);
        assert_eq!(reopens[0].reason.as_deref(), Some("Late invoice"));
    }
}
