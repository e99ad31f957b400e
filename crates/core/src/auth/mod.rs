//! Ledger roles and authorization decisions.
//!
//! The caller identity comes from outside the engine (JWT claims in the
//! HTTP layer). Every privileged operation takes an [`Actor`] and checks it
//! against the minimum role for the [`Action`].

use serde::{Deserialize, Serialize};
use tally_shared::types::UserId;
use thiserror::Error;

use crate::error::LedgerError;

/// User roles for ledger access, from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full access.
    Owner,
    /// Full access, including locks and balance repair.
    Admin,
    /// Can close and reopen periods.
    Accountant,
    /// Can draft, post, reverse, and delete entries.
    Bookkeeper,
    /// Read-only access.
    Viewer,
}

impl UserRole {
    const fn rank(self) -> u8 {
        match self {
            Self::Owner => 4,
            Self::Admin => 3,
            Self::Accountant => 2,
            Self::Bookkeeper => 1,
            Self::Viewer => 0,
        }
    }

    /// Returns true if this role is at least `other`.
    #[must_use]
    pub const fn at_least(self, other: Self) -> bool {
        self.rank() >= other.rank()
    }

    /// Returns true if this role can draft and post journal entries.
    #[must_use]
    pub const fn can_post(&self) -> bool {
        self.at_least(Self::Bookkeeper)
    }

    /// Returns true if this role can close and reopen periods.
    #[must_use]
    pub const fn can_close_periods(&self) -> bool {
        self.at_least(Self::Accountant)
    }

    /// Returns true if this role can lock periods and repair balances.
    #[must_use]
    pub const fn can_administer(&self) -> bool {
        self.at_least(Self::Admin)
    }

    /// Returns the role name as stored in tokens.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Accountant => "accountant",
            Self::Bookkeeper => "bookkeeper",
            Self::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role name.
#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(String);

impl std::str::FromStr for UserRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "accountant" => Ok(Self::Accountant),
            "bookkeeper" => Ok(Self::Bookkeeper),
            "viewer" => Ok(Self::Viewer),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Operations that go through an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create or edit a draft.
    DraftEntry,
    /// Post a draft.
    PostEntry,
    /// Reverse a posted entry.
    ReverseEntry,
    /// Delete a draft.
    DeleteEntry,
    /// Close a period.
    ClosePeriod,
    /// Reopen a closed period.
    ReopenPeriod,
    /// Lock a closed period.
    LockPeriod,
    /// Run the equation check or a reconciliation.
    RunHealthCheck,
    /// Apply safe balance corrections.
    AutoHeal,
    /// Rewrite an account balance from its lines.
    RecomputeBalance,
}

impl Action {
    /// Lowest role allowed to perform this action.
    #[must_use]
    pub const fn minimum_role(self) -> UserRole {
        match self {
            Self::RunHealthCheck => UserRole::Viewer,
            Self::DraftEntry | Self::PostEntry | Self::ReverseEntry | Self::DeleteEntry => {
                UserRole::Bookkeeper
            }
            Self::ClosePeriod | Self::ReopenPeriod => UserRole::Accountant,
            Self::LockPeriod | Self::AutoHeal | Self::RecomputeBalance => UserRole::Admin,
        }
    }

    /// Human-readable verb phrase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DraftEntry => "draft entries",
            Self::PostEntry => "post entries",
            Self::ReverseEntry => "reverse entries",
            Self::DeleteEntry => "delete entries",
            Self::ClosePeriod => "close periods",
            Self::ReopenPeriod => "reopen periods",
            Self::LockPeriod => "lock periods",
            Self::RunHealthCheck => "run health checks",
            Self::AutoHeal => "auto-heal balances",
            Self::RecomputeBalance => "recompute balances",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// User performing the operation.
    pub user_id: UserId,
    /// The user's ledger role.
    pub role: UserRole,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub const fn new(user_id: UserId, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// The scheduler's identity: nil user id with the owner role.
    #[must_use]
    pub const fn system() -> Self {
        Self::new(UserId::from_uuid(uuid::Uuid::nil()), UserRole::Owner)
    }

    /// Checks that this actor may perform `action`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotAuthorized` if the role is too low.
    pub fn authorize(&self, action: Action) -> Result<(), LedgerError> {
        if self.role.at_least(action.minimum_role()) {
            Ok(())
        } else {
            Err(LedgerError::NotAuthorized {
                action,
                role: self.role,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_role_permissions() {
        assert!(UserRole::Owner.can_post());
        assert!(UserRole::Bookkeeper.can_post());
        assert!(!UserRole::Viewer.can_post());

        assert!(UserRole::Accountant.can_close_periods());
        assert!(!UserRole::Bookkeeper.can_close_periods());

        assert!(UserRole::Admin.can_administer());
        assert!(!UserRole::Accountant.can_administer());
    }

    #[rstest]
    #[case(UserRole::Viewer, Action::RunHealthCheck, true)]
    #[case(UserRole::Viewer, Action::PostEntry, false)]
    #[case(UserRole::Bookkeeper, Action::ReverseEntry, true)]
    #[case(UserRole::Bookkeeper, Action::ClosePeriod, false)]
    #[case(UserRole::Accountant, Action::ReopenPeriod, true)]
    #[case(UserRole::Accountant, Action::LockPeriod, false)]
    #[case(UserRole::Admin, Action::AutoHeal, true)]
    #[case(UserRole::Owner, Action::RecomputeBalance, true)]
    fn test_authorize(#[case] role: UserRole, #[case] action: Action, #[case] allowed: bool) {
        let actor = Actor::new(UserId::new(), role);
        let result = actor.authorize(action);
        assert_eq!(result.is_ok(), allowed);
        if !allowed {
            assert!(matches!(
                result,
                Err(LedgerError::NotAuthorized { role: r, .. }) if r == role
            ));
        }
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [
            UserRole::Owner,
            UserRole::Admin,
            UserRole::Accountant,
            UserRole::Bookkeeper,
            UserRole::Viewer,
        ] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("approver".parse::<UserRole>().is_err());
    }
}
