//! Balance Health Monitor.
//!
//! - `equation` - Accounting equation check and drift findings
//! - `heal` - Whitelisted corrections

pub mod equation;
pub mod heal;

pub use equation::{
    AccountSnapshot, DriftFinding, DriftKind, EquationReport, TypeTotals, check_equation,
};
pub use heal::{HealAction, HealingResult, plan_heal};
