//! Account Registry: chart-of-accounts types and read-side operations.
//!
//! - `types` - Account types, normal-balance table, the `Account` record
//! - `registry` - `ChartOfAccounts` arena with parent indices and rollups
//! - `standard` - Default chart used by the seeder

pub mod registry;
pub mod standard;
pub mod types;

pub use registry::ChartOfAccounts;
pub use standard::standard_accounts;
pub use types::{Account, AccountType, NormalBalance};
