//! Development seeder for Tally.
//!
//! Inserts the standard chart of accounts into an empty ledger, opens the
//! current period and prints a short-lived token per role for trying the API.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::Utc;
use tally_db::{AccountRepository, LedgerSettings, PeriodRepository, connect_with};
use tally_shared::{AppConfig, JwtConfig, JwtService};
use uuid::Uuid;

/// Dev user ids, stable across runs.
const DEV_USERS: [(&str, &str); 5] = [
    ("owner", "00000000-0000-0000-0000-000000000001"),
    ("admin", "00000000-0000-0000-0000-000000000002"),
    ("accountant", "00000000-0000-0000-0000-000000000003"),
    ("bookkeeper", "00000000-0000-0000-0000-000000000004"),
    ("viewer", "00000000-0000-0000-0000-000000000005"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load().context("Failed to load configuration")?;

    println!("Connecting to database...");
    let db = connect_with(&config.database)
        .await
        .context("Failed to connect to database")?;

    println!("Seeding chart of accounts...");
    let inserted = AccountRepository::new(db.clone()).seed_standard().await?;
    if inserted == 0 {
        println!("  Accounts already present, skipping...");
    } else {
        println!("  Inserted {inserted} accounts");
    }

    let now = Utc::now();
    let periods = PeriodRepository::new(db, LedgerSettings::from(&config));
    let period = periods.ensure_period(now.date_naive(), now).await?;
    println!("  Current period {} is {}", period.key, period.status);

    println!("Development tokens:");
    let jwt = JwtService::new(JwtConfig::from(&config.jwt));
    for (role, id) in DEV_USERS {
        let token = jwt.generate_access_token(Uuid::parse_str(id)?, role)?;
        println!("  {role:<10} {token}");
    }

    println!("Seeding complete!");
    Ok(())
}
