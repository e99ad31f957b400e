//! Ledger schema.
//!
//! Creates the account, journal, and period tables with their enums,
//! constraints, and guard triggers.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: JOURNAL
        // ============================================================
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;
        db.execute_unprepared(ENTRY_SEQUENCES_SQL).await?;

        // ============================================================
        // PART 4: ACCOUNTING PERIODS
        // ============================================================
        db.execute_unprepared(ACCOUNTING_PERIODS_SQL).await?;
        db.execute_unprepared(PERIOD_EVENTS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE account_type AS ENUM ('ASSET', 'LIABILITY', 'EQUITY', 'REVENUE', 'EXPENSE');

CREATE TYPE entry_status AS ENUM ('DRAFT', 'POSTED', 'REVERSED');

CREATE TYPE entry_source AS ENUM (
    'MANUAL',
    'SALE',
    'PURCHASE',
    'PAYMENT',
    'EXPENSE',
    'ASSET',
    'ADJUSTMENT',
    'CLOSING',
    'REVERSAL'
);

CREATE TYPE period_status AS ENUM ('OPEN', 'CLOSED', 'LOCKED');

CREATE TYPE period_action AS ENUM ('CLOSE', 'REOPEN', 'LOCK');
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    code VARCHAR(20) NOT NULL UNIQUE,
    name VARCHAR(255) NOT NULL,
    account_type account_type NOT NULL,
    is_header BOOLEAN NOT NULL DEFAULT FALSE,
    parent_id UUID REFERENCES accounts(id),
    balance NUMERIC(20, 4) NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_accounts_not_own_parent CHECK (parent_id IS NULL OR parent_id <> id)
);

CREATE INDEX idx_accounts_parent ON accounts(parent_id);
CREATE INDEX idx_accounts_type ON accounts(account_type);
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    entry_number VARCHAR(32) NOT NULL UNIQUE,
    entry_date DATE NOT NULL,
    description TEXT NOT NULL,
    source_type entry_source NOT NULL DEFAULT 'MANUAL',
    reference VARCHAR(100),
    status entry_status NOT NULL DEFAULT 'DRAFT',
    total_debit NUMERIC(20, 4) NOT NULL DEFAULT 0,
    total_credit NUMERIC(20, 4) NOT NULL DEFAULT 0,
    is_balanced BOOLEAN NOT NULL DEFAULT FALSE,
    reversal_of UUID REFERENCES journal_entries(id),
    reversed_by_entry UUID REFERENCES journal_entries(id),
    reversal_reason TEXT,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    posted_by UUID,
    posted_at TIMESTAMPTZ,
    reversed_by UUID,
    reversed_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_posted_is_balanced CHECK (status = 'DRAFT' OR is_balanced),
    CONSTRAINT chk_posted_has_poster CHECK (status = 'DRAFT' OR posted_at IS NOT NULL),
    CONSTRAINT chk_reversed_has_link CHECK (status <> 'REVERSED' OR reversed_by_entry IS NOT NULL)
);

CREATE INDEX idx_journal_entries_date ON journal_entries(entry_date);
CREATE INDEX idx_journal_entries_status ON journal_entries(status);
CREATE INDEX idx_journal_entries_source ON journal_entries(source_type);
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id UUID PRIMARY KEY,
    entry_id UUID NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
    line_number INTEGER NOT NULL,
    account_id UUID NOT NULL REFERENCES accounts(id),
    debit NUMERIC(20, 4) NOT NULL DEFAULT 0,
    credit NUMERIC(20, 4) NOT NULL DEFAULT 0,
    description TEXT,

    CONSTRAINT chk_line_number_positive CHECK (line_number > 0),
    CONSTRAINT chk_line_amounts_non_negative CHECK (debit >= 0 AND credit >= 0),
    CONSTRAINT chk_line_one_side CHECK (debit = 0 OR credit = 0),
    CONSTRAINT uq_line_number UNIQUE (entry_id, line_number)
);

CREATE INDEX idx_journal_lines_entry ON journal_lines(entry_id);
CREATE INDEX idx_journal_lines_account ON journal_lines(account_id);
";

const ENTRY_SEQUENCES_SQL: &str = r"
CREATE TABLE journal_entry_sequences (
    year INTEGER PRIMARY KEY,
    last_value BIGINT NOT NULL
);
";

const ACCOUNTING_PERIODS_SQL: &str = r"
CREATE TABLE accounting_periods (
    id UUID PRIMARY KEY,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    status period_status NOT NULL DEFAULT 'OPEN',
    closed_by UUID,
    closed_at TIMESTAMPTZ,
    locked_by UUID,
    locked_at TIMESTAMPTZ,
    closing_entry_id UUID REFERENCES journal_entries(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_period_month CHECK (month BETWEEN 1 AND 12),
    CONSTRAINT uq_period_year_month UNIQUE (year, month)
);
";

const PERIOD_EVENTS_SQL: &str = r"
CREATE TABLE period_events (
    id UUID PRIMARY KEY,
    period_id UUID NOT NULL REFERENCES accounting_periods(id),
    action period_action NOT NULL,
    actor_id UUID NOT NULL,
    reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_period_events_period ON period_events(period_id, created_at);
";

const TRIGGERS_SQL: &str = r"
CREATE OR REPLACE FUNCTION set_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = NOW();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_accounts_updated_at
    BEFORE UPDATE ON accounts
    FOR EACH ROW EXECUTE FUNCTION set_updated_at();

CREATE TRIGGER trg_journal_entries_updated_at
    BEFORE UPDATE ON journal_entries
    FOR EACH ROW EXECUTE FUNCTION set_updated_at();

CREATE TRIGGER trg_accounting_periods_updated_at
    BEFORE UPDATE ON accounting_periods
    FOR EACH ROW EXECUTE FUNCTION set_updated_at();

-- Posted and reversed entries are part of the audit trail.
CREATE OR REPLACE FUNCTION prevent_posted_entry_delete()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status <> 'DRAFT' THEN
        RAISE EXCEPTION 'Cannot delete journal entry % with status %', OLD.entry_number, OLD.status;
    END IF;
    RETURN OLD;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_posted_entry_delete
    BEFORE DELETE ON journal_entries
    FOR EACH ROW EXECUTE FUNCTION prevent_posted_entry_delete();

CREATE OR REPLACE FUNCTION prevent_posted_line_update()
RETURNS TRIGGER AS $$
DECLARE
    v_status entry_status;
BEGIN
    SELECT status INTO v_status FROM journal_entries WHERE id = OLD.entry_id;
    IF v_status <> 'DRAFT' THEN
        RAISE EXCEPTION 'Cannot modify lines of a % journal entry', v_status;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_posted_line_update
    BEFORE UPDATE ON journal_lines
    FOR EACH ROW EXECUTE FUNCTION prevent_posted_line_update();

-- Locked periods never change again.
CREATE OR REPLACE FUNCTION prevent_locked_period_update()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status = 'LOCKED' THEN
        RAISE EXCEPTION 'Accounting period %-% is locked', OLD.year, OLD.month;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_locked_period_update
    BEFORE UPDATE ON accounting_periods
    FOR EACH ROW EXECUTE FUNCTION prevent_locked_period_update();
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS period_events CASCADE;
DROP TABLE IF EXISTS accounting_periods CASCADE;
DROP TABLE IF EXISTS journal_entry_sequences CASCADE;
DROP TABLE IF EXISTS journal_lines CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;

DROP FUNCTION IF EXISTS prevent_locked_period_update() CASCADE;
DROP FUNCTION IF EXISTS prevent_posted_line_update() CASCADE;
DROP FUNCTION IF EXISTS prevent_posted_entry_delete() CASCADE;
DROP FUNCTION IF EXISTS set_updated_at() CASCADE;

DROP TYPE IF EXISTS period_action;
DROP TYPE IF EXISTS period_status;
DROP TYPE IF EXISTS entry_source;
DROP TYPE IF EXISTS entry_status;
DROP TYPE IF EXISTS account_type;
";
