//! SQLite schema for the points ledger.
//!
//! Tables:
//! - `orgs`, `members`: identity (ids are caller-provided slugs)
//! - `accounts`: typed balances, one row per (owner, kind)
//! - `entries`: append-only double-entry journal
//! - `periods`, `transfers`, `challenges`, `challenge_awards`: lifecycle state
//! - `period_stats`: per-member snapshot written at period close

/// DDL for the ledger tables.
///
/// Schema version: 1
pub const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orgs (
    org_id       TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    created_at   TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS members (
    org_id        TEXT NOT NULL REFERENCES orgs(org_id),
    member_id     TEXT NOT NULL,
    display_name  TEXT NOT NULL,
    is_controller INTEGER NOT NULL DEFAULT 0,
    active        INTEGER NOT NULL DEFAULT 1,
    joined_at     TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (org_id, member_id)
);

-- Typed balances. The CHECK backs up the in-transaction guard: no
-- account may ever go negative.
CREATE TABLE IF NOT EXISTS accounts (
    account_id   INTEGER PRIMARY KEY,
    org_id       TEXT NOT NULL REFERENCES orgs(org_id),
    owner_kind   TEXT NOT NULL,
    owner_id     TEXT NOT NULL,
    kind         TEXT NOT NULL,
    balance      INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
    UNIQUE (org_id, owner_kind, owner_id, kind)
);

-- Double-entry journal (append-only, immutable). debit_account is NULL
-- only for op = 'issue'; every other op moves points between accounts.
CREATE TABLE IF NOT EXISTS entries (
    entry_id        INTEGER PRIMARY KEY,
    org_id          TEXT NOT NULL REFERENCES orgs(org_id),
    debit_account   INTEGER REFERENCES accounts(account_id),
    credit_account  INTEGER NOT NULL REFERENCES accounts(account_id),
    amount          INTEGER NOT NULL CHECK (amount > 0),
    op              TEXT NOT NULL,
    ref_id          TEXT NOT NULL,
    recorded_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS periods (
    period_id    TEXT PRIMARY KEY,
    org_id       TEXT NOT NULL REFERENCES orgs(org_id),
    label        TEXT NOT NULL,
    starts_at    TEXT NOT NULL,
    ends_at      TEXT NOT NULL,
    state        TEXT NOT NULL DEFAULT 'open',
    opened_at    TEXT NOT NULL,
    closed_at    TEXT,
    UNIQUE (org_id, label)
);

CREATE TABLE IF NOT EXISTS transfers (
    transfer_id    TEXT PRIMARY KEY,
    org_id         TEXT NOT NULL REFERENCES orgs(org_id),
    period_id      TEXT NOT NULL REFERENCES periods(period_id),
    sender_id      TEXT NOT NULL,
    recipient_id   TEXT NOT NULL,
    amount         INTEGER NOT NULL CHECK (amount > 0),
    reason         TEXT,
    client_ref     TEXT UNIQUE,
    status         TEXT NOT NULL DEFAULT 'waiting',
    submitted_at   TEXT NOT NULL,
    grace_until    TEXT NOT NULL,
    decided_by     TEXT,
    decided_at     TEXT,
    auto_confirmed INTEGER NOT NULL DEFAULT 0,
    realized_at    TEXT
);

CREATE TABLE IF NOT EXISTS challenges (
    challenge_id TEXT PRIMARY KEY,
    org_id       TEXT NOT NULL REFERENCES orgs(org_id),
    period_id    TEXT NOT NULL REFERENCES periods(period_id),
    creator_id   TEXT NOT NULL,
    title        TEXT NOT NULL,
    fund_total   INTEGER NOT NULL CHECK (fund_total > 0),
    funded_from  TEXT NOT NULL,
    state        TEXT NOT NULL DEFAULT 'active',
    client_ref   TEXT UNIQUE,
    created_at   TEXT NOT NULL,
    closed_at    TEXT
);

-- One award per winner per challenge; award_id is content-addressed.
CREATE TABLE IF NOT EXISTS challenge_awards (
    award_id     TEXT PRIMARY KEY,
    challenge_id TEXT NOT NULL REFERENCES challenges(challenge_id),
    winner_id    TEXT NOT NULL,
    amount       INTEGER NOT NULL CHECK (amount > 0),
    awarded_by   TEXT NOT NULL,
    awarded_at   TEXT NOT NULL,
    UNIQUE (challenge_id, winner_id)
);

CREATE TABLE IF NOT EXISTS period_stats (
    period_id            TEXT NOT NULL REFERENCES periods(period_id),
    member_id            TEXT NOT NULL,
    sent_total           INTEGER NOT NULL DEFAULT 0,
    received_total       INTEGER NOT NULL DEFAULT 0,
    declined_total       INTEGER NOT NULL DEFAULT 0,
    auto_confirmed_total INTEGER NOT NULL DEFAULT 0,
    awarded_total        INTEGER NOT NULL DEFAULT 0,
    burnt_total          INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (period_id, member_id)
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_accounts_org
    ON accounts(org_id);
CREATE INDEX IF NOT EXISTS idx_entries_org_op
    ON entries(org_id, op);
CREATE INDEX IF NOT EXISTS idx_entries_op_ref
    ON entries(op, ref_id);
CREATE INDEX IF NOT EXISTS idx_transfers_org_status
    ON transfers(org_id, status);
CREATE INDEX IF NOT EXISTS idx_transfers_status_grace
    ON transfers(status, grace_until);
CREATE INDEX IF NOT EXISTS idx_transfers_period
    ON transfers(period_id);
CREATE INDEX IF NOT EXISTS idx_challenges_org_state
    ON challenges(org_id, state);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEDGER_SCHEMA).unwrap();
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEDGER_SCHEMA).unwrap();
        conn.execute_batch(LEDGER_SCHEMA).unwrap();
    }

    #[test]
    fn test_balance_check_rejects_negative() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEDGER_SCHEMA).unwrap();
        conn.execute("INSERT INTO orgs (org_id, name) VALUES ('o', 'Org')", [])
            .unwrap();
        let result = conn.execute(
            "INSERT INTO accounts (org_id, owner_kind, owner_id, kind, balance)
             VALUES ('o', 'org', 'o', 'system', -1)",
            [],
        );
        assert!(result.is_err(), "CHECK (balance >= 0) must reject");
    }

    #[test]
    fn test_one_account_per_owner_and_kind() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEDGER_SCHEMA).unwrap();
        conn.execute("INSERT INTO orgs (org_id, name) VALUES ('o', 'Org')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO accounts (org_id, owner_kind, owner_id, kind) VALUES ('o', 'member', 'm', 'income')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO accounts (org_id, owner_kind, owner_id, kind) VALUES ('o', 'member', 'm', 'income')",
            [],
        );
        assert!(dup.is_err(), "UNIQUE (owner, kind) must reject");
    }
}
