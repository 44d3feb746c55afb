//! SQLite-backed ledger store.
//!
//! One [`Store`] wraps one connection behind a mutex. Multi-step writes
//! run inside `BEGIN IMMEDIATE` transactions so several stores opened on
//! the same file (separate processes included) race safely: SQLite's
//! write lock plus the schema constraints decide, not in-process luck.

pub(crate) mod busy;
mod challenges;
mod journal;
mod market;
mod periods;
mod rows;
mod schema;
mod stats;
mod transfers;

pub use busy::{busy_count, reset_busy_count};
pub use schema::LEDGER_SCHEMA;
pub use stats::{ConservationReport, KindBalance, OrgTotals, StoreStats};

use crate::account::{Account, AccountKind, OwnerKind};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::model::{IssueReceipt, Member};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// SQLite-backed points ledger.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    config: LedgerConfig,
}

impl Store {
    /// Open a file-backed store.
    pub fn open(path: &Path, config: LedgerConfig) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory(config: LedgerConfig) -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Create a store from an existing connection (multi-connection tests).
    pub fn from_connection(conn: Connection, config: LedgerConfig) -> Result<Self, LedgerError> {
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute("PRAGMA journal_mode = WAL", []);
        conn.busy_handler(Some(busy::busy_handler))?;
        conn.execute_batch(LEDGER_SCHEMA)?;
        conn.pragma_update(None, "user_version", 1)?;
        Ok(())
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Run `f` inside a write transaction.
    ///
    /// BEGIN IMMEDIATE acquires the write lock up front, so every read
    /// inside `f` already sees the state it will commit against.
    pub(crate) fn with_txn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let conn = self.conn.lock().unwrap();

        conn.execute("BEGIN IMMEDIATE", [])?;
        let result = f(&conn);

        match &result {
            Ok(_) => {
                conn.execute("COMMIT", [])?;
            }
            Err(_) => {
                let _ = conn.execute("ROLLBACK", []);
            }
        }

        result
    }

    // =========================================================================
    // Orgs and members
    // =========================================================================

    /// Create an org and its four org accounts (system, treasury, burnt,
    /// market).
    pub fn create_org(&self, org_id: &str, name: &str) -> Result<(), LedgerError> {
        self.with_txn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO orgs (org_id, name) VALUES (?1, ?2)
                 ON CONFLICT(org_id) DO NOTHING",
                params![org_id, name],
            )?;
            if inserted == 0 {
                return Err(LedgerError::OrgExists {
                    org_id: org_id.to_string(),
                });
            }
            for kind in AccountKind::org_kinds() {
                conn.execute(
                    "INSERT INTO accounts (org_id, owner_kind, owner_id, kind)
                     VALUES (?1, 'org', ?2, ?3)",
                    params![org_id, org_id, kind.as_str()],
                )?;
            }
            tracing::debug!(org_id, "org created");
            Ok(())
        })
    }

    /// Add a member and their four accounts (income, distribution,
    /// frozen, bonus).
    pub fn add_member(
        &self,
        org_id: &str,
        member_id: &str,
        display_name: &str,
        controller: bool,
    ) -> Result<(), LedgerError> {
        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let inserted = conn.execute(
                "INSERT INTO members (org_id, member_id, display_name, is_controller)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(org_id, member_id) DO NOTHING",
                params![org_id, member_id, display_name, controller as i32],
            )?;
            if inserted == 0 {
                return Err(LedgerError::MemberExists {
                    org_id: org_id.to_string(),
                    member_id: member_id.to_string(),
                });
            }
            for kind in AccountKind::member_kinds() {
                conn.execute(
                    "INSERT INTO accounts (org_id, owner_kind, owner_id, kind)
                     VALUES (?1, 'member', ?2, ?3)",
                    params![org_id, member_id, kind.as_str()],
                )?;
            }
            Ok(())
        })
    }

    /// Activate or deactivate a member. Inactive members receive no
    /// emission and cannot send; they can still receive.
    pub fn set_member_active(
        &self,
        org_id: &str,
        member_id: &str,
        active: bool,
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE members SET active = ?1 WHERE org_id = ?2 AND member_id = ?3",
            params![active as i32, org_id, member_id],
        )?;
        if changed == 0 {
            return Err(LedgerError::MemberNotFound {
                org_id: org_id.to_string(),
                member_id: member_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn get_member(
        &self,
        org_id: &str,
        member_id: &str,
    ) -> Result<Option<Member>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        journal::get_member(&conn, org_id, member_id)
    }

    pub fn list_members(&self, org_id: &str) -> Result<Vec<Member>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        journal::ensure_org(&conn, org_id)?;
        let mut stmt = conn.prepare(
            "SELECT member_id, display_name, is_controller, active FROM members
             WHERE org_id = ?1 ORDER BY member_id",
        )?;
        let members = stmt
            .query_map([org_id], |row| {
                Ok(Member {
                    org_id: org_id.to_string(),
                    member_id: row.get(0)?,
                    display_name: row.get(1)?,
                    is_controller: row.get::<_, i64>(2)? != 0,
                    active: row.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    // =========================================================================
    // Issuance and balances
    // =========================================================================

    /// Mint points into the org system account. The only operation that
    /// creates points; everything downstream conserves them.
    pub fn issue(&self, org_id: &str, amount: i64) -> Result<IssueReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let system =
                journal::account_id(conn, org_id, OwnerKind::Org, org_id, AccountKind::System)?;
            let ref_id = Uuid::new_v4().to_string();
            journal::mint_points(conn, org_id, system, amount, &ref_id, Utc::now())?;

            let issued_total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM entries
                 WHERE org_id = ?1 AND op = ?2",
                params![org_id, journal::ops::ISSUE],
                |row| row.get(0),
            )?;
            tracing::debug!(org_id, amount, issued_total, "points issued");
            Ok(IssueReceipt {
                org_id: org_id.to_string(),
                amount,
                issued_total,
            })
        })
    }

    /// Move points from the org system account into the treasury, the
    /// source for treasury-funded challenges.
    pub fn fund_treasury(&self, org_id: &str, amount: i64) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let system =
                journal::account_id(conn, org_id, OwnerKind::Org, org_id, AccountKind::System)?;
            let treasury =
                journal::account_id(conn, org_id, OwnerKind::Org, org_id, AccountKind::Treasury)?;
            let ref_id = Uuid::new_v4().to_string();
            journal::move_points(
                conn,
                org_id,
                system,
                treasury,
                amount,
                journal::ops::TREASURY_FUND,
                &ref_id,
                Utc::now(),
            )?;
            journal::balance_of(conn, treasury)
        })
    }

    /// All accounts of one owner, ordered by kind.
    pub fn balances(
        &self,
        org_id: &str,
        owner_kind: OwnerKind,
        owner_id: &str,
    ) -> Result<Vec<Account>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT kind, balance FROM accounts
             WHERE org_id = ?1 AND owner_kind = ?2 AND owner_id = ?3
             ORDER BY kind",
        )?;
        let raw = stmt
            .query_map(params![org_id, owner_kind.as_str(), owner_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(kind, balance)| {
                Ok(Account {
                    org_id: org_id.to_string(),
                    owner_kind,
                    owner_id: owner_id.to_string(),
                    kind: rows::parse_kind(&kind)?,
                    balance,
                })
            })
            .collect()
    }

    /// Balance of one account.
    pub fn balance(
        &self,
        org_id: &str,
        owner_kind: OwnerKind,
        owner_id: &str,
        kind: AccountKind,
    ) -> Result<i64, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let account = journal::account_id(&conn, org_id, owner_kind, owner_id, kind)?;
        journal::balance_of(&conn, account)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Fresh in-memory store with org "acme" and members alice (controller),
    /// bob and carol, 1000 points issued.
    pub(crate) fn seeded_store() -> Store {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        store.create_org("acme", "Acme").unwrap();
        store.add_member("acme", "alice", "Alice", true).unwrap();
        store.add_member("acme", "bob", "Bob", false).unwrap();
        store.add_member("acme", "carol", "Carol", false).unwrap();
        store.issue("acme", 1000).unwrap();
        store
    }

    /// Seeded store with an open period, so distribution accounts are
    /// funded and transfers can be submitted.
    pub(crate) fn seeded_store_with_period() -> Store {
        seeded_store_with_config(LedgerConfig::default())
    }

    /// Same seeding with a caller-chosen config (grace window, caps).
    pub(crate) fn seeded_store_with_config(config: LedgerConfig) -> Store {
        let store = Store::memory(config).unwrap();
        store.create_org("acme", "Acme").unwrap();
        store.add_member("acme", "alice", "Alice", true).unwrap();
        store.add_member("acme", "bob", "Bob", false).unwrap();
        store.add_member("acme", "carol", "Carol", false).unwrap();
        store.issue("acme", 1000).unwrap();
        let now = Utc::now();
        store
            .open_period("acme", "2026-08", now, now + chrono::Duration::days(30))
            .unwrap();
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === A) Schema bootstrap ===

    #[test]
    fn test_store_bootstraps_schema() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        let conn = store.conn.lock().unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for table in [
            "orgs",
            "members",
            "accounts",
            "entries",
            "periods",
            "transfers",
            "challenges",
            "challenge_awards",
            "period_stats",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_store_sets_foreign_keys() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        let conn = store.conn.lock().unwrap();

        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    // === B) Orgs and accounts ===

    #[test]
    fn test_create_org_creates_org_accounts() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        store.create_org("acme", "Acme").unwrap();

        let accounts = store.balances("acme", OwnerKind::Org, "acme").unwrap();
        assert_eq!(accounts.len(), 4);
        for account in &accounts {
            assert_eq!(account.balance, 0);
        }
        let kinds: Vec<AccountKind> = accounts.iter().map(|a| a.kind).collect();
        for kind in AccountKind::org_kinds() {
            assert!(kinds.contains(&kind));
        }
    }

    #[test]
    fn test_create_org_rejects_duplicate() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        store.create_org("acme", "Acme").unwrap();

        let result = store.create_org("acme", "Acme again");
        assert!(matches!(result, Err(LedgerError::OrgExists { .. })));
    }

    // === C) Members ===

    #[test]
    fn test_add_member_creates_member_accounts() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        store.create_org("acme", "Acme").unwrap();
        store.add_member("acme", "alice", "Alice", true).unwrap();

        let accounts = store.balances("acme", OwnerKind::Member, "alice").unwrap();
        assert_eq!(accounts.len(), 4);

        let member = store.get_member("acme", "alice").unwrap().unwrap();
        assert!(member.is_controller);
        assert!(member.active);
    }

    #[test]
    fn test_add_member_requires_org() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        let result = store.add_member("ghost", "alice", "Alice", false);
        assert!(matches!(result, Err(LedgerError::OrgNotFound { .. })));
    }

    #[test]
    fn test_add_member_rejects_duplicate() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        store.create_org("acme", "Acme").unwrap();
        store.add_member("acme", "alice", "Alice", false).unwrap();

        let result = store.add_member("acme", "alice", "Alice II", false);
        assert!(matches!(result, Err(LedgerError::MemberExists { .. })));
    }

    #[test]
    fn test_set_member_active_toggles() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        store.create_org("acme", "Acme").unwrap();
        store.add_member("acme", "alice", "Alice", false).unwrap();

        store.set_member_active("acme", "alice", false).unwrap();
        assert!(!store.get_member("acme", "alice").unwrap().unwrap().active);

        store.set_member_active("acme", "alice", true).unwrap();
        assert!(store.get_member("acme", "alice").unwrap().unwrap().active);

        let missing = store.set_member_active("acme", "nobody", false);
        assert!(matches!(missing, Err(LedgerError::MemberNotFound { .. })));
    }

    #[test]
    fn test_list_members_sorted() {
        let store = testutil::seeded_store();
        let members = store.list_members("acme").unwrap();
        let ids: Vec<&str> = members.iter().map(|m| m.member_id.as_str()).collect();
        assert_eq!(ids, ["alice", "bob", "carol"]);
    }

    // === D) Issuance ===

    #[test]
    fn test_issue_credits_system_account() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        store.create_org("acme", "Acme").unwrap();

        let receipt = store.issue("acme", 500).unwrap();
        assert_eq!(receipt.amount, 500);
        assert_eq!(receipt.issued_total, 500);

        let balance = store
            .balance("acme", OwnerKind::Org, "acme", AccountKind::System)
            .unwrap();
        assert_eq!(balance, 500);

        let receipt = store.issue("acme", 250).unwrap();
        assert_eq!(receipt.issued_total, 750);
    }

    #[test]
    fn test_issue_rejects_non_positive_amount() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        store.create_org("acme", "Acme").unwrap();

        assert!(matches!(
            store.issue("acme", 0),
            Err(LedgerError::InvalidAmount { amount: 0 })
        ));
        assert!(matches!(
            store.issue("acme", -5),
            Err(LedgerError::InvalidAmount { amount: -5 })
        ));
    }

    #[test]
    fn test_issue_requires_org() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        let result = store.issue("ghost", 100);
        assert!(matches!(result, Err(LedgerError::OrgNotFound { .. })));
    }

    #[test]
    fn test_fund_treasury_moves_from_system() {
        let store = Store::memory(LedgerConfig::default()).unwrap();
        store.create_org("acme", "Acme").unwrap();
        store.issue("acme", 500).unwrap();

        let treasury = store.fund_treasury("acme", 200).unwrap();
        assert_eq!(treasury, 200);
        assert_eq!(
            store
                .balance("acme", OwnerKind::Org, "acme", AccountKind::System)
                .unwrap(),
            300
        );

        // The treasury cannot be funded beyond what was issued.
        let result = store.fund_treasury("acme", 301);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds {
                kind: AccountKind::System,
                ..
            })
        ));
    }
}
