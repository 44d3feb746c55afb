//! Aggregation and audit: period summaries, org totals, conservation.

use super::{busy, journal, periods, rows, Store};
use crate::account::AccountKind;
use crate::error::LedgerError;
use crate::model::{MemberPeriodStat, Period, PeriodState};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// Balance summed across all accounts of one kind.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct KindBalance {
    pub kind: AccountKind,
    pub total: i64,
}

/// Org-wide totals: lifetime issuance and balances by account kind.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct OrgTotals {
    pub org_id: String,
    pub issued_total: i64,
    pub balances: Vec<KindBalance>,
}

/// Result of a conservation audit. Empty `violations` means the books
/// balance.
#[derive(Clone, Debug, Serialize)]
pub struct ConservationReport {
    pub org_id: String,
    pub issued_total: i64,
    pub balance_total: i64,
    pub violations: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl ConservationReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Row counts and database size.
#[derive(Clone, Debug, Serialize)]
pub struct StoreStats {
    pub orgs: u64,
    pub members: u64,
    pub accounts: u64,
    pub entries: u64,
    pub transfers: u64,
    pub challenges: u64,
    pub periods: u64,
    pub db_size_bytes: u64,
    pub sqlite_busy_events: u64,
}

impl Store {
    /// Per-member aggregates for a period: live SQL while the period is
    /// open, the persisted snapshot once it closed.
    pub fn period_summary(
        &self,
        org_id: &str,
        label: &str,
    ) -> Result<Vec<MemberPeriodStat>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let period = periods::period_by_label(&conn, org_id, label)?;
        match period.state {
            PeriodState::Open => compute_period_stats(&conn, &period),
            PeriodState::Closed => read_snapshot(&conn, &period.period_id),
        }
    }

    /// Lifetime issuance plus current balances grouped by account kind.
    pub fn org_totals(&self, org_id: &str) -> Result<OrgTotals, LedgerError> {
        let conn = self.conn.lock().unwrap();
        journal::ensure_org(&conn, org_id)?;

        let issued_total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM entries WHERE org_id = ?1 AND op = ?2",
            rusqlite::params![org_id, journal::ops::ISSUE],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT kind, SUM(balance) FROM accounts WHERE org_id = ?1
             GROUP BY kind ORDER BY kind",
        )?;
        let raw: Vec<(String, i64)> = stmt
            .query_map([org_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        let balances = raw
            .into_iter()
            .map(|(kind, total)| {
                Ok(KindBalance {
                    kind: rows::parse_kind(&kind)?,
                    total,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        Ok(OrgTotals {
            org_id: org_id.to_string(),
            issued_total,
            balances,
        })
    }

    /// Audit the org's books. Collects every violation instead of
    /// stopping at the first, so one run shows the full damage.
    pub fn verify_conservation(&self, org_id: &str) -> Result<ConservationReport, LedgerError> {
        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let mut violations = Vec::new();

            let issued_total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM entries WHERE org_id = ?1 AND op = ?2",
                rusqlite::params![org_id, journal::ops::ISSUE],
                |row| row.get(0),
            )?;
            let balance_total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(balance), 0) FROM accounts WHERE org_id = ?1",
                [org_id],
                |row| row.get(0),
            )?;
            if issued_total != balance_total {
                violations.push(format!(
                    "issued total {issued_total} does not match balance total {balance_total}"
                ));
            }

            check_negative_balances(conn, org_id, &mut violations)?;
            check_frozen_holds(conn, org_id, &mut violations)?;
            check_challenge_escrow(conn, org_id, &mut violations)?;
            check_journal_replay(conn, org_id, &mut violations)?;

            Ok(ConservationReport {
                org_id: org_id.to_string(),
                issued_total,
                balance_total,
                violations,
                checked_at: Utc::now(),
            })
        })
    }

    /// Row counts, database size, and busy-handler activity.
    pub fn stats(&self) -> Result<StoreStats, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let count = |table: &str| -> Result<u64, LedgerError> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };

        let page_count: u64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: u64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(StoreStats {
            orgs: count("orgs")?,
            members: count("members")?,
            accounts: count("accounts")?,
            entries: count("entries")?,
            transfers: count("transfers")?,
            challenges: count("challenges")?,
            periods: count("periods")?,
            db_size_bytes: page_count * page_size,
            sqlite_busy_events: busy::busy_count(),
        })
    }
}

/// Compute the per-member aggregates live from transfers, awards, and
/// the journal. Every member gets a row, active or not.
pub(crate) fn compute_period_stats(
    conn: &Connection,
    period: &Period,
) -> Result<Vec<MemberPeriodStat>, LedgerError> {
    let mut by_member: BTreeMap<String, MemberPeriodStat> = BTreeMap::new();
    let mut stmt =
        conn.prepare("SELECT member_id FROM members WHERE org_id = ?1 ORDER BY member_id")?;
    let member_ids: Vec<String> = stmt
        .query_map([&period.org_id], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    drop(stmt);
    for member_id in member_ids {
        by_member.insert(
            member_id.clone(),
            MemberPeriodStat {
                member_id,
                ..MemberPeriodStat::default()
            },
        );
    }

    merge_totals(
        conn,
        "SELECT sender_id, SUM(amount) FROM transfers
         WHERE period_id = ?1 AND status = 'realized' GROUP BY sender_id",
        &period.period_id,
        &mut by_member,
        |stat, total| stat.sent_total = total,
    )?;
    merge_totals(
        conn,
        "SELECT sender_id, SUM(amount) FROM transfers
         WHERE period_id = ?1 AND status = 'realized' AND auto_confirmed = 1
         GROUP BY sender_id",
        &period.period_id,
        &mut by_member,
        |stat, total| stat.auto_confirmed_total = total,
    )?;
    merge_totals(
        conn,
        "SELECT recipient_id, SUM(amount) FROM transfers
         WHERE period_id = ?1 AND status = 'realized' GROUP BY recipient_id",
        &period.period_id,
        &mut by_member,
        |stat, total| stat.received_total = total,
    )?;
    merge_totals(
        conn,
        "SELECT sender_id, SUM(amount) FROM transfers
         WHERE period_id = ?1 AND status = 'declined' GROUP BY sender_id",
        &period.period_id,
        &mut by_member,
        |stat, total| stat.declined_total = total,
    )?;
    merge_totals(
        conn,
        "SELECT a.winner_id, SUM(a.amount) FROM challenge_awards a
         JOIN challenges c ON c.challenge_id = a.challenge_id
         WHERE c.period_id = ?1 GROUP BY a.winner_id",
        &period.period_id,
        &mut by_member,
        |stat, total| stat.awarded_total = total,
    )?;
    merge_totals(
        conn,
        "SELECT acc.owner_id, SUM(e.amount) FROM entries e
         JOIN accounts acc ON acc.account_id = e.debit_account
         WHERE e.op = 'burn' AND e.ref_id = ?1 GROUP BY acc.owner_id",
        &period.period_id,
        &mut by_member,
        |stat, total| stat.burnt_total = total,
    )?;

    Ok(by_member.into_values().collect())
}

/// Persist the aggregates to `period_stats`. Called once, at close.
pub(crate) fn snapshot_period_stats(
    conn: &Connection,
    period: &Period,
) -> Result<u64, LedgerError> {
    let stats = compute_period_stats(conn, period)?;
    for stat in &stats {
        conn.execute(
            "INSERT INTO period_stats (period_id, member_id, sent_total, received_total,
                                       declined_total, auto_confirmed_total, awarded_total,
                                       burnt_total)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                period.period_id,
                stat.member_id,
                stat.sent_total,
                stat.received_total,
                stat.declined_total,
                stat.auto_confirmed_total,
                stat.awarded_total,
                stat.burnt_total
            ],
        )?;
    }
    Ok(stats.len() as u64)
}

fn read_snapshot(conn: &Connection, period_id: &str) -> Result<Vec<MemberPeriodStat>, LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT member_id, sent_total, received_total, declined_total,
                auto_confirmed_total, awarded_total, burnt_total
         FROM period_stats WHERE period_id = ?1 ORDER BY member_id",
    )?;
    let stats = stmt
        .query_map([period_id], |row| {
            Ok(MemberPeriodStat {
                member_id: row.get(0)?,
                sent_total: row.get(1)?,
                received_total: row.get(2)?,
                declined_total: row.get(3)?,
                auto_confirmed_total: row.get(4)?,
                awarded_total: row.get(5)?,
                burnt_total: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(stats)
}

fn merge_totals(
    conn: &Connection,
    sql: &str,
    period_id: &str,
    by_member: &mut BTreeMap<String, MemberPeriodStat>,
    apply: impl Fn(&mut MemberPeriodStat, i64),
) -> Result<(), LedgerError> {
    let mut stmt = conn.prepare(sql)?;
    let totals: Vec<(String, i64)> = stmt
        .query_map([period_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    for (member_id, total) in totals {
        if let Some(stat) = by_member.get_mut(&member_id) {
            apply(stat, total);
        }
    }
    Ok(())
}

fn check_negative_balances(
    conn: &Connection,
    org_id: &str,
    violations: &mut Vec<String>,
) -> Result<(), LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT owner_kind, owner_id, kind, balance FROM accounts
         WHERE org_id = ?1 AND balance < 0",
    )?;
    let negatives: Vec<(String, String, String, i64)> = stmt
        .query_map([org_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<Result<_, _>>()?;
    for (owner_kind, owner_id, kind, balance) in negatives {
        violations.push(format!(
            "negative balance {balance} on {kind} account of {owner_kind} {owner_id}"
        ));
    }
    Ok(())
}

/// Member frozen balances must equal the total of live (waiting or
/// approved) transfer holds.
fn check_frozen_holds(
    conn: &Connection,
    org_id: &str,
    violations: &mut Vec<String>,
) -> Result<(), LedgerError> {
    let frozen_total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(balance), 0) FROM accounts
         WHERE org_id = ?1 AND owner_kind = 'member' AND kind = 'frozen'",
        [org_id],
        |row| row.get(0),
    )?;
    let live_holds: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM transfers
         WHERE org_id = ?1 AND status IN ('waiting', 'approved')",
        [org_id],
        |row| row.get(0),
    )?;
    if frozen_total != live_holds {
        violations.push(format!(
            "member frozen total {frozen_total} does not match live transfer holds {live_holds}"
        ));
    }
    Ok(())
}

/// Active challenge escrow must equal fund minus awards; closed escrow
/// must be empty.
fn check_challenge_escrow(
    conn: &Connection,
    org_id: &str,
    violations: &mut Vec<String>,
) -> Result<(), LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT c.challenge_id, c.state, c.fund_total,
                COALESCE((SELECT SUM(a.amount) FROM challenge_awards a
                          WHERE a.challenge_id = c.challenge_id), 0),
                acc.balance
         FROM challenges c
         JOIN accounts acc
           ON acc.owner_kind = 'challenge' AND acc.owner_id = c.challenge_id
         WHERE c.org_id = ?1",
    )?;
    let escrows: Vec<(String, String, i64, i64, i64)> = stmt
        .query_map([org_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })?
        .collect::<Result<_, _>>()?;

    for (challenge_id, state, fund_total, awarded, balance) in escrows {
        match state.as_str() {
            "active" => {
                let expected = fund_total - awarded;
                if balance != expected {
                    violations.push(format!(
                        "challenge {challenge_id} escrow {balance} does not match \
                         fund {fund_total} minus awards {awarded}"
                    ));
                }
            }
            _ => {
                if balance != 0 {
                    violations.push(format!(
                        "closed challenge {challenge_id} still holds escrow {balance}"
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Replay the journal: per account, credits minus debits must equal the
/// stored balance.
fn check_journal_replay(
    conn: &Connection,
    org_id: &str,
    violations: &mut Vec<String>,
) -> Result<(), LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT acc.owner_kind, acc.owner_id, acc.kind, acc.balance,
                COALESCE((SELECT SUM(e.amount) FROM entries e
                          WHERE e.credit_account = acc.account_id), 0)
                - COALESCE((SELECT SUM(e.amount) FROM entries e
                            WHERE e.debit_account = acc.account_id), 0)
         FROM accounts acc WHERE acc.org_id = ?1",
    )?;
    let accounts: Vec<(String, String, String, i64, i64)> = stmt
        .query_map([org_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })?
        .collect::<Result<_, _>>()?;

    for (owner_kind, owner_id, kind, balance, replayed) in accounts {
        if balance != replayed {
            violations.push(format!(
                "journal replay of {kind} account of {owner_kind} {owner_id} \
                 gives {replayed}, stored balance is {balance}"
            ));
        }
    }
    Ok(())
}
