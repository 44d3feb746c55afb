//! Period lifecycle: open with emission, close with burn and snapshot.
//!
//! An org has at most one open period. Opening credits every active
//! member's distribution account from the org system account; closing
//! drives every live transfer and challenge of the period to a terminal
//! state, burns unspent distribution, and snapshots per-member stats.

use super::{challenges, journal, rows, stats, transfers, Store};
use crate::account::{AccountKind, OwnerKind};
use crate::error::LedgerError;
use crate::model::{ClosePeriodOutcome, OpenPeriodOutcome, Period};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

impl Store {
    /// Open a period and emit `config.distribution_amount` to every
    /// active member. All-or-nothing: if the system account cannot cover
    /// every member, nothing is emitted and no period opens.
    pub fn open_period(
        &self,
        org_id: &str,
        label: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<OpenPeriodOutcome, LedgerError> {
        let emission = self.config().distribution_amount;
        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            if let Some(open) = open_period_row(conn, org_id)? {
                return Err(LedgerError::PeriodAlreadyOpen {
                    org_id: org_id.to_string(),
                    label: open.label,
                });
            }
            // Labels never reopen; a closed label is spent.
            let label_taken: Option<String> = conn
                .query_row(
                    "SELECT state FROM periods WHERE org_id = ?1 AND label = ?2",
                    params![org_id, label],
                    |row| row.get(0),
                )
                .optional()?;
            if label_taken.is_some() {
                return Err(LedgerError::PeriodClosed {
                    label: label.to_string(),
                });
            }

            let now = Utc::now();
            let period_id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO periods (period_id, org_id, label, starts_at, ends_at, opened_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    period_id,
                    org_id,
                    label,
                    starts_at.to_rfc3339(),
                    ends_at.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )?;

            let members = active_member_ids(conn, org_id)?;
            let need = emission * members.len() as i64;
            if !members.is_empty() {
                let system = journal::account_id(
                    conn,
                    org_id,
                    OwnerKind::Org,
                    org_id,
                    AccountKind::System,
                )?;
                let available = journal::balance_of(conn, system)?;
                if available < need {
                    return Err(LedgerError::InsufficientFunds {
                        kind: AccountKind::System,
                        requested: need,
                        available,
                    });
                }
                for member_id in &members {
                    let distribution = journal::account_id(
                        conn,
                        org_id,
                        OwnerKind::Member,
                        member_id,
                        AccountKind::Distribution,
                    )?;
                    journal::move_points(
                        conn,
                        org_id,
                        system,
                        distribution,
                        emission,
                        journal::ops::EMISSION,
                        &period_id,
                        now,
                    )?;
                }
            }

            tracing::info!(
                org_id,
                label,
                period_id,
                emitted = need,
                members = members.len(),
                "period opened"
            );
            Ok(OpenPeriodOutcome {
                period_id,
                label: label.to_string(),
                emitted_total: need,
                members_credited: members.len() as u64,
            })
        })
    }

    /// Close the org's open period. One transaction, in order: final
    /// sweep, decline the waiting remainder, close active challenges,
    /// burn unspent distribution, snapshot stats, mark the period closed.
    pub fn close_period(
        &self,
        org_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClosePeriodOutcome, LedgerError> {
        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let period = match open_period_row(conn, org_id)? {
                Some(period) => period,
                None => {
                    return Err(match last_closed_label(conn, org_id)? {
                        Some(label) => LedgerError::PeriodClosed { label },
                        None => LedgerError::NoOpenPeriod {
                            org_id: org_id.to_string(),
                        },
                    })
                }
            };

            // 1. Settle what the grace window already decided.
            let sweep = transfers::sweep_in_txn(conn, Some(org_id), now)?;

            // 2. Decline what is still waiting inside its grace window.
            let declined = decline_remaining_waiting(conn, &period, now)?;

            // 3. Close this period's active challenges.
            let challenges_closed = challenges::close_period_challenges(conn, &period, now)?;

            // 4. Burn unspent distribution. Gratitude does not roll over.
            let burnt_total = burn_distribution(conn, org_id, &period.period_id, now)?;

            // 5. Snapshot per-member stats while the rows are final.
            let stats_rows = stats::snapshot_period_stats(conn, &period)?;

            // 6. Mark closed.
            conn.execute(
                "UPDATE periods SET state = 'closed', closed_at = ?1 WHERE period_id = ?2",
                params![now.to_rfc3339(), period.period_id],
            )?;

            tracing::info!(
                org_id,
                label = period.label.as_str(),
                auto_approved = sweep.auto_approved,
                realized = sweep.realized,
                declined,
                challenges_closed,
                burnt_total,
                "period closed"
            );
            Ok(ClosePeriodOutcome {
                period_id: period.period_id.clone(),
                label: period.label.clone(),
                auto_approved: sweep.auto_approved,
                realized: sweep.realized,
                declined,
                challenges_closed,
                burnt_total,
                stats_rows,
            })
        })
    }

    /// The org's open period, if any.
    pub fn current_period(&self, org_id: &str) -> Result<Option<Period>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        journal::ensure_org(&conn, org_id)?;
        open_period_row(&conn, org_id)
    }

    /// All periods of an org, oldest first.
    pub fn list_periods(&self, org_id: &str) -> Result<Vec<Period>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        journal::ensure_org(&conn, org_id)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM periods WHERE org_id = ?1 ORDER BY opened_at, period_id",
            rows::PERIOD_COLUMNS
        ))?;
        let raws: Vec<rows::RawPeriod> = stmt
            .query_map([org_id], rows::period_from_row)?
            .collect::<Result<_, _>>()?;
        raws.into_iter().map(rows::RawPeriod::decode).collect()
    }

    /// A period by label.
    pub fn get_period(&self, org_id: &str, label: &str) -> Result<Period, LedgerError> {
        let conn = self.conn.lock().unwrap();
        period_by_label(&conn, org_id, label)
    }
}

pub(crate) fn period_by_label(
    conn: &Connection,
    org_id: &str,
    label: &str,
) -> Result<Period, LedgerError> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {} FROM periods WHERE org_id = ?1 AND label = ?2",
                rows::PERIOD_COLUMNS
            ),
            params![org_id, label],
            rows::period_from_row,
        )
        .optional()?;
    match raw {
        Some(raw) => raw.decode(),
        None => Err(LedgerError::PeriodNotFound {
            org_id: org_id.to_string(),
            label: label.to_string(),
        }),
    }
}

/// Id of the org's open period, or `NoOpenPeriod`.
pub(crate) fn open_period_id(conn: &Connection, org_id: &str) -> Result<String, LedgerError> {
    open_period_row(conn, org_id)?
        .map(|period| period.period_id)
        .ok_or_else(|| LedgerError::NoOpenPeriod {
            org_id: org_id.to_string(),
        })
}

fn open_period_row(conn: &Connection, org_id: &str) -> Result<Option<Period>, LedgerError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM periods WHERE org_id = ?1 AND state = 'open'",
            rows::PERIOD_COLUMNS
        ),
        [org_id],
        rows::period_from_row,
    )
    .optional()?
    .map(rows::RawPeriod::decode)
    .transpose()
}

fn last_closed_label(conn: &Connection, org_id: &str) -> Result<Option<String>, LedgerError> {
    Ok(conn
        .query_row(
            "SELECT label FROM periods WHERE org_id = ?1 AND state = 'closed'
             ORDER BY closed_at DESC LIMIT 1",
            [org_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn active_member_ids(conn: &Connection, org_id: &str) -> Result<Vec<String>, LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT member_id FROM members WHERE org_id = ?1 AND active = 1 ORDER BY member_id",
    )?;
    let ids = stmt
        .query_map([org_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Decline and refund every transfer of the period still waiting. Runs
/// after the final sweep, so these are the ones whose grace window had
/// not yet passed.
fn decline_remaining_waiting(
    conn: &Connection,
    period: &Period,
    now: DateTime<Utc>,
) -> Result<u64, LedgerError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transfers WHERE period_id = ?1 AND status = 'waiting'",
        rows::TRANSFER_COLUMNS
    ))?;
    let waiting: Vec<rows::RawTransfer> = stmt
        .query_map([&period.period_id], rows::transfer_from_row)?
        .collect::<Result<_, _>>()?;
    drop(stmt);

    let mut declined = 0u64;
    for raw in waiting {
        let transfer = raw.decode()?;
        transfers::refund_hold(conn, &transfer, now)?;
        conn.execute(
            "UPDATE transfers SET status = 'declined', decided_at = ?1 WHERE transfer_id = ?2",
            params![now.to_rfc3339(), transfer.transfer_id],
        )?;
        declined += 1;
    }
    Ok(declined)
}

/// Move every member's remaining distribution balance to the org burnt
/// account.
fn burn_distribution(
    conn: &Connection,
    org_id: &str,
    period_id: &str,
    now: DateTime<Utc>,
) -> Result<i64, LedgerError> {
    let burnt_account =
        journal::account_id(conn, org_id, OwnerKind::Org, org_id, AccountKind::Burnt)?;
    let mut stmt = conn.prepare(
        "SELECT account_id, balance FROM accounts
         WHERE org_id = ?1 AND owner_kind = 'member' AND kind = 'distribution' AND balance > 0",
    )?;
    let holders: Vec<(i64, i64)> = stmt
        .query_map([org_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    drop(stmt);

    let mut burnt_total = 0i64;
    for (account, balance) in holders {
        journal::move_points(
            conn,
            org_id,
            account,
            burnt_account,
            balance,
            journal::ops::BURN,
            period_id,
            now,
        )?;
        burnt_total += balance;
    }
    Ok(burnt_total)
}
