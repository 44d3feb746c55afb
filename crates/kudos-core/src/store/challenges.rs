//! Challenge escrow: create, award winners, close out.
//!
//! A challenge owns a dedicated frozen account holding its prize fund.
//! Awards pay winners from that escrow; whatever remains when the
//! challenge closes returns to wherever the fund came from. Award ids
//! are content-addressed so a retried award is recognizable by id alone.

use super::{journal, periods, rows, Store};
use crate::account::{AccountKind, OwnerKind};
use crate::error::LedgerError;
use crate::model::{
    AwardReceipt, Challenge, ChallengeReceipt, ChallengeState, CloseChallengeOutcome,
    CreateChallengeParams, FundingSource, Period,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

impl Store {
    /// Create a challenge and escrow its fund.
    ///
    /// Creator-funded challenges debit the creator's distribution
    /// account; treasury-funded ones debit the org treasury and require
    /// a controller creator. Idempotent on `client_ref` like transfers.
    pub fn create_challenge(
        &self,
        params: CreateChallengeParams<'_>,
    ) -> Result<ChallengeReceipt, LedgerError> {
        let CreateChallengeParams {
            org_id,
            creator_id,
            title,
            fund,
            funded_from,
            client_ref,
        } = params;

        if fund <= 0 {
            return Err(LedgerError::InvalidAmount { amount: fund });
        }

        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let creator = journal::require_member(conn, org_id, creator_id)?;
            if !creator.active {
                return Err(LedgerError::MemberInactive {
                    member_id: creator_id.to_string(),
                });
            }
            // Spending the org treasury is a controller privilege.
            if funded_from == FundingSource::Treasury && !creator.is_controller {
                return Err(LedgerError::NotController {
                    member_id: creator_id.to_string(),
                });
            }
            let period_id = periods::open_period_id(conn, org_id)?;

            if let Some(client_ref) = client_ref {
                if let Some(existing) = lookup_by_client_ref(conn, client_ref)? {
                    return reuse_creation(
                        &existing, client_ref, org_id, creator_id, title, fund, funded_from,
                    );
                }
            }

            let now = Utc::now();
            let challenge_id = Uuid::new_v4().to_string();

            conn.execute(
                "INSERT INTO accounts (org_id, owner_kind, owner_id, kind)
                 VALUES (?1, 'challenge', ?2, 'frozen')",
                params![org_id, challenge_id],
            )?;
            let escrow = journal::account_id(
                conn,
                org_id,
                OwnerKind::Challenge,
                &challenge_id,
                AccountKind::Frozen,
            )?;
            let source = funding_account(conn, org_id, creator_id, funded_from)?;
            journal::move_points(
                conn,
                org_id,
                source,
                escrow,
                fund,
                journal::ops::CHALLENGE_ESCROW,
                &challenge_id,
                now,
            )?;

            conn.execute(
                "INSERT INTO challenges (challenge_id, org_id, period_id, creator_id, title,
                                         fund_total, funded_from, client_ref, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    challenge_id,
                    org_id,
                    period_id,
                    creator_id,
                    title,
                    fund,
                    funded_from.as_str(),
                    client_ref,
                    now.to_rfc3339()
                ],
            )?;

            tracing::info!(org_id, challenge_id, creator_id, fund, "challenge created");
            Ok(ChallengeReceipt {
                challenge_id,
                fund_total: fund,
                created_at: now,
                was_new: true,
            })
        })
    }

    /// Award part of the fund to a winner.
    ///
    /// Authority: the creator, or any controller. One award per winner;
    /// retrying an identical award returns the stored receipt, a
    /// different amount for the same winner is an [`LedgerError::AwardConflict`].
    pub fn award_challenge(
        &self,
        org_id: &str,
        challenge_id: &str,
        winner_id: &str,
        amount: i64,
        awarded_by: &str,
    ) -> Result<AwardReceipt, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        self.with_txn(|conn| {
            let challenge = load_challenge(conn, org_id, challenge_id)?;

            let awarder = journal::require_member(conn, org_id, awarded_by)?;
            if !awarder.active {
                return Err(LedgerError::MemberInactive {
                    member_id: awarded_by.to_string(),
                });
            }
            if awarded_by != challenge.creator_id && !awarder.is_controller {
                return Err(LedgerError::NotController {
                    member_id: awarded_by.to_string(),
                });
            }
            // Winners may be inactive; awards are receipts of merit.
            journal::require_member(conn, org_id, winner_id)?;
            if winner_id == challenge.creator_id {
                return Err(LedgerError::SelfAward);
            }

            let escrow = journal::account_id(
                conn,
                org_id,
                OwnerKind::Challenge,
                challenge_id,
                AccountKind::Frozen,
            )?;

            if let Some((stored_id, stored_amount, stored_at)) =
                lookup_award(conn, challenge_id, winner_id)?
            {
                if stored_amount != amount {
                    return Err(LedgerError::AwardConflict {
                        stored: stored_amount,
                        requested: amount,
                    });
                }
                return Ok(AwardReceipt {
                    award_id: stored_id,
                    challenge_id: challenge_id.to_string(),
                    winner_id: winner_id.to_string(),
                    amount,
                    escrow_remaining: journal::balance_of(conn, escrow)?,
                    awarded_at: rows::parse_ts(&stored_at)?,
                    was_new: false,
                });
            }

            if challenge.state == ChallengeState::Closed {
                return Err(LedgerError::ChallengeClosed {
                    challenge_id: challenge_id.to_string(),
                });
            }

            let remaining = journal::balance_of(conn, escrow)?;
            if remaining < amount {
                return Err(LedgerError::AwardExceedsFund {
                    remaining,
                    requested: amount,
                });
            }

            let now = Utc::now();
            let award_id = compute_award_id(challenge_id, winner_id, amount);
            let income = journal::account_id(
                conn,
                org_id,
                OwnerKind::Member,
                winner_id,
                AccountKind::Income,
            )?;
            journal::move_points(
                conn,
                org_id,
                escrow,
                income,
                amount,
                journal::ops::CHALLENGE_AWARD,
                &award_id,
                now,
            )?;
            conn.execute(
                "INSERT INTO challenge_awards (award_id, challenge_id, winner_id, amount,
                                               awarded_by, awarded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![award_id, challenge_id, winner_id, amount, awarded_by, now.to_rfc3339()],
            )?;

            tracing::info!(org_id, challenge_id, winner_id, amount, "challenge awarded");
            Ok(AwardReceipt {
                award_id,
                challenge_id: challenge_id.to_string(),
                winner_id: winner_id.to_string(),
                amount,
                escrow_remaining: remaining - amount,
                awarded_at: now,
                was_new: true,
            })
        })
    }

    /// Close a challenge and refund the unspent escrow to its funding
    /// source. Closing a closed challenge is an idempotent no-op.
    pub fn close_challenge(
        &self,
        org_id: &str,
        challenge_id: &str,
    ) -> Result<CloseChallengeOutcome, LedgerError> {
        self.with_txn(|conn| {
            let challenge = load_challenge(conn, org_id, challenge_id)?;
            if challenge.state == ChallengeState::Closed {
                let returned: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(amount), 0) FROM entries
                     WHERE op = ?1 AND ref_id = ?2",
                    params![journal::ops::CHALLENGE_CLOSEOUT, challenge_id],
                    |row| row.get(0),
                )?;
                return Ok(CloseChallengeOutcome {
                    challenge_id: challenge_id.to_string(),
                    returned,
                    was_new: false,
                });
            }

            let returned = close_in_txn(conn, &challenge, Utc::now())?;
            Ok(CloseChallengeOutcome {
                challenge_id: challenge_id.to_string(),
                returned,
                was_new: true,
            })
        })
    }

    /// Remaining escrow balance (zero once closed).
    pub fn challenge_fund(&self, org_id: &str, challenge_id: &str) -> Result<i64, LedgerError> {
        let conn = self.conn.lock().unwrap();
        load_challenge(&conn, org_id, challenge_id)?;
        let escrow = journal::account_id(
            &conn,
            org_id,
            OwnerKind::Challenge,
            challenge_id,
            AccountKind::Frozen,
        )?;
        journal::balance_of(&conn, escrow)
    }

    pub fn get_challenge(
        &self,
        org_id: &str,
        challenge_id: &str,
    ) -> Result<Challenge, LedgerError> {
        let conn = self.conn.lock().unwrap();
        load_challenge(&conn, org_id, challenge_id)
    }
}

/// Close every active challenge of the period. Runs inside the period
/// close transaction; refunds land before the burn step.
pub(crate) fn close_period_challenges(
    conn: &Connection,
    period: &Period,
    now: DateTime<Utc>,
) -> Result<u64, LedgerError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM challenges WHERE period_id = ?1 AND state = 'active'",
        rows::CHALLENGE_COLUMNS
    ))?;
    let active: Vec<rows::RawChallenge> = stmt
        .query_map([&period.period_id], rows::challenge_from_row)?
        .collect::<Result<_, _>>()?;
    drop(stmt);

    let mut closed = 0u64;
    for raw in active {
        let challenge = raw.decode()?;
        close_in_txn(conn, &challenge, now)?;
        closed += 1;
    }
    Ok(closed)
}

/// Close body: refund the remainder and mark closed. Caller holds the
/// transaction and has checked the challenge is active.
fn close_in_txn(
    conn: &Connection,
    challenge: &Challenge,
    now: DateTime<Utc>,
) -> Result<i64, LedgerError> {
    let escrow = journal::account_id(
        conn,
        &challenge.org_id,
        OwnerKind::Challenge,
        &challenge.challenge_id,
        AccountKind::Frozen,
    )?;
    let remaining = journal::balance_of(conn, escrow)?;
    if remaining > 0 {
        let source = funding_account(
            conn,
            &challenge.org_id,
            &challenge.creator_id,
            challenge.funded_from,
        )?;
        journal::move_points(
            conn,
            &challenge.org_id,
            escrow,
            source,
            remaining,
            journal::ops::CHALLENGE_CLOSEOUT,
            &challenge.challenge_id,
            now,
        )?;
    }
    conn.execute(
        "UPDATE challenges SET state = 'closed', closed_at = ?1 WHERE challenge_id = ?2",
        params![now.to_rfc3339(), challenge.challenge_id],
    )?;
    tracing::info!(
        challenge_id = challenge.challenge_id.as_str(),
        returned = remaining,
        "challenge closed"
    );
    Ok(remaining)
}

fn funding_account(
    conn: &Connection,
    org_id: &str,
    creator_id: &str,
    funded_from: FundingSource,
) -> Result<i64, LedgerError> {
    match funded_from {
        FundingSource::Creator => journal::account_id(
            conn,
            org_id,
            OwnerKind::Member,
            creator_id,
            AccountKind::Distribution,
        ),
        FundingSource::Treasury => journal::account_id(
            conn,
            org_id,
            OwnerKind::Org,
            org_id,
            AccountKind::Treasury,
        ),
    }
}

fn load_challenge(
    conn: &Connection,
    org_id: &str,
    challenge_id: &str,
) -> Result<Challenge, LedgerError> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {} FROM challenges WHERE org_id = ?1 AND challenge_id = ?2",
                rows::CHALLENGE_COLUMNS
            ),
            params![org_id, challenge_id],
            rows::challenge_from_row,
        )
        .optional()?;
    match raw {
        Some(raw) => raw.decode(),
        None => Err(LedgerError::ChallengeNotFound {
            challenge_id: challenge_id.to_string(),
        }),
    }
}

fn lookup_by_client_ref(
    conn: &Connection,
    client_ref: &str,
) -> Result<Option<Challenge>, LedgerError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM challenges WHERE client_ref = ?1",
            rows::CHALLENGE_COLUMNS
        ),
        [client_ref],
        rows::challenge_from_row,
    )
    .optional()?
    .map(rows::RawChallenge::decode)
    .transpose()
}

fn lookup_award(
    conn: &Connection,
    challenge_id: &str,
    winner_id: &str,
) -> Result<Option<(String, i64, String)>, LedgerError> {
    Ok(conn
        .query_row(
            "SELECT award_id, amount, awarded_at FROM challenge_awards
             WHERE challenge_id = ?1 AND winner_id = ?2",
            params![challenge_id, winner_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?)
}

fn reuse_creation(
    existing: &Challenge,
    client_ref: &str,
    org_id: &str,
    creator_id: &str,
    title: &str,
    fund: i64,
    funded_from: FundingSource,
) -> Result<ChallengeReceipt, LedgerError> {
    let conflict = |field: &str| LedgerError::ClientRefConflict {
        client_ref: client_ref.to_string(),
        field: field.to_string(),
    };
    if existing.org_id != org_id {
        return Err(conflict("org_id"));
    }
    if existing.creator_id != creator_id {
        return Err(conflict("creator_id"));
    }
    if existing.title != title {
        return Err(conflict("title"));
    }
    if existing.fund_total != fund {
        return Err(conflict("fund"));
    }
    if existing.funded_from != funded_from {
        return Err(conflict("funded_from"));
    }
    Ok(ChallengeReceipt {
        challenge_id: existing.challenge_id.clone(),
        fund_total: existing.fund_total,
        created_at: existing.created_at,
        was_new: false,
    })
}

/// Deterministic award id: identical award requests map to the same id.
fn compute_award_id(challenge_id: &str, winner_id: &str, amount: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenge_id.as_bytes());
    hasher.update(b":");
    hasher.update(winner_id.as_bytes());
    hasher.update(b":");
    hasher.update(amount.to_string().as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
