//! Transfer lifecycle: submit, approve, decline, realize, sweep.
//!
//! Submission holds the amount in the sender's frozen account. A
//! controller decision (or the grace sweep) moves the status; points
//! only leave frozen on decline (refund) or realize (release to the
//! recipient's income). Every path runs inside one write transaction.

use super::{journal, periods, rows, Store};
use crate::account::{AccountKind, OwnerKind};
use crate::error::LedgerError;
use crate::model::{
    DecisionReceipt, SubmitParams, SweepOutcome, Transfer, TransferReceipt, TransferStatus,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

impl Store {
    /// Submit a transfer: hold the amount and open the grace window.
    ///
    /// With a `client_ref`, resubmission of the identical request returns
    /// the original receipt with `was_new = false`; a resubmission whose
    /// fields differ is rejected with [`LedgerError::ClientRefConflict`].
    pub fn submit_transfer(
        &self,
        params: SubmitParams<'_>,
    ) -> Result<TransferReceipt, LedgerError> {
        let SubmitParams {
            org_id,
            sender_id,
            recipient_id,
            amount,
            reason,
            client_ref,
        } = params;

        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        if let Some(cap) = self.config().max_transfer {
            if amount > cap {
                return Err(LedgerError::AmountAboveCap { amount, cap });
            }
        }
        if sender_id == recipient_id {
            return Err(LedgerError::SelfTransfer);
        }
        let grace = self.config().grace_period();

        self.with_txn(|conn| {
            journal::ensure_org(conn, org_id)?;
            let sender = journal::require_member(conn, org_id, sender_id)?;
            if !sender.active {
                return Err(LedgerError::MemberInactive {
                    member_id: sender_id.to_string(),
                });
            }
            // Recipients may be inactive; they can still receive.
            journal::require_member(conn, org_id, recipient_id)?;
            let period_id = periods::open_period_id(conn, org_id)?;

            if let Some(client_ref) = client_ref {
                if let Some(existing) = lookup_by_client_ref(conn, client_ref)? {
                    return reuse_submission(
                        &existing,
                        client_ref,
                        org_id,
                        sender_id,
                        recipient_id,
                        amount,
                        reason,
                    );
                }
            }

            let now = Utc::now();
            let grace_until = now + grace;
            let transfer_id = Uuid::new_v4().to_string();

            let distribution = journal::account_id(
                conn,
                org_id,
                OwnerKind::Member,
                sender_id,
                AccountKind::Distribution,
            )?;
            let frozen = journal::account_id(
                conn,
                org_id,
                OwnerKind::Member,
                sender_id,
                AccountKind::Frozen,
            )?;
            journal::move_points(
                conn,
                org_id,
                distribution,
                frozen,
                amount,
                journal::ops::TRANSFER_HOLD,
                &transfer_id,
                now,
            )?;

            conn.execute(
                "INSERT INTO transfers (transfer_id, org_id, period_id, sender_id, recipient_id,
                                        amount, reason, client_ref, submitted_at, grace_until)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    transfer_id,
                    org_id,
                    period_id,
                    sender_id,
                    recipient_id,
                    amount,
                    reason,
                    client_ref,
                    now.to_rfc3339(),
                    grace_until.to_rfc3339()
                ],
            )?;

            tracing::info!(
                org_id,
                transfer_id,
                sender_id,
                recipient_id,
                amount,
                "transfer submitted"
            );
            Ok(TransferReceipt {
                transfer_id,
                status: TransferStatus::Waiting,
                amount,
                submitted_at: now,
                grace_until,
                was_new: true,
            })
        })
    }

    /// Approve a waiting transfer. The hold stays frozen until the next
    /// sweep (or period close) realizes it.
    pub fn approve_transfer(
        &self,
        org_id: &str,
        transfer_id: &str,
        decided_by: &str,
    ) -> Result<DecisionReceipt, LedgerError> {
        self.with_txn(|conn| {
            let transfer = load_transfer(conn, org_id, transfer_id)?;
            journal::require_controller(conn, org_id, decided_by)?;

            match transfer.status {
                TransferStatus::Waiting => {
                    let now = Utc::now();
                    conn.execute(
                        "UPDATE transfers SET status = 'approved', decided_by = ?1, decided_at = ?2
                         WHERE transfer_id = ?3",
                        params![decided_by, now.to_rfc3339(), transfer_id],
                    )?;
                    tracing::info!(org_id, transfer_id, decided_by, "transfer approved");
                    Ok(DecisionReceipt {
                        transfer_id: transfer_id.to_string(),
                        status: TransferStatus::Approved,
                        decided_by: Some(decided_by.to_string()),
                        decided_at: Some(now),
                        was_new: true,
                    })
                }
                // Approve after approve (or after realization) is a retry.
                TransferStatus::Approved | TransferStatus::Realized => Ok(DecisionReceipt {
                    transfer_id: transfer_id.to_string(),
                    status: transfer.status,
                    decided_by: transfer.decided_by,
                    decided_at: transfer.decided_at,
                    was_new: false,
                }),
                TransferStatus::Declined => Err(LedgerError::StatusConflict {
                    transfer_id: transfer_id.to_string(),
                    status: transfer.status,
                    attempted: "approve",
                }),
            }
        })
    }

    /// Decline a waiting transfer and refund the hold to the sender's
    /// distribution account.
    pub fn decline_transfer(
        &self,
        org_id: &str,
        transfer_id: &str,
        decided_by: &str,
    ) -> Result<DecisionReceipt, LedgerError> {
        self.with_txn(|conn| {
            let transfer = load_transfer(conn, org_id, transfer_id)?;
            journal::require_controller(conn, org_id, decided_by)?;

            match transfer.status {
                TransferStatus::Waiting => {
                    let now = Utc::now();
                    refund_hold(conn, &transfer, now)?;
                    conn.execute(
                        "UPDATE transfers SET status = 'declined', decided_by = ?1, decided_at = ?2
                         WHERE transfer_id = ?3",
                        params![decided_by, now.to_rfc3339(), transfer_id],
                    )?;
                    tracing::info!(org_id, transfer_id, decided_by, "transfer declined");
                    Ok(DecisionReceipt {
                        transfer_id: transfer_id.to_string(),
                        status: TransferStatus::Declined,
                        decided_by: Some(decided_by.to_string()),
                        decided_at: Some(now),
                        was_new: true,
                    })
                }
                TransferStatus::Declined => Ok(DecisionReceipt {
                    transfer_id: transfer_id.to_string(),
                    status: transfer.status,
                    decided_by: transfer.decided_by,
                    decided_at: transfer.decided_at,
                    was_new: false,
                }),
                TransferStatus::Approved | TransferStatus::Realized => {
                    Err(LedgerError::StatusConflict {
                        transfer_id: transfer_id.to_string(),
                        status: transfer.status,
                        attempted: "decline",
                    })
                }
            }
        })
    }

    /// Settle an approved transfer: release the hold into the
    /// recipient's income account.
    pub fn realize_transfer(
        &self,
        org_id: &str,
        transfer_id: &str,
    ) -> Result<DecisionReceipt, LedgerError> {
        self.with_txn(|conn| {
            let transfer = load_transfer(conn, org_id, transfer_id)?;
            match transfer.status {
                TransferStatus::Approved => {
                    let now = Utc::now();
                    release_hold(conn, &transfer, now)?;
                    Ok(DecisionReceipt {
                        transfer_id: transfer_id.to_string(),
                        status: TransferStatus::Realized,
                        decided_by: transfer.decided_by,
                        decided_at: transfer.decided_at,
                        was_new: true,
                    })
                }
                TransferStatus::Realized => Ok(DecisionReceipt {
                    transfer_id: transfer_id.to_string(),
                    status: transfer.status,
                    decided_by: transfer.decided_by,
                    decided_at: transfer.decided_at,
                    was_new: false,
                }),
                TransferStatus::Waiting | TransferStatus::Declined => {
                    Err(LedgerError::StatusConflict {
                        transfer_id: transfer_id.to_string(),
                        status: transfer.status,
                        attempted: "realize",
                    })
                }
            }
        })
    }

    /// One sweep pass, all orgs, one transaction: auto-approve waiting
    /// transfers whose grace window has passed, then realize everything
    /// approved.
    pub fn sweep_due(&self, now: DateTime<Utc>) -> Result<SweepOutcome, LedgerError> {
        self.with_txn(|conn| {
            let outcome = sweep_in_txn(conn, None, now)?;
            if !outcome.is_noop() {
                tracing::info!(
                    auto_approved = outcome.auto_approved,
                    realized = outcome.realized,
                    "sweep settled transfers"
                );
            }
            Ok(outcome)
        })
    }

    pub fn get_transfer(&self, org_id: &str, transfer_id: &str) -> Result<Transfer, LedgerError> {
        let conn = self.conn.lock().unwrap();
        load_transfer(&conn, org_id, transfer_id)
    }

    /// Transfers of one org, oldest first, optionally narrowed to one
    /// period and/or one status.
    pub fn list_transfers(
        &self,
        org_id: &str,
        period_id: Option<&str>,
        status: Option<TransferStatus>,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        journal::ensure_org(&conn, org_id)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transfers WHERE org_id = ?1
               AND (?2 IS NULL OR period_id = ?2)
               AND (?3 IS NULL OR status = ?3)
             ORDER BY submitted_at, transfer_id",
            rows::TRANSFER_COLUMNS
        ))?;
        let raws: Vec<rows::RawTransfer> = stmt
            .query_map(
                params![org_id, period_id, status.map(|s| s.as_str())],
                rows::transfer_from_row,
            )?
            .collect::<Result<_, _>>()?;
        raws.into_iter().map(rows::RawTransfer::decode).collect()
    }
}

/// Sweep body, callable from period close as well. `org` restricts the
/// pass to one org; `None` sweeps everything.
pub(crate) fn sweep_in_txn(
    conn: &Connection,
    org: Option<&str>,
    now: DateTime<Utc>,
) -> Result<SweepOutcome, LedgerError> {
    // RFC 3339 UTC text compares lexicographically in time order.
    let auto_approved = conn.execute(
        "UPDATE transfers SET status = 'approved', auto_confirmed = 1, decided_at = ?1
         WHERE status = 'waiting' AND grace_until <= ?1
           AND (?2 IS NULL OR org_id = ?2)",
        params![now.to_rfc3339(), org],
    )? as u64;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transfers WHERE status = 'approved'
           AND (?1 IS NULL OR org_id = ?1)
         ORDER BY submitted_at, transfer_id",
        rows::TRANSFER_COLUMNS
    ))?;
    let approved: Vec<rows::RawTransfer> = stmt
        .query_map(params![org], rows::transfer_from_row)?
        .collect::<Result<_, _>>()?;
    drop(stmt);

    let mut realized = 0u64;
    for raw in approved {
        let transfer = raw.decode()?;
        release_hold(conn, &transfer, now)?;
        realized += 1;
    }

    Ok(SweepOutcome {
        auto_approved,
        realized,
        swept_at: now,
    })
}

fn load_transfer(
    conn: &Connection,
    org_id: &str,
    transfer_id: &str,
) -> Result<Transfer, LedgerError> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {} FROM transfers WHERE org_id = ?1 AND transfer_id = ?2",
                rows::TRANSFER_COLUMNS
            ),
            params![org_id, transfer_id],
            rows::transfer_from_row,
        )
        .optional()?;
    match raw {
        Some(raw) => raw.decode(),
        None => Err(LedgerError::TransferNotFound {
            transfer_id: transfer_id.to_string(),
        }),
    }
}

fn lookup_by_client_ref(
    conn: &Connection,
    client_ref: &str,
) -> Result<Option<Transfer>, LedgerError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM transfers WHERE client_ref = ?1",
            rows::TRANSFER_COLUMNS
        ),
        [client_ref],
        rows::transfer_from_row,
    )
    .optional()?
    .map(rows::RawTransfer::decode)
    .transpose()
}

/// A stored submission with this `client_ref` already exists: verify the
/// retry matches it field by field, then hand back the original receipt.
fn reuse_submission(
    existing: &Transfer,
    client_ref: &str,
    org_id: &str,
    sender_id: &str,
    recipient_id: &str,
    amount: i64,
    reason: Option<&str>,
) -> Result<TransferReceipt, LedgerError> {
    let conflict = |field: &str| LedgerError::ClientRefConflict {
        client_ref: client_ref.to_string(),
        field: field.to_string(),
    };
    if existing.org_id != org_id {
        return Err(conflict("org_id"));
    }
    if existing.sender_id != sender_id {
        return Err(conflict("sender_id"));
    }
    if existing.recipient_id != recipient_id {
        return Err(conflict("recipient_id"));
    }
    if existing.amount != amount {
        return Err(conflict("amount"));
    }
    if existing.reason.as_deref() != reason {
        return Err(conflict("reason"));
    }
    Ok(TransferReceipt {
        transfer_id: existing.transfer_id.clone(),
        status: existing.status,
        amount: existing.amount,
        submitted_at: existing.submitted_at,
        grace_until: existing.grace_until,
        was_new: false,
    })
}

/// Refund the hold: sender frozen back to sender distribution.
pub(crate) fn refund_hold(
    conn: &Connection,
    transfer: &Transfer,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let frozen = journal::account_id(
        conn,
        &transfer.org_id,
        OwnerKind::Member,
        &transfer.sender_id,
        AccountKind::Frozen,
    )?;
    let distribution = journal::account_id(
        conn,
        &transfer.org_id,
        OwnerKind::Member,
        &transfer.sender_id,
        AccountKind::Distribution,
    )?;
    journal::move_points(
        conn,
        &transfer.org_id,
        frozen,
        distribution,
        transfer.amount,
        journal::ops::TRANSFER_REFUND,
        &transfer.transfer_id,
        now,
    )
}

/// Release the hold: sender frozen to recipient income, and mark the
/// transfer realized.
fn release_hold(
    conn: &Connection,
    transfer: &Transfer,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let frozen = journal::account_id(
        conn,
        &transfer.org_id,
        OwnerKind::Member,
        &transfer.sender_id,
        AccountKind::Frozen,
    )?;
    let income = journal::account_id(
        conn,
        &transfer.org_id,
        OwnerKind::Member,
        &transfer.recipient_id,
        AccountKind::Income,
    )?;
    journal::move_points(
        conn,
        &transfer.org_id,
        frozen,
        income,
        transfer.amount,
        journal::ops::TRANSFER_RELEASE,
        &transfer.transfer_id,
        now,
    )?;
    conn.execute(
        "UPDATE transfers SET status = 'realized', realized_at = ?1 WHERE transfer_id = ?2",
        params![now.to_rfc3339(), transfer.transfer_id],
    )?;
    Ok(())
}
