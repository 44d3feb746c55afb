//! In-transaction helpers: account lookup, guards, and journaled
//! balance movements.
//!
//! Every function here expects to run inside an open transaction; the
//! caller owns BEGIN/COMMIT. Movements update both balances and append
//! one journal row, so the journal replays to the exact balances.

use crate::account::{AccountKind, OwnerKind};
use crate::error::LedgerError;
use crate::model::Member;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::rows;

/// Journal op names. The stats and verification queries match on these,
/// so they are constants rather than ad-hoc literals.
pub(crate) mod ops {
    pub const ISSUE: &str = "issue";
    pub const TREASURY_FUND: &str = "treasury.fund";
    pub const EMISSION: &str = "emission";
    pub const TRANSFER_HOLD: &str = "transfer.hold";
    pub const TRANSFER_REFUND: &str = "transfer.refund";
    pub const TRANSFER_RELEASE: &str = "transfer.release";
    pub const CHALLENGE_ESCROW: &str = "challenge.escrow";
    pub const CHALLENGE_AWARD: &str = "challenge.award";
    pub const CHALLENGE_CLOSEOUT: &str = "challenge.closeout";
    pub const BURN: &str = "burn";
    pub const MARKET_PURCHASE: &str = "market.purchase";
    pub const MARKET_REFUND: &str = "market.refund";
    pub const BONUS_CONVERT: &str = "bonus.convert";
}

pub(crate) fn ensure_org(conn: &Connection, org_id: &str) -> Result<(), LedgerError> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM orgs WHERE org_id = ?1", [org_id], |row| {
            row.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(LedgerError::OrgNotFound {
            org_id: org_id.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn get_member(
    conn: &Connection,
    org_id: &str,
    member_id: &str,
) -> Result<Option<Member>, LedgerError> {
    let row = conn
        .query_row(
            "SELECT display_name, is_controller, active FROM members
             WHERE org_id = ?1 AND member_id = ?2",
            params![org_id, member_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;
    Ok(row.map(|(display_name, is_controller, active)| Member {
        org_id: org_id.to_string(),
        member_id: member_id.to_string(),
        display_name,
        is_controller: is_controller != 0,
        active: active != 0,
    }))
}

pub(crate) fn require_member(
    conn: &Connection,
    org_id: &str,
    member_id: &str,
) -> Result<Member, LedgerError> {
    get_member(conn, org_id, member_id)?.ok_or_else(|| LedgerError::MemberNotFound {
        org_id: org_id.to_string(),
        member_id: member_id.to_string(),
    })
}

/// Controllers decide transfers and may award challenges they did not
/// create. Inactive controllers lose the power.
pub(crate) fn require_controller(
    conn: &Connection,
    org_id: &str,
    member_id: &str,
) -> Result<Member, LedgerError> {
    let member = require_member(conn, org_id, member_id)?;
    if !member.active {
        return Err(LedgerError::MemberInactive {
            member_id: member_id.to_string(),
        });
    }
    if !member.is_controller {
        return Err(LedgerError::NotController {
            member_id: member_id.to_string(),
        });
    }
    Ok(member)
}

/// Look up an account id. Accounts are created with their owner, so a
/// missing row is a storage-level inconsistency, not a user error.
pub(crate) fn account_id(
    conn: &Connection,
    org_id: &str,
    owner_kind: OwnerKind,
    owner_id: &str,
    kind: AccountKind,
) -> Result<i64, LedgerError> {
    conn.query_row(
        "SELECT account_id FROM accounts
         WHERE org_id = ?1 AND owner_kind = ?2 AND owner_id = ?3 AND kind = ?4",
        params![org_id, owner_kind.as_str(), owner_id, kind.as_str()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| {
        LedgerError::Database(format!(
            "missing {kind} account for {owner_kind} {owner_id} (org {org_id})"
        ))
    })
}

pub(crate) fn balance_of(conn: &Connection, account: i64) -> Result<i64, LedgerError> {
    Ok(conn.query_row(
        "SELECT balance FROM accounts WHERE account_id = ?1",
        [account],
        |row| row.get(0),
    )?)
}

/// Move `amount` from `debit` to `credit` and journal it.
///
/// The balance guard runs here, inside the caller's write transaction,
/// so two racing movements cannot both spend the same points.
pub(crate) fn move_points(
    conn: &Connection,
    org_id: &str,
    debit: i64,
    credit: i64,
    amount: i64,
    op: &str,
    ref_id: &str,
    at: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let (available, kind): (i64, String) = conn.query_row(
        "SELECT balance, kind FROM accounts WHERE account_id = ?1",
        [debit],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    if available < amount {
        return Err(LedgerError::InsufficientFunds {
            kind: rows::parse_kind(&kind)?,
            requested: amount,
            available,
        });
    }

    conn.execute(
        "UPDATE accounts SET balance = balance - ?1 WHERE account_id = ?2",
        params![amount, debit],
    )?;
    conn.execute(
        "UPDATE accounts SET balance = balance + ?1 WHERE account_id = ?2",
        params![amount, credit],
    )?;
    conn.execute(
        "INSERT INTO entries (org_id, debit_account, credit_account, amount, op, ref_id, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![org_id, debit, credit, amount, op, ref_id, at.to_rfc3339()],
    )?;
    Ok(())
}

/// Credit `amount` with no debit side. Issuance only; every other op
/// must conserve points via [`move_points`].
pub(crate) fn mint_points(
    conn: &Connection,
    org_id: &str,
    credit: i64,
    amount: i64,
    ref_id: &str,
    at: DateTime<Utc>,
) -> Result<(), LedgerError> {
    conn.execute(
        "UPDATE accounts SET balance = balance + ?1 WHERE account_id = ?2",
        params![amount, credit],
    )?;
    conn.execute(
        "INSERT INTO entries (org_id, debit_account, credit_account, amount, op, ref_id, recorded_at)
         VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6)",
        params![org_id, credit, amount, ops::ISSUE, ref_id, at.to_rfc3339()],
    )?;
    Ok(())
}
