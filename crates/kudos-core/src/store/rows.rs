//! Row decoding: stored text back into typed values.
//!
//! Stored enums and timestamps were written by this crate, so a value
//! that fails to parse means a corrupt or foreign database; we surface
//! that as `Database` rather than panicking.

use crate::account::{AccountKind, OwnerKind};
use crate::error::LedgerError;
use crate::model::{
    Challenge, ChallengeState, FundingSource, Period, PeriodState, Transfer, TransferStatus,
};
use chrono::{DateTime, Utc};
use rusqlite::Row;

pub(crate) fn parse_kind(s: &str) -> Result<AccountKind, LedgerError> {
    AccountKind::parse(s)
        .ok_or_else(|| LedgerError::Database(format!("unknown account kind: {s}")))
}

pub(crate) fn parse_owner(s: &str) -> Result<OwnerKind, LedgerError> {
    OwnerKind::parse(s).ok_or_else(|| LedgerError::Database(format!("unknown owner kind: {s}")))
}

pub(crate) fn parse_status(s: &str) -> Result<TransferStatus, LedgerError> {
    TransferStatus::parse(s)
        .ok_or_else(|| LedgerError::Database(format!("unknown transfer status: {s}")))
}

pub(crate) fn parse_period_state(s: &str) -> Result<PeriodState, LedgerError> {
    PeriodState::parse(s)
        .ok_or_else(|| LedgerError::Database(format!("unknown period state: {s}")))
}

pub(crate) fn parse_challenge_state(s: &str) -> Result<ChallengeState, LedgerError> {
    ChallengeState::parse(s)
        .ok_or_else(|| LedgerError::Database(format!("unknown challenge state: {s}")))
}

pub(crate) fn parse_funding(s: &str) -> Result<FundingSource, LedgerError> {
    FundingSource::parse(s)
        .ok_or_else(|| LedgerError::Database(format!("unknown funding source: {s}")))
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Database(format!("invalid timestamp {s}: {e}")))
}

pub(crate) fn parse_ts_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, LedgerError> {
    s.map(|s| parse_ts(&s)).transpose()
}

/// Decode one `transfers` row selected with [`TRANSFER_COLUMNS`].
pub(crate) const TRANSFER_COLUMNS: &str = "transfer_id, org_id, period_id, sender_id, \
     recipient_id, amount, reason, client_ref, status, submitted_at, grace_until, \
     decided_by, decided_at, auto_confirmed, realized_at";

pub(crate) fn transfer_from_row(row: &Row<'_>) -> rusqlite::Result<RawTransfer> {
    Ok(RawTransfer {
        transfer_id: row.get(0)?,
        org_id: row.get(1)?,
        period_id: row.get(2)?,
        sender_id: row.get(3)?,
        recipient_id: row.get(4)?,
        amount: row.get(5)?,
        reason: row.get(6)?,
        client_ref: row.get(7)?,
        status: row.get(8)?,
        submitted_at: row.get(9)?,
        grace_until: row.get(10)?,
        decided_by: row.get(11)?,
        decided_at: row.get(12)?,
        auto_confirmed: row.get(13)?,
        realized_at: row.get(14)?,
    })
}

/// Text-level transfer row; decoded into a [`Transfer`] outside the
/// rusqlite closure so parse failures become `LedgerError`.
pub(crate) struct RawTransfer {
    pub transfer_id: String,
    pub org_id: String,
    pub period_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub amount: i64,
    pub reason: Option<String>,
    pub client_ref: Option<String>,
    pub status: String,
    pub submitted_at: String,
    pub grace_until: String,
    pub decided_by: Option<String>,
    pub decided_at: Option<String>,
    pub auto_confirmed: i64,
    pub realized_at: Option<String>,
}

impl RawTransfer {
    pub(crate) fn decode(self) -> Result<Transfer, LedgerError> {
        Ok(Transfer {
            transfer_id: self.transfer_id,
            org_id: self.org_id,
            period_id: self.period_id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            amount: self.amount,
            reason: self.reason,
            client_ref: self.client_ref,
            status: parse_status(&self.status)?,
            submitted_at: parse_ts(&self.submitted_at)?,
            grace_until: parse_ts(&self.grace_until)?,
            decided_by: self.decided_by,
            decided_at: parse_ts_opt(self.decided_at)?,
            auto_confirmed: self.auto_confirmed != 0,
            realized_at: parse_ts_opt(self.realized_at)?,
        })
    }
}

pub(crate) const PERIOD_COLUMNS: &str =
    "period_id, org_id, label, starts_at, ends_at, state, opened_at, closed_at";

pub(crate) fn period_from_row(row: &Row<'_>) -> rusqlite::Result<RawPeriod> {
    Ok(RawPeriod {
        period_id: row.get(0)?,
        org_id: row.get(1)?,
        label: row.get(2)?,
        starts_at: row.get(3)?,
        ends_at: row.get(4)?,
        state: row.get(5)?,
        opened_at: row.get(6)?,
        closed_at: row.get(7)?,
    })
}

pub(crate) struct RawPeriod {
    pub period_id: String,
    pub org_id: String,
    pub label: String,
    pub starts_at: String,
    pub ends_at: String,
    pub state: String,
    pub opened_at: String,
    pub closed_at: Option<String>,
}

impl RawPeriod {
    pub(crate) fn decode(self) -> Result<Period, LedgerError> {
        Ok(Period {
            period_id: self.period_id,
            org_id: self.org_id,
            label: self.label,
            starts_at: parse_ts(&self.starts_at)?,
            ends_at: parse_ts(&self.ends_at)?,
            state: parse_period_state(&self.state)?,
            opened_at: parse_ts(&self.opened_at)?,
            closed_at: parse_ts_opt(self.closed_at)?,
        })
    }
}

pub(crate) const CHALLENGE_COLUMNS: &str = "challenge_id, org_id, period_id, creator_id, \
     title, fund_total, funded_from, state, created_at, closed_at";

pub(crate) fn challenge_from_row(row: &Row<'_>) -> rusqlite::Result<RawChallenge> {
    Ok(RawChallenge {
        challenge_id: row.get(0)?,
        org_id: row.get(1)?,
        period_id: row.get(2)?,
        creator_id: row.get(3)?,
        title: row.get(4)?,
        fund_total: row.get(5)?,
        funded_from: row.get(6)?,
        state: row.get(7)?,
        created_at: row.get(8)?,
        closed_at: row.get(9)?,
    })
}

pub(crate) struct RawChallenge {
    pub challenge_id: String,
    pub org_id: String,
    pub period_id: String,
    pub creator_id: String,
    pub title: String,
    pub fund_total: i64,
    pub funded_from: String,
    pub state: String,
    pub created_at: String,
    pub closed_at: Option<String>,
}

impl RawChallenge {
    pub(crate) fn decode(self) -> Result<Challenge, LedgerError> {
        Ok(Challenge {
            challenge_id: self.challenge_id,
            org_id: self.org_id,
            period_id: self.period_id,
            creator_id: self.creator_id,
            title: self.title,
            fund_total: self.fund_total,
            funded_from: parse_funding(&self.funded_from)?,
            state: parse_challenge_state(&self.state)?,
            created_at: parse_ts(&self.created_at)?,
            closed_at: parse_ts_opt(self.closed_at)?,
        })
    }
}
