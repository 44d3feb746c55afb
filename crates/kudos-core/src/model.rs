//! Domain types: transfers, periods, challenges, receipts.
//!
//! Receipts follow one convention: `was_new` is true for the write that
//! actually changed state and false for an idempotent retry, so callers
//! can avoid emitting duplicate side effects (notifications, logs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transfer status state machine.
///
/// ```text
/// Waiting ──approve──▶ Approved ──realize──▶ Realized
///    │
///    └────decline──▶ Declined
/// ```
///
/// There are no other edges. Repeating a transition a transfer has
/// already taken is an idempotent no-op; a conflicting transition is a
/// `StatusConflict` error.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Submitted, amount held in the sender's frozen account.
    Waiting,
    /// Confirmed by a controller (or by the grace sweep). Funds stay
    /// frozen until realization.
    Approved,
    /// Rejected; the hold was refunded to the sender.
    Declined,
    /// Settled; the hold was released to the recipient's income.
    Realized,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Waiting => "waiting",
            TransferStatus::Approved => "approved",
            TransferStatus::Declined => "declined",
            TransferStatus::Realized => "realized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(TransferStatus::Waiting),
            "approved" => Some(TransferStatus::Approved),
            "declined" => Some(TransferStatus::Declined),
            "realized" => Some(TransferStatus::Realized),
            _ => None,
        }
    }

    /// Terminal states cannot move again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Declined | TransferStatus::Realized)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member of an org.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Member {
    pub org_id: String,
    pub member_id: String,
    pub display_name: String,
    pub is_controller: bool,
    pub active: bool,
}

/// One thanks transfer.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Transfer {
    pub transfer_id: String,
    pub org_id: String,
    pub period_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub amount: i64,
    pub reason: Option<String>,
    pub client_ref: Option<String>,
    pub status: TransferStatus,
    pub submitted_at: DateTime<Utc>,
    pub grace_until: DateTime<Utc>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    /// True when the grace sweep approved this transfer (no controller
    /// ever looked at it).
    pub auto_confirmed: bool,
    pub realized_at: Option<DateTime<Utc>>,
}

/// Parameters for submitting a transfer.
#[derive(Debug, Clone)]
pub struct SubmitParams<'a> {
    pub org_id: &'a str,
    pub sender_id: &'a str,
    pub recipient_id: &'a str,
    pub amount: i64,
    pub reason: Option<&'a str>,
    /// Caller-chosen idempotency key. Resubmitting with the same ref and
    /// the same fields returns the original receipt.
    pub client_ref: Option<&'a str>,
}

/// Receipt for a submitted transfer.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transfer_id: String,
    pub status: TransferStatus,
    pub amount: i64,
    pub submitted_at: DateTime<Utc>,
    pub grace_until: DateTime<Utc>,
    /// False when an identical submission already existed (idempotent retry).
    pub was_new: bool,
}

/// Receipt for approve/decline/realize.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DecisionReceipt {
    pub transfer_id: String,
    pub status: TransferStatus,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    /// False when the transfer had already taken this transition.
    pub was_new: bool,
}

/// Outcome of one grace sweep.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Waiting transfers past their grace window flipped to approved.
    pub auto_approved: u64,
    /// Approved transfers settled to the recipient's income.
    pub realized: u64,
    pub swept_at: DateTime<Utc>,
}

impl SweepOutcome {
    pub fn is_noop(&self) -> bool {
        self.auto_approved == 0 && self.realized == 0
    }
}

/// Where a challenge fund was escrowed from (and returns to on close).
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FundingSource {
    /// The creator's own distribution account.
    Creator,
    /// The org treasury.
    Treasury,
}

impl FundingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundingSource::Creator => "creator",
            FundingSource::Treasury => "treasury",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creator" => Some(FundingSource::Creator),
            "treasury" => Some(FundingSource::Treasury),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    Active,
    Closed,
}

impl ChallengeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeState::Active => "active",
            ChallengeState::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ChallengeState::Active),
            "closed" => Some(ChallengeState::Closed),
            _ => None,
        }
    }
}

/// A challenge with an escrowed prize fund.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Challenge {
    pub challenge_id: String,
    pub org_id: String,
    pub period_id: String,
    pub creator_id: String,
    pub title: String,
    pub fund_total: i64,
    pub funded_from: FundingSource,
    pub state: ChallengeState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Parameters for creating a challenge.
#[derive(Debug, Clone)]
pub struct CreateChallengeParams<'a> {
    pub org_id: &'a str,
    pub creator_id: &'a str,
    pub title: &'a str,
    pub fund: i64,
    pub funded_from: FundingSource,
    pub client_ref: Option<&'a str>,
}

/// Receipt for a created challenge.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ChallengeReceipt {
    pub challenge_id: String,
    pub fund_total: i64,
    pub created_at: DateTime<Utc>,
    pub was_new: bool,
}

/// Receipt for a challenge award.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AwardReceipt {
    /// Content-addressed: identical retries map to the same id.
    pub award_id: String,
    pub challenge_id: String,
    pub winner_id: String,
    pub amount: i64,
    pub escrow_remaining: i64,
    pub awarded_at: DateTime<Utc>,
    pub was_new: bool,
}

/// Outcome of closing a challenge.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CloseChallengeOutcome {
    pub challenge_id: String,
    /// Leftover escrow refunded to the funding source.
    pub returned: i64,
    pub was_new: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PeriodState {
    Open,
    Closed,
}

impl PeriodState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodState::Open => "open",
            PeriodState::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(PeriodState::Open),
            "closed" => Some(PeriodState::Closed),
            _ => None,
        }
    }
}

/// One accounting period (typically a month).
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Period {
    pub period_id: String,
    pub org_id: String,
    pub label: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub state: PeriodState,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Outcome of opening a period.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct OpenPeriodOutcome {
    pub period_id: String,
    pub label: String,
    /// Points emitted from system into member distribution accounts.
    pub emitted_total: i64,
    pub members_credited: u64,
}

/// Outcome of closing a period.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ClosePeriodOutcome {
    pub period_id: String,
    pub label: String,
    /// Waiting transfers past grace that the final sweep auto-approved.
    pub auto_approved: u64,
    /// Approved transfers settled during close.
    pub realized: u64,
    /// Waiting transfers still inside grace, declined and refunded.
    pub declined: u64,
    pub challenges_closed: u64,
    /// Unspent distribution points moved to the burnt account.
    pub burnt_total: i64,
    pub stats_rows: u64,
}

/// Per-member aggregates for one period.
///
/// `auto_confirmed_total` counts the realized amount of the member's
/// *sent* transfers that the sweep approved without a controller.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct MemberPeriodStat {
    pub member_id: String,
    pub sent_total: i64,
    pub received_total: i64,
    pub declined_total: i64,
    pub auto_confirmed_total: i64,
    pub awarded_total: i64,
    pub burnt_total: i64,
}

/// Receipt for issuance into the org system account.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct IssueReceipt {
    pub org_id: String,
    pub amount: i64,
    /// Lifetime total issued to this org, including this issuance.
    pub issued_total: i64,
}

/// Receipt for a market purchase (or its refund).
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub org_id: String,
    pub member_id: String,
    pub order_ref: String,
    pub amount: i64,
    pub recorded_at: DateTime<Utc>,
    pub was_new: bool,
}

/// Receipt for an income-to-bonus conversion.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct BonusReceipt {
    pub org_id: String,
    pub member_id: String,
    pub amount: i64,
    pub bonus_balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_roundtrip() {
        for status in [
            TransferStatus::Waiting,
            TransferStatus::Approved,
            TransferStatus::Declined,
            TransferStatus::Realized,
        ] {
            assert_eq!(TransferStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TransferStatus::parse("pending"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!TransferStatus::Waiting.is_terminal());
        assert!(!TransferStatus::Approved.is_terminal());
        assert!(TransferStatus::Declined.is_terminal());
        assert!(TransferStatus::Realized.is_terminal());
    }

    #[test]
    fn funding_source_roundtrip() {
        assert_eq!(FundingSource::parse("creator"), Some(FundingSource::Creator));
        assert_eq!(
            FundingSource::parse("treasury"),
            Some(FundingSource::Treasury)
        );
        assert_eq!(FundingSource::parse("sponsor"), None);
    }

    #[test]
    fn sweep_outcome_noop() {
        let outcome = SweepOutcome {
            auto_approved: 0,
            realized: 0,
            swept_at: Utc::now(),
        };
        assert!(outcome.is_noop());
    }
}
