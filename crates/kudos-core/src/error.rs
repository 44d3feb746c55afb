//! Ledger errors.

use crate::account::AccountKind;
use crate::model::TransferStatus;
use thiserror::Error;

/// Errors returned by ledger operations.
///
/// Variants carry enough structure for callers to branch on them
/// (e.g. retry on `Database`, surface `InsufficientFunds` to the user).
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("org not found: {org_id}")]
    OrgNotFound { org_id: String },

    #[error("org already exists: {org_id}")]
    OrgExists { org_id: String },

    #[error("member not found: {member_id} (org {org_id})")]
    MemberNotFound { org_id: String, member_id: String },

    #[error("member already exists: {member_id} (org {org_id})")]
    MemberExists { org_id: String, member_id: String },

    #[error("member is deactivated: {member_id}")]
    MemberInactive { member_id: String },

    #[error("{member_id} is not a controller")]
    NotController { member_id: String },

    #[error("transfer not found: {transfer_id}")]
    TransferNotFound { transfer_id: String },

    #[error("challenge not found: {challenge_id}")]
    ChallengeNotFound { challenge_id: String },

    #[error("amount must be positive, got {amount}")]
    InvalidAmount { amount: i64 },

    #[error("amount {amount} exceeds the per-transfer cap of {cap}")]
    AmountAboveCap { amount: i64, cap: i64 },

    #[error(
        "insufficient funds in {kind} account: requested {requested}, available {available}"
    )]
    InsufficientFunds {
        kind: AccountKind,
        requested: i64,
        available: i64,
    },

    #[error("cannot send points to yourself")]
    SelfTransfer,

    #[error("challenge creators cannot win their own challenge")]
    SelfAward,

    #[error("transfer {transfer_id} is {status}, cannot {attempted}")]
    StatusConflict {
        transfer_id: String,
        status: TransferStatus,
        attempted: &'static str,
    },

    #[error("client_ref {client_ref} already submitted with different {field}")]
    ClientRefConflict { client_ref: String, field: String },

    #[error("no open period for org {org_id}")]
    NoOpenPeriod { org_id: String },

    #[error("org {org_id} already has an open period ({label})")]
    PeriodAlreadyOpen { org_id: String, label: String },

    #[error("period not found: {label} (org {org_id})")]
    PeriodNotFound { org_id: String, label: String },

    #[error("period {label} is already closed")]
    PeriodClosed { label: String },

    #[error("challenge {challenge_id} is closed")]
    ChallengeClosed { challenge_id: String },

    #[error("award of {requested} exceeds remaining challenge fund of {remaining}")]
    AwardExceedsFund { remaining: i64, requested: i64 },

    #[error("winner already awarded with a different amount: stored {stored}, requested {requested}")]
    AwardConflict { stored: i64, requested: i64 },

    #[error("order not found: {order_ref}")]
    OrderNotFound { order_ref: String },

    #[error("order_ref {order_ref} already used with different {field}")]
    OrderConflict { order_ref: String, field: String },

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}
