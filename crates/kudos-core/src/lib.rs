//! Gratitude-points ledger engine.
//!
//! Orgs issue points; members thank each other with reviewed transfers,
//! fund challenges, and spend income in the market. Every movement is a
//! double-entry journal row over typed accounts, so the books always
//! balance: points are minted once by `issue` and conserved everywhere
//! else.
//!
//! The [`Store`] is the engine; [`sweep::Sweeper`] settles grace windows
//! in the background; [`config::LedgerConfig`] carries the tunables.

pub mod account;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod sweep;

// Convenience re-exports
pub use account::{Account, AccountKind, OwnerKind};
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use model::{
    AwardReceipt, BonusReceipt, Challenge, ChallengeReceipt, ChallengeState, CloseChallengeOutcome,
    ClosePeriodOutcome, CreateChallengeParams, DecisionReceipt, FundingSource, IssueReceipt,
    Member, MemberPeriodStat, OpenPeriodOutcome, Period, PeriodState, PurchaseReceipt,
    SubmitParams, SweepOutcome, Transfer, TransferReceipt, TransferStatus,
};
pub use store::{ConservationReport, KindBalance, OrgTotals, Store, StoreStats};
pub use sweep::Sweeper;
