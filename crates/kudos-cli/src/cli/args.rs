use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use kudos_core::FundingSource;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kudos",
    version,
    about = "Gratitude-points ledger — typed accounts, reviewed transfers, burn-at-close periods"
)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the ledger database and the organization
    Init(InitArgs),
    /// Manage members
    Member(MemberArgs),
    /// Mint points into the org's system account
    Issue(IssueArgs),
    /// Move points from the system account into the treasury
    Treasury(TreasuryArgs),
    /// Open, close, and list distribution periods
    Period(PeriodArgs),
    /// Send gratitude points to a colleague
    Send(SendArgs),
    /// Approve a waiting transfer
    Approve(DecisionArgs),
    /// Decline a waiting transfer and refund the hold
    Decline(DecisionArgs),
    /// Settle an approved transfer into the recipient's income
    Realize(RealizeArgs),
    /// Settle transfers whose grace window has passed
    Sweep(SweepArgs),
    /// Create, award, and close challenges
    Challenge(ChallengeArgs),
    /// Spend income in the marketplace
    Purchase(PurchaseArgs),
    /// Refund a marketplace purchase
    Refund(RefundArgs),
    /// Convert income into bonus points
    Bonus(BonusArgs),
    /// Show account balances for a member or the org
    Balance(BalanceArgs),
    /// Per-member statistics for a period
    Summary(SummaryArgs),
    /// Check that issued points equal the sum of all balances
    Verify(VerifyArgs),
    /// Store row counts and size
    Stats(StatsArgs),
    Version,
}

/// Database/org/config flags shared by every command.
#[derive(clap::Args, Clone, Debug)]
pub struct StoreArgs {
    /// Path to the ledger database
    #[arg(long, env = "KUDOS_DB", default_value = ".kudos/ledger.db", global = true)]
    pub db: PathBuf,

    /// Organization id
    #[arg(long, env = "KUDOS_ORG", default_value = "default", global = true)]
    pub org: String,

    /// YAML file with ledger tunables (grace period, emission, ...)
    #[arg(long, env = "KUDOS_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Who pays a challenge fund.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum FundingArg {
    /// Escrow from the creator's distribution balance
    #[default]
    Creator,
    /// Escrow from the org treasury (controllers only)
    Treasury,
}

impl From<FundingArg> for FundingSource {
    fn from(arg: FundingArg) -> Self {
        match arg {
            FundingArg::Creator => FundingSource::Creator,
            FundingArg::Treasury => FundingSource::Treasury,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Display name for the organization (defaults to the org id)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct MemberArgs {
    #[command(subcommand)]
    pub cmd: MemberSub,
}

#[derive(Subcommand, Debug)]
pub enum MemberSub {
    /// Add a member (their four accounts are created with them)
    Add(MemberAddArgs),
    /// List members
    List(MemberListArgs),
    /// Deactivate a member; balances and history stay
    Deactivate(MemberIdArgs),
    /// Reactivate a member
    Reactivate(MemberIdArgs),
}

#[derive(clap::Args, Debug)]
pub struct MemberAddArgs {
    pub member_id: String,

    /// Display name (defaults to the id)
    #[arg(long)]
    pub name: Option<String>,

    /// Controllers review transfers and may spend the treasury
    #[arg(long)]
    pub controller: bool,
}

#[derive(clap::Args, Debug)]
pub struct MemberListArgs {
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub struct MemberIdArgs {
    pub member_id: String,
}

#[derive(clap::Args, Debug)]
pub struct IssueArgs {
    /// Points to mint
    pub amount: i64,
}

#[derive(clap::Args, Debug)]
pub struct TreasuryArgs {
    /// Points to move into the treasury
    pub amount: i64,
}

#[derive(clap::Args, Debug)]
pub struct PeriodArgs {
    #[command(subcommand)]
    pub cmd: PeriodSub,
}

#[derive(Subcommand, Debug)]
pub enum PeriodSub {
    /// Open a period and emit distribution points to active members
    Open(PeriodOpenArgs),
    /// Close the open period: sweep, decline leftovers, close challenges, burn
    Close(PeriodCloseArgs),
    /// List periods
    List(PeriodListArgs),
}

#[derive(clap::Args, Debug)]
pub struct PeriodOpenArgs {
    /// Period label, e.g. "2026-08"
    pub label: String,

    /// Period start (RFC 3339); defaults to now
    #[arg(long)]
    pub starts: Option<DateTime<Utc>>,

    /// Period end (RFC 3339); defaults to start + --days
    #[arg(long)]
    pub ends: Option<DateTime<Utc>>,

    /// Period length in days when --ends is not given
    #[arg(long, default_value_t = 31)]
    pub days: i64,
}

#[derive(clap::Args, Debug)]
pub struct PeriodCloseArgs {
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub struct PeriodListArgs {
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// Sending member
    pub sender: String,

    /// Receiving member
    pub recipient: String,

    /// Points to send
    pub amount: i64,

    /// Why the thanks is deserved
    #[arg(long)]
    pub reason: Option<String>,

    /// Idempotency key; resubmitting the same ref returns the original transfer
    #[arg(long)]
    pub client_ref: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DecisionArgs {
    pub transfer_id: String,

    /// Controller making the decision
    #[arg(long)]
    pub by: String,
}

#[derive(clap::Args, Debug)]
pub struct RealizeArgs {
    pub transfer_id: String,
}

#[derive(clap::Args, Debug)]
pub struct SweepArgs {
    /// Keep sweeping on an interval until interrupted
    #[arg(long)]
    pub watch: bool,

    /// Seconds between sweeps in watch mode (defaults to the config value)
    #[arg(long)]
    pub interval: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct ChallengeArgs {
    #[command(subcommand)]
    pub cmd: ChallengeSub,
}

#[derive(Subcommand, Debug)]
pub enum ChallengeSub {
    /// Create a challenge with an escrowed prize fund
    Create(ChallengeCreateArgs),
    /// Award part of the fund to a winner
    Award(ChallengeAwardArgs),
    /// Close a challenge and refund the remaining fund
    Close(ChallengeIdArgs),
    /// Show a challenge and its remaining fund
    Show(ChallengeShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ChallengeCreateArgs {
    /// Member creating the challenge
    pub creator: String,

    pub title: String,

    /// Prize fund to escrow
    #[arg(long)]
    pub fund: i64,

    /// Funding source
    #[arg(long, value_enum, default_value_t)]
    pub from: FundingArg,

    /// Idempotency key; recreating the same ref returns the original challenge
    #[arg(long)]
    pub client_ref: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ChallengeAwardArgs {
    pub challenge_id: String,

    /// Winning member
    pub winner: String,

    /// Points from the fund
    pub amount: i64,

    /// Creator or controller granting the award
    #[arg(long)]
    pub by: String,
}

#[derive(clap::Args, Debug)]
pub struct ChallengeIdArgs {
    pub challenge_id: String,
}

#[derive(clap::Args, Debug)]
pub struct ChallengeShowArgs {
    pub challenge_id: String,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub struct PurchaseArgs {
    /// Buying member
    pub member_id: String,

    /// Points to spend
    pub amount: i64,

    /// Order reference from the shop; retries with the same ref are idempotent
    #[arg(long)]
    pub order: String,
}

#[derive(clap::Args, Debug)]
pub struct RefundArgs {
    /// Order reference of the purchase to reverse
    #[arg(long)]
    pub order: String,
}

#[derive(clap::Args, Debug)]
pub struct BonusArgs {
    pub member_id: String,

    /// Points to convert
    pub amount: i64,
}

#[derive(clap::Args, Debug)]
pub struct BalanceArgs {
    /// Member id; omit for the org accounts
    pub owner: Option<String>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub struct SummaryArgs {
    /// Period label; defaults to the open period
    pub label: Option<String>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub struct VerifyArgs {
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub struct StatsArgs {
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}
