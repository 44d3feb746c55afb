use super::args::{Cli, Command};
use crate::exit_codes;

pub mod balance;
pub mod challenge;
pub mod init;
pub mod issue;
pub mod market;
pub mod member;
pub mod period;
pub mod stats;
pub mod summary;
pub mod sweep;
pub mod transfer;
pub mod treasury;
pub mod verify;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let store = cli.store;
    match cli.cmd {
        Command::Init(args) => init::run(&store, args),
        Command::Member(args) => member::run(&store, args),
        Command::Issue(args) => issue::run(&store, args),
        Command::Treasury(args) => treasury::run(&store, args),
        Command::Period(args) => period::run(&store, args),
        Command::Send(args) => transfer::send(&store, args),
        Command::Approve(args) => transfer::approve(&store, args),
        Command::Decline(args) => transfer::decline(&store, args),
        Command::Realize(args) => transfer::realize(&store, args),
        Command::Sweep(args) => sweep::run(&store, args).await,
        Command::Challenge(args) => challenge::run(&store, args),
        Command::Purchase(args) => market::purchase(&store, args),
        Command::Refund(args) => market::refund(&store, args),
        Command::Bonus(args) => market::bonus(&store, args),
        Command::Balance(args) => balance::run(&store, args),
        Command::Summary(args) => summary::run(&store, args),
        Command::Verify(args) => verify::run(&store, args),
        Command::Stats(args) => stats::run(&store, args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::SUCCESS)
        }
    }
}
