use crate::cli::args::{StoreArgs, TreasuryArgs};
use crate::cli::helpers;
use crate::exit_codes;

pub fn run(store_args: &StoreArgs, args: TreasuryArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    match store.fund_treasury(&store_args.org, args.amount) {
        Ok(balance) => {
            println!(
                "Moved {} points into the treasury (balance: {})",
                args.amount, balance
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}
