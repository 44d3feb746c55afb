use crate::cli::args::{IssueArgs, StoreArgs};
use crate::cli::helpers;
use crate::exit_codes;

pub fn run(store_args: &StoreArgs, args: IssueArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    match store.issue(&store_args.org, args.amount) {
        Ok(receipt) => {
            println!(
                "Issued {} points to {} (lifetime total: {})",
                receipt.amount, receipt.org_id, receipt.issued_total
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}
