use crate::cli::args::{DecisionArgs, RealizeArgs, SendArgs, StoreArgs};
use crate::cli::helpers;
use crate::exit_codes;
use kudos_core::{DecisionReceipt, SubmitParams};

pub fn send(store_args: &StoreArgs, args: SendArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    let result = store.submit_transfer(SubmitParams {
        org_id: &store_args.org,
        sender_id: &args.sender,
        recipient_id: &args.recipient,
        amount: args.amount,
        reason: args.reason.as_deref(),
        client_ref: args.client_ref.as_deref(),
    });
    match result {
        Ok(receipt) => {
            if receipt.was_new {
                println!(
                    "Submitted {}: {} points from {} to {} (auto-confirms {})",
                    receipt.transfer_id,
                    receipt.amount,
                    args.sender,
                    args.recipient,
                    receipt.grace_until.to_rfc3339()
                );
            } else {
                println!(
                    "Already submitted as {} (status: {})",
                    receipt.transfer_id,
                    receipt.status.as_str()
                );
            }
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}

pub fn approve(store_args: &StoreArgs, args: DecisionArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    let result = store.approve_transfer(&store_args.org, &args.transfer_id, &args.by);
    decided(result)
}

pub fn decline(store_args: &StoreArgs, args: DecisionArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    let result = store.decline_transfer(&store_args.org, &args.transfer_id, &args.by);
    decided(result)
}

pub fn realize(store_args: &StoreArgs, args: RealizeArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    let result = store.realize_transfer(&store_args.org, &args.transfer_id);
    decided(result)
}

fn decided(result: Result<DecisionReceipt, kudos_core::LedgerError>) -> anyhow::Result<i32> {
    match result {
        Ok(receipt) => {
            let when = if receipt.was_new { "now" } else { "already" };
            println!(
                "Transfer {} {} {}",
                receipt.transfer_id,
                when,
                receipt.status.as_str()
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}
