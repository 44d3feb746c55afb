use crate::cli::args::{BonusArgs, PurchaseArgs, RefundArgs, StoreArgs};
use crate::cli::helpers;
use crate::exit_codes;

pub fn purchase(store_args: &StoreArgs, args: PurchaseArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    match store.purchase(&store_args.org, &args.member_id, args.amount, &args.order) {
        Ok(receipt) => {
            if receipt.was_new {
                println!(
                    "Purchased for {} points (order {})",
                    receipt.amount, receipt.order_ref
                );
            } else {
                println!(
                    "Order {} already recorded ({} points)",
                    receipt.order_ref, receipt.amount
                );
            }
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}

pub fn refund(store_args: &StoreArgs, args: RefundArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    match store.refund_purchase(&store_args.org, &args.order) {
        Ok(receipt) => {
            if receipt.was_new {
                println!("Refunded order {} ({} points)", receipt.order_ref, receipt.amount);
            } else {
                println!("Order {} already refunded", receipt.order_ref);
            }
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}

pub fn bonus(store_args: &StoreArgs, args: BonusArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    match store.convert_to_bonus(&store_args.org, &args.member_id, args.amount) {
        Ok(receipt) => {
            println!(
                "Converted {} points to bonus (bonus balance: {})",
                receipt.amount, receipt.bonus_balance
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}
