use crate::cli::args::{StoreArgs, SweepArgs};
use crate::cli::helpers;
use crate::exit_codes;
use chrono::Utc;
use kudos_core::Sweeper;
use std::time::Duration;
use tokio::sync::watch;

pub async fn run(store_args: &StoreArgs, args: SweepArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;

    if !args.watch {
        return match store.sweep_due(Utc::now()) {
            Ok(outcome) => {
                if outcome.is_noop() {
                    println!("Nothing due");
                } else {
                    println!(
                        "Swept: {} auto-approved, {} realized",
                        outcome.auto_approved, outcome.realized
                    );
                }
                Ok(exit_codes::SUCCESS)
            }
            Err(e) => Ok(helpers::fail(&e)),
        };
    }

    let interval = args
        .interval
        .unwrap_or(store.config().sweep_interval_secs);
    println!("Sweeping every {interval}s (Ctrl-C to stop)");

    let (tx, rx) = watch::channel(false);
    let sweeper = Sweeper::new(store, Duration::from_secs(interval));
    let worker = tokio::spawn(sweeper.run(rx));

    tokio::signal::ctrl_c().await?;
    let _ = tx.send(true);
    worker.await?;

    println!("Stopped");
    Ok(exit_codes::SUCCESS)
}
