use crate::cli::args::{OutputFormat, StoreArgs, SummaryArgs};
use crate::cli::helpers;
use crate::exit_codes;
use kudos_core::LedgerError;

pub fn run(store_args: &StoreArgs, args: SummaryArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    let org = &store_args.org;
    let label = match args.label {
        Some(label) => label,
        None => match store.current_period(org) {
            Ok(Some(period)) => period.label,
            Ok(None) => {
                return Ok(helpers::fail(&LedgerError::NoOpenPeriod {
                    org_id: org.clone(),
                }))
            }
            Err(e) => return Ok(helpers::fail(&e)),
        },
    };
    match store.period_summary(org, &label) {
        Ok(stats) => {
            match args.format {
                OutputFormat::Json => helpers::print_json(&stats)?,
                OutputFormat::Text => {
                    println!("Period {label}");
                    println!(
                        "{:<16} {:>6} {:>9} {:>9} {:>6} {:>8} {:>6}",
                        "member", "sent", "received", "declined", "auto", "awarded", "burnt"
                    );
                    for s in &stats {
                        println!(
                            "{:<16} {:>6} {:>9} {:>9} {:>6} {:>8} {:>6}",
                            s.member_id,
                            s.sent_total,
                            s.received_total,
                            s.declined_total,
                            s.auto_confirmed_total,
                            s.awarded_total,
                            s.burnt_total
                        );
                    }
                }
            }
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}
