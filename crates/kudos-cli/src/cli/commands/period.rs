use crate::cli::args::{OutputFormat, PeriodArgs, PeriodSub, StoreArgs};
use crate::cli::helpers;
use crate::exit_codes;
use chrono::{Duration, Utc};

pub fn run(store_args: &StoreArgs, args: PeriodArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    let org = &store_args.org;
    match args.cmd {
        PeriodSub::Open(a) => {
            let starts = a.starts.unwrap_or_else(Utc::now);
            let ends = a.ends.unwrap_or(starts + Duration::days(a.days));
            match store.open_period(org, &a.label, starts, ends) {
                Ok(outcome) => {
                    println!(
                        "Opened period {}: emitted {} points to {} members",
                        outcome.label, outcome.emitted_total, outcome.members_credited
                    );
                    Ok(exit_codes::SUCCESS)
                }
                Err(e) => Ok(helpers::fail(&e)),
            }
        }
        PeriodSub::Close(a) => match store.close_period(org, Utc::now()) {
            Ok(outcome) => {
                match a.format {
                    OutputFormat::Json => helpers::print_json(&outcome)?,
                    OutputFormat::Text => {
                        println!("Closed period {}", outcome.label);
                        println!("  auto-approved: {}", outcome.auto_approved);
                        println!("  realized:      {}", outcome.realized);
                        println!("  declined:      {}", outcome.declined);
                        println!("  challenges:    {}", outcome.challenges_closed);
                        println!("  burnt:         {}", outcome.burnt_total);
                        println!("  stats rows:    {}", outcome.stats_rows);
                    }
                }
                Ok(exit_codes::SUCCESS)
            }
            Err(e) => Ok(helpers::fail(&e)),
        },
        PeriodSub::List(a) => match store.list_periods(org) {
            Ok(periods) => {
                match a.format {
                    OutputFormat::Json => helpers::print_json(&periods)?,
                    OutputFormat::Text => {
                        for p in &periods {
                            println!(
                                "{}\t{}\t{} .. {}",
                                p.label,
                                p.state.as_str(),
                                p.starts_at.to_rfc3339(),
                                p.ends_at.to_rfc3339()
                            );
                        }
                    }
                }
                Ok(exit_codes::SUCCESS)
            }
            Err(e) => Ok(helpers::fail(&e)),
        },
    }
}
