use crate::cli::args::{OutputFormat, StatsArgs, StoreArgs};
use crate::cli::helpers;
use crate::exit_codes;

pub fn run(store_args: &StoreArgs, args: StatsArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    match store.stats() {
        Ok(stats) => {
            match args.format {
                OutputFormat::Json => helpers::print_json(&stats)?,
                OutputFormat::Text => {
                    println!("orgs:          {}", stats.orgs);
                    println!("members:       {}", stats.members);
                    println!("accounts:      {}", stats.accounts);
                    println!("entries:       {}", stats.entries);
                    println!("transfers:     {}", stats.transfers);
                    println!("challenges:    {}", stats.challenges);
                    println!("periods:       {}", stats.periods);
                    println!("db size:       {} bytes", stats.db_size_bytes);
                    println!("busy events:   {}", stats.sqlite_busy_events);
                }
            }
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}
