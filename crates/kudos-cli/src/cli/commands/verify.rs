use crate::cli::args::{OutputFormat, StoreArgs, VerifyArgs};
use crate::cli::helpers;
use crate::exit_codes;

pub fn run(store_args: &StoreArgs, args: VerifyArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    match store.verify_conservation(&store_args.org) {
        Ok(report) => {
            match args.format {
                OutputFormat::Json => helpers::print_json(&report)?,
                OutputFormat::Text => {
                    if report.is_consistent() {
                        println!(
                            "OK: {} issued, {} on the books",
                            report.issued_total, report.balance_total
                        );
                    } else {
                        println!("INCONSISTENT ({} issued):", report.issued_total);
                        for violation in &report.violations {
                            println!("  - {violation}");
                        }
                    }
                }
            }
            if report.is_consistent() {
                Ok(exit_codes::SUCCESS)
            } else {
                Ok(exit_codes::INCONSISTENT)
            }
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}
