use crate::cli::args::{InitArgs, StoreArgs};
use crate::cli::helpers;
use crate::exit_codes;

pub fn run(store_args: &StoreArgs, args: InitArgs) -> anyhow::Result<i32> {
    let store = helpers::open_or_create(store_args)?;
    let org = &store_args.org;
    let name = args.name.as_deref().unwrap_or(org);
    match store.create_org(org, name) {
        Ok(()) => {
            println!(
                "Initialized ledger at {} (org: {})",
                store_args.db.display(),
                org
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(helpers::fail(&e)),
    }
}
