use crate::cli::args::{BalanceArgs, OutputFormat, StoreArgs};
use crate::cli::helpers;
use crate::exit_codes;
use kudos_core::{LedgerError, OwnerKind};

pub fn run(store_args: &StoreArgs, args: BalanceArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    let org = &store_args.org;
    let (owner_kind, owner_id) = match &args.owner {
        Some(member) => (OwnerKind::Member, member.as_str()),
        None => (OwnerKind::Org, org.as_str()),
    };
    let accounts = match store.balances(org, owner_kind, owner_id) {
        Ok(accounts) => accounts,
        Err(e) => return Ok(helpers::fail(&e)),
    };
    // Accounts are created with their owner, so none at all means the
    // owner does not exist.
    if accounts.is_empty() {
        let err = match &args.owner {
            Some(member) => LedgerError::MemberNotFound {
                org_id: org.clone(),
                member_id: member.clone(),
            },
            None => LedgerError::OrgNotFound {
                org_id: org.clone(),
            },
        };
        return Ok(helpers::fail(&err));
    }
    match args.format {
        OutputFormat::Json => helpers::print_json(&accounts)?,
        OutputFormat::Text => {
            for account in &accounts {
                println!("{}\t{}", account.kind.as_str(), account.balance);
            }
        }
    }
    Ok(exit_codes::SUCCESS)
}
