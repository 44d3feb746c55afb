use crate::cli::args::{MemberArgs, MemberSub, OutputFormat, StoreArgs};
use crate::cli::helpers;
use crate::exit_codes;

pub fn run(store_args: &StoreArgs, args: MemberArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    let org = &store_args.org;
    match args.cmd {
        MemberSub::Add(a) => {
            let name = a.name.as_deref().unwrap_or(&a.member_id);
            match store.add_member(org, &a.member_id, name, a.controller) {
                Ok(()) => {
                    let role = if a.controller { "controller" } else { "member" };
                    println!("Added {} to {} as {}", a.member_id, org, role);
                    Ok(exit_codes::SUCCESS)
                }
                Err(e) => Ok(helpers::fail(&e)),
            }
        }
        MemberSub::List(a) => match store.list_members(org) {
            Ok(members) => {
                match a.format {
                    OutputFormat::Json => helpers::print_json(&members)?,
                    OutputFormat::Text => {
                        for m in &members {
                            let role = if m.is_controller { "controller" } else { "member" };
                            let state = if m.active { "active" } else { "inactive" };
                            println!("{}\t{}\t{}\t{}", m.member_id, m.display_name, role, state);
                        }
                    }
                }
                Ok(exit_codes::SUCCESS)
            }
            Err(e) => Ok(helpers::fail(&e)),
        },
        MemberSub::Deactivate(a) => match store.set_member_active(org, &a.member_id, false) {
            Ok(()) => {
                println!("Deactivated {}", a.member_id);
                Ok(exit_codes::SUCCESS)
            }
            Err(e) => Ok(helpers::fail(&e)),
        },
        MemberSub::Reactivate(a) => match store.set_member_active(org, &a.member_id, true) {
            Ok(()) => {
                println!("Reactivated {}", a.member_id);
                Ok(exit_codes::SUCCESS)
            }
            Err(e) => Ok(helpers::fail(&e)),
        },
    }
}
