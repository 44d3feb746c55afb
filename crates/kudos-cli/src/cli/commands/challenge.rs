use crate::cli::args::{ChallengeArgs, ChallengeSub, OutputFormat, StoreArgs};
use crate::cli::helpers;
use crate::exit_codes;
use kudos_core::CreateChallengeParams;

pub fn run(store_args: &StoreArgs, args: ChallengeArgs) -> anyhow::Result<i32> {
    let store = helpers::open_existing(store_args)?;
    let org = &store_args.org;
    match args.cmd {
        ChallengeSub::Create(a) => {
            let result = store.create_challenge(CreateChallengeParams {
                org_id: org,
                creator_id: &a.creator,
                title: &a.title,
                fund: a.fund,
                funded_from: a.from.into(),
                client_ref: a.client_ref.as_deref(),
            });
            match result {
                Ok(receipt) => {
                    if receipt.was_new {
                        println!(
                            "Challenge {}: \"{}\" with {} points escrowed",
                            receipt.challenge_id, a.title, receipt.fund_total
                        );
                    } else {
                        println!("Already created as {}", receipt.challenge_id);
                    }
                    Ok(exit_codes::SUCCESS)
                }
                Err(e) => Ok(helpers::fail(&e)),
            }
        }
        ChallengeSub::Award(a) => {
            match store.award_challenge(org, &a.challenge_id, &a.winner, a.amount, &a.by) {
                Ok(receipt) => {
                    println!(
                        "Awarded {} points to {} ({} left in the fund)",
                        receipt.amount, receipt.winner_id, receipt.escrow_remaining
                    );
                    Ok(exit_codes::SUCCESS)
                }
                Err(e) => Ok(helpers::fail(&e)),
            }
        }
        ChallengeSub::Close(a) => match store.close_challenge(org, &a.challenge_id) {
            Ok(outcome) => {
                println!(
                    "Closed challenge {}: {} points returned",
                    outcome.challenge_id, outcome.returned
                );
                Ok(exit_codes::SUCCESS)
            }
            Err(e) => Ok(helpers::fail(&e)),
        },
        ChallengeSub::Show(a) => {
            let challenge = match store.get_challenge(org, &a.challenge_id) {
                Ok(c) => c,
                Err(e) => return Ok(helpers::fail(&e)),
            };
            let remaining = match store.challenge_fund(org, &a.challenge_id) {
                Ok(r) => r,
                Err(e) => return Ok(helpers::fail(&e)),
            };
            match a.format {
                OutputFormat::Json => {
                    let view = serde_json::json!({
                        "challenge": challenge,
                        "fund_remaining": remaining,
                    });
                    helpers::print_json(&view)?;
                }
                OutputFormat::Text => {
                    println!("{}\t\"{}\"", challenge.challenge_id, challenge.title);
                    println!("  creator: {}", challenge.creator_id);
                    println!("  state:   {}", challenge.state.as_str());
                    println!(
                        "  funded:  {} ({})",
                        challenge.fund_total,
                        challenge.funded_from.as_str()
                    );
                    println!("  left:    {}", remaining);
                }
            }
            Ok(exit_codes::SUCCESS)
        }
    }
}
