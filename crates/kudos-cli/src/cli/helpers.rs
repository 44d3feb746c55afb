use crate::cli::args::StoreArgs;
use crate::exit_codes;
use anyhow::Context;
use kudos_core::{LedgerConfig, LedgerError, Store};
use std::path::Path;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<LedgerConfig> {
    match path {
        Some(p) => LedgerConfig::load(p),
        None => Ok(LedgerConfig::default()),
    }
}

/// Open the ledger for `init`: create parent directories as needed.
pub fn open_or_create(args: &StoreArgs) -> anyhow::Result<Store> {
    if let Some(parent) = args.db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let config = load_config(args.config.as_deref())?;
    Ok(Store::open(&args.db, config)?)
}

/// Open an existing ledger; refuses to create one implicitly.
pub fn open_existing(args: &StoreArgs) -> anyhow::Result<Store> {
    if !args.db.exists() {
        anyhow::bail!(
            "no ledger database at {} (run `kudos init` first)",
            args.db.display()
        );
    }
    let config = load_config(args.config.as_deref())?;
    Ok(Store::open(&args.db, config)?)
}

/// Print a refused operation and map it to the operational exit code.
pub fn fail(err: &LedgerError) -> i32 {
    eprintln!("error: {err}");
    exit_codes::OP_FAILED
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
