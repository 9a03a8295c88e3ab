//! `chaintrace semantics` and `chaintrace invalidate`.

use crate::{config::AppConfig, services};
use anyhow::{bail, Context, Result};
use chaintrace_core::{semantics::AddressMetadata, validate};
use std::path::Path;

fn summary(metadata: &AddressMetadata) -> String {
    let mut out = format!("{} on {}\n", metadata.address, metadata.chain_id);
    out.push_str(&format!("  name      : {}\n", metadata.name));
    out.push_str(&format!("  contract  : {}\n", metadata.is_contract));
    if let Some(standard) = &metadata.standard {
        out.push_str(&format!("  standard  : {standard}\n"));
    }
    if let Some(erc20) = &metadata.erc20 {
        out.push_str(&format!("  token     : {} ({} decimals)\n", erc20.symbol, erc20.decimals));
    }
    if metadata.is_contract {
        out.push_str(&format!("  functions : {}\n", metadata.contract.functions.len()));
        out.push_str(&format!("  events    : {}\n", metadata.contract.events.len()));
    }
    out
}

pub async fn show(config: &AppConfig, fixture: Option<&Path>, chain: &str, address: &str, raw: bool) -> Result<()> {
    let services = services::build(config, fixture)?;
    let chain = validate::chain(chain)?;
    let address = validate::address(address)?;

    let metadata = if raw {
        match services
            .repo
            .get_raw_semantics(&chain, address)
            .context("reading semantics store")?
        {
            Some(metadata) => metadata,
            None => {
                println!("nothing persisted for {address} on {chain}");
                return Ok(());
            }
        }
    } else {
        services.repo.get_semantics(&chain, address).await.as_ref().clone()
    };

    print!("{}", summary(&metadata));
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

pub fn invalidate(config: &AppConfig, chain: &str, address: &str) -> Result<()> {
    if config.sqlite_path.is_none() {
        bail!("invalidate needs a persistent store: set `sqlite_path` in the config file");
    }
    let services = services::build(config, None)?;
    let chain = validate::chain(chain)?;
    let address = validate::address(address)?;
    services.repo.invalidate(&chain, address);
    println!("✓ forgot {address} on {chain}");
    Ok(())
}
