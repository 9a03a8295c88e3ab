//! `chaintrace decode`: decode transactions and print them.

use crate::{config::AppConfig, services};
use anyhow::{bail, Result};
use chaintrace_core::decoded::{DecodedArgument, FullDecodedTransaction};
use futures::future::join_all;
use std::path::Path;

pub async fn run(config: &AppConfig, fixture: Option<&Path>, txs: &[String], chain: &str, json: bool) -> Result<()> {
    let services = services::build(config, fixture)?;
    let hashes: Vec<String> = if txs.is_empty() {
        services.bundled_hashes.clone()
    } else {
        txs.to_vec()
    };
    if hashes.is_empty() {
        bail!("nothing to decode: pass --tx or a --fixture bundle containing transactions");
    }

    let decoder = services.decoder(config);
    let results = join_all(hashes.iter().map(|hash| decoder.decode_transaction(chain, hash))).await;

    let mut failed = 0usize;
    let mut decoded = Vec::new();
    for (hash, result) in hashes.iter().zip(results) {
        match result {
            Ok(tx) => decoded.push(tx),
            Err(e) => {
                eprintln!("✗ {hash}: {e}");
                failed += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
    } else {
        for tx in &decoded {
            print!("{}", render(tx));
        }
    }

    if failed > 0 {
        bail!("{failed} of {} transaction(s) could not be decoded", hashes.len());
    }
    Ok(())
}

fn render_args(args: &[DecodedArgument]) -> String {
    args.iter()
        .map(|a| format!("{}={}", a.display_name.as_deref().unwrap_or(&a.name), a.value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human-readable rendering of a decoded transaction.
pub fn render(tx: &FullDecodedTransaction) -> String {
    let mut out = String::new();
    let m = &tx.metadata;
    out.push_str(&format!("Transaction {} ({})\n", m.tx_hash, m.chain_id));
    out.push_str(&format!("  block     : {} @ {}\n", m.block_number, m.timestamp));
    out.push_str(&format!("  success   : {}\n", m.success));
    out.push_str(&format!("  complete  : {}\n", tx.status));
    if let Some(price) = m.native_price_usd {
        out.push_str(&format!("  price USD : {price}\n"));
    }

    if let Some(root) = &tx.calls {
        out.push_str("\nCalls:\n");
        for call in root.iter() {
            let indent = "  ".repeat(call.depth as usize + 1);
            let mark = if call.status { "" } else { " ✗" };
            out.push_str(&format!(
                "{indent}[{}] {} {}.{}({}){mark}\n",
                call.call_type,
                call.from.name,
                call.to.name,
                call.function_name,
                render_args(&call.arguments)
            ));
            if !call.outputs.is_empty() {
                out.push_str(&format!("{indent}  → {}\n", render_args(&call.outputs)));
            }
            if let Some(error) = &call.error {
                out.push_str(&format!("{indent}  error: {error}\n"));
            }
        }
    }

    if !tx.events.is_empty() {
        out.push_str("\nEvents:\n");
        for event in &tx.events {
            out.push_str(&format!(
                "  #{} {}.{}({})\n",
                event.index,
                event.contract.name,
                event.event_name,
                render_args(&event.parameters)
            ));
        }
    }

    if !tx.transfers.is_empty() {
        out.push_str("\nTransfers:\n");
        for t in &tx.transfers {
            let usd = t.value_usd.map(|v| format!(" (${v:.2})")).unwrap_or_default();
            out.push_str(&format!(
                "  {} → {}: {} {}{usd}\n",
                t.from.name, t.to.name, t.amount, t.token.symbol
            ));
        }
    }

    if !tx.balances.is_empty() {
        out.push_str("\nBalances:\n");
        for balance in &tx.balances {
            let badge = balance.holder.badge.as_deref().map(|b| format!(" [{b}]")).unwrap_or_default();
            out.push_str(&format!("  {}{badge}\n", balance.holder.name));
            for delta in &balance.tokens {
                out.push_str(&format!("    {} {}\n", delta.amount, delta.token.symbol));
            }
        }
    }

    if !tx.errors.is_empty() {
        out.push_str("\nIncomplete stages:\n");
        for failure in &tx.errors {
            out.push_str(&format!("  {}: {}\n", failure.stage, failure.error.message));
        }
    }
    out.push('\n');
    out
}
