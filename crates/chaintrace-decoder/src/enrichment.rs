//! Presentation pass over a decoded transaction: role badges, parameter
//! display names, native price and USD values. Decoded values are left as
//! they are.

use crate::price::CachedPriceFeed;
use alloy_primitives::Address;
use chaintrace_core::{
    chain::ChainId,
    decoded::{AddressInfo, DecodedArgument, FullDecodedTransaction},
    semantics::Transformation,
    trace::TransactionMetadata,
};
use chaintrace_semantics::SemanticsRepository;
use indexmap::IndexMap;
use std::collections::HashMap;

pub const SENDER_BADGE: &str = "sender";
pub const RECEIVER_BADGE: &str = "receiver";

type Hints = IndexMap<String, Transformation>;

/// `name(type,...)` as used to key contract transformations.
fn signature_key(name: &str, args: &[DecodedArgument]) -> String {
    let types: Vec<&str> = args.iter().map(|a| a.ty.as_str()).collect();
    format!("{name}({})", types.join(","))
}

fn apply_hints(args: &mut [DecodedArgument], hints: &Hints) {
    for arg in args {
        if let Some(name) = hints.get(&arg.name).and_then(|h| h.transformed_name.clone()) {
            arg.display_name = Some(name);
        }
    }
}

struct Badges {
    sender: Address,
    receiver: Option<Address>,
}

impl Badges {
    fn from_metadata(metadata: &TransactionMetadata) -> Self {
        Self {
            sender: metadata.sender,
            receiver: metadata.receiver,
        }
    }

    fn apply(&self, info: &mut AddressInfo) {
        if info.address == self.sender {
            info.badge = Some(SENDER_BADGE.to_string());
        } else if Some(info.address) == self.receiver {
            info.badge = Some(RECEIVER_BADGE.to_string());
        }
    }
}

pub struct SemanticEnricher<'a> {
    repo: &'a SemanticsRepository,
    chain: &'a ChainId,
    price: Option<&'a CachedPriceFeed>,
}

impl<'a> SemanticEnricher<'a> {
    pub fn new(repo: &'a SemanticsRepository, chain: &'a ChainId, price: Option<&'a CachedPriceFeed>) -> Self {
        Self { repo, chain, price }
    }

    pub async fn enrich(&self, tx: &mut FullDecodedTransaction) {
        self.enrich_metadata(&mut tx.metadata).await;
        let badges = Badges::from_metadata(&tx.metadata);
        self.enrich_events(tx, &badges).await;
        self.enrich_calls(tx, &badges).await;
        self.enrich_transfers(tx, &badges);
        self.enrich_balances(tx, &badges);
    }

    async fn enrich_metadata(&self, metadata: &mut TransactionMetadata) {
        if let Some(price) = self.price {
            metadata.native_price_usd = price.native_price_usd(self.chain).await;
        }
    }

    async fn enrich_events(&self, tx: &mut FullDecodedTransaction, badges: &Badges) {
        for event in &mut tx.events {
            badges.apply(&mut event.contract);
            let key = signature_key(&event.event_name, &event.parameters);
            if let Some(hints) = self.repo.get_transformations(self.chain, event.contract.address, &key).await {
                apply_hints(&mut event.parameters, &hints);
            }
        }
    }

    async fn enrich_calls(&self, tx: &mut FullDecodedTransaction, badges: &Badges) {
        let Some(root) = tx.calls.as_mut() else {
            return;
        };
        // Hints are fetched first so the mutable walk stays synchronous.
        let mut hints: HashMap<(Address, String), Hints> = HashMap::new();
        for call in root.iter() {
            let key = (call.to.address, signature_key(&call.function_name, &call.arguments));
            if hints.contains_key(&key) {
                continue;
            }
            if let Some(found) = self.repo.get_transformations(self.chain, key.0, &key.1).await {
                hints.insert(key, found);
            }
        }
        root.for_each_mut(|call| {
            badges.apply(&mut call.from);
            badges.apply(&mut call.to);
            let key = (call.to.address, signature_key(&call.function_name, &call.arguments));
            if let Some(found) = hints.get(&key) {
                apply_hints(&mut call.arguments, found);
            }
        });
    }

    fn enrich_transfers(&self, tx: &mut FullDecodedTransaction, badges: &Badges) {
        let price = tx.metadata.native_price_usd;
        for transfer in &mut tx.transfers {
            badges.apply(&mut transfer.from);
            badges.apply(&mut transfer.to);
            match price {
                Some(price) if transfer.token.is_native() => {
                    transfer.value_usd = transfer.amount.parse::<f64>().ok().map(|amount| amount * price);
                }
                _ => {}
            }
        }
    }

    fn enrich_balances(&self, tx: &mut FullDecodedTransaction, badges: &Badges) {
        for delta in &mut tx.balances {
            badges.apply(&mut delta.holder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaintrace_core::decoded::ArgValue;

    #[test]
    fn keys_use_canonical_types() {
        let args = vec![
            DecodedArgument::new("to", "address", ArgValue::Address("0x00".into())),
            DecodedArgument::new("value", "uint256", ArgValue::Str(String::new())),
        ];
        assert_eq!(signature_key("transfer", &args), "transfer(address,uint256)");
        assert_eq!(signature_key("fallback", &[]), "fallback()");
    }

    #[test]
    fn hints_only_set_display_names() {
        let mut args = vec![DecodedArgument::new("wad", "uint256", ArgValue::Str("5".into()))];
        let hints: Hints = [(
            "wad".to_string(),
            Transformation {
                transformed_name: Some("amount".into()),
                ..Default::default()
            },
        )]
        .into_iter()
        .collect();
        apply_hints(&mut args, &hints);
        assert_eq!(args[0].display_name.as_deref(), Some("amount"));
        assert_eq!(args[0].name, "wad");
        assert_eq!(args[0].value, ArgValue::Str("5".into()));
    }
}
