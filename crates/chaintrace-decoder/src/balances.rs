//! Net per-holder, per-token balance changes.

use alloy_primitives::{Address, I256};
use chaintrace_core::decoded::{format_signed_units, AddressInfo, BalanceDelta, TokenDelta, TokenRef, Transfer};
use indexmap::IndexMap;

/// Fold `transfers` into signed deltas: the sender loses, the receiver gains.
/// Holders and their tokens keep first-seen order; zero nets stay in.
pub fn aggregate_balances(transfers: &[Transfer]) -> Vec<BalanceDelta> {
    let mut holders: IndexMap<Address, (AddressInfo, IndexMap<TokenRef, I256>)> = IndexMap::new();

    for transfer in transfers {
        let amount = I256::try_from(transfer.raw_amount).unwrap_or(I256::MAX);
        apply(&mut holders, &transfer.from, &transfer.token, amount.saturating_neg());
        apply(&mut holders, &transfer.to, &transfer.token, amount);
    }

    holders
        .into_values()
        .map(|(holder, tokens)| BalanceDelta {
            holder,
            tokens: tokens
                .into_iter()
                .map(|(token, raw_delta)| TokenDelta {
                    amount: format_signed_units(raw_delta, token.decimals),
                    token,
                    raw_delta,
                })
                .collect(),
        })
        .collect()
}

fn apply(
    holders: &mut IndexMap<Address, (AddressInfo, IndexMap<TokenRef, I256>)>,
    holder: &AddressInfo,
    token: &TokenRef,
    delta: I256,
) {
    let (_, tokens) = holders
        .entry(holder.address)
        .or_insert_with(|| (holder.clone(), IndexMap::new()));
    let net = tokens.entry(token.clone()).or_insert(I256::ZERO);
    *net = net.saturating_add(delta);
}
