//! Delegatecall edges and the token identities proxies adopt from them.

use alloy_primitives::Address;
use async_trait::async_trait;
use chaintrace_core::{
    chain::ChainId,
    semantics::{DelegationMap, TokenIdentity, TokenProxyMap},
    trace::{CallKind, CallTree},
};
use chaintrace_semantics::SemanticsRepository;

/// `caller → callee` for every `DelegateCall` frame, in pre-order. A caller
/// delegating to the same callee twice records it once.
pub fn get_delegations(tree: &CallTree) -> DelegationMap {
    let mut delegations = DelegationMap::new();
    for (_, call) in tree.preorder() {
        if call.kind == CallKind::DelegateCall {
            delegations.entry(call.from).or_default().insert(call.to);
        }
    }
    delegations
}

/// Source of token identities for proxy resolution.
#[async_trait]
pub trait TokenIdentityLookup: Send + Sync {
    async fn token_identity(&self, chain: &ChainId, address: Address) -> Option<TokenIdentity>;
}

#[async_trait]
impl TokenIdentityLookup for SemanticsRepository {
    async fn token_identity(&self, chain: &ChainId, address: Address) -> Option<TokenIdentity> {
        self.get_token_identity(chain, address).await
    }
}

/// For each delegator without a token identity of its own, adopt the
/// identity of its first delegate (in discovery order) that has one.
pub async fn get_token_proxies<L>(chain: &ChainId, delegations: &DelegationMap, lookup: &L) -> TokenProxyMap
where
    L: TokenIdentityLookup + ?Sized,
{
    let mut proxies = TokenProxyMap::new();
    for (delegator, delegates) in delegations {
        if lookup.token_identity(chain, *delegator).await.is_some() {
            continue;
        }
        for delegate in delegates {
            if let Some(identity) = lookup.token_identity(chain, *delegate).await {
                proxies.insert(*delegator, identity);
                break;
            }
        }
    }
    proxies
}
