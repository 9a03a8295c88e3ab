//! Value movements derived from decoded calls and events.

use alloy_primitives::{Address, U256};
use chaintrace_core::{
    chain::ChainId,
    decoded::{format_units, AddressInfo, DecodedArgument, DecodedCall, DecodedEvent, TokenRef, Transfer},
    semantics::{TokenProxyMap, TokenStandard},
};
use chaintrace_semantics::SemanticsRepository;

const NATIVE_DECIMALS: u8 = 18;

/// `Transfer(address,address,uint256)` with all three values indexed is the
/// ERC721 layout; the third value is a token id, not an amount.
const NFT_TRANSFER_TOPICS: usize = 4;

/// `(from, to, amount)` of a `Transfer(address,address,uint256)` event.
fn transfer_shape(event: &DecodedEvent) -> Option<(Address, Address, U256)> {
    match event.parameters.as_slice() {
        [from, to, amount] if event.event_name == "Transfer" && has_types(&event.parameters, &["address", "address", "uint256"]) => {
            Some((from.value.as_address()?, to.value.as_address()?, amount.value.as_uint()?))
        }
        _ => None,
    }
}

/// `(account, amount)` of a `Deposit`/`Withdrawal(address,uint256)` event.
fn wrap_shape(event: &DecodedEvent, name: &str) -> Option<(Address, U256)> {
    match event.parameters.as_slice() {
        [account, amount] if event.event_name == name && has_types(&event.parameters, &["address", "uint256"]) => {
            Some((account.value.as_address()?, amount.value.as_uint()?))
        }
        _ => None,
    }
}

fn has_types(params: &[DecodedArgument], types: &[&str]) -> bool {
    params.len() == types.len() && params.iter().zip(types).all(|(p, t)| p.ty == *t)
}

pub struct TransferDeriver<'a> {
    repo: &'a SemanticsRepository,
    chain: &'a ChainId,
    native_symbol: &'a str,
}

impl<'a> TransferDeriver<'a> {
    pub fn new(repo: &'a SemanticsRepository, chain: &'a ChainId, native_symbol: &'a str) -> Self {
        Self {
            repo,
            chain,
            native_symbol,
        }
    }

    /// Native transfers (call order) followed by token transfers (log order).
    pub async fn derive(
        &self,
        calls: Option<&DecodedCall>,
        events: &[DecodedEvent],
        proxies: &TokenProxyMap,
    ) -> Vec<Transfer> {
        let mut transfers: Vec<Transfer> = calls.map(|root| self.native_transfers(root)).unwrap_or_default();
        for event in events {
            if let Some(transfer) = self.token_transfer(event, proxies).await {
                transfers.push(transfer);
            }
        }
        transfers
    }

    fn native_transfers(&self, root: &DecodedCall) -> Vec<Transfer> {
        root.iter()
            .filter(|call| call.status && !call.value.is_zero() && call.call_type.transfers_value())
            .map(|call| Transfer {
                from: call.from.clone(),
                to: call.to.clone(),
                token: TokenRef::native(self.native_symbol),
                raw_amount: call.value,
                amount: format_units(call.value, NATIVE_DECIMALS),
                value_usd: None,
            })
            .collect()
    }

    async fn token_transfer(&self, event: &DecodedEvent, proxies: &TokenProxyMap) -> Option<Transfer> {
        let contract = event.contract.address;
        if let Some((from, to, amount)) = transfer_shape(event) {
            let nft_layout = event.topic_count == NFT_TRANSFER_TOPICS;
            let token = self.token_ref(contract, nft_layout, proxies).await;
            let raw_amount = if token.standard == Some(TokenStandard::Erc721) {
                U256::from(1)
            } else {
                amount
            };
            return Some(self.transfer(from, to, token, raw_amount, proxies).await);
        }

        // WETH-style wrapping only counts on contracts that are tokens.
        let (from, to, amount) = if let Some((dst, amount)) = wrap_shape(event, "Deposit") {
            (contract, dst, amount)
        } else if let Some((src, amount)) = wrap_shape(event, "Withdrawal") {
            (src, contract, amount)
        } else {
            return None;
        };
        let known = proxies.contains_key(&contract) || self.repo.get_token_identity(self.chain, contract).await.is_some();
        if !known {
            return None;
        }
        let token = self.token_ref(contract, false, proxies).await;
        Some(self.transfer(from, to, token, amount, proxies).await)
    }

    /// ERC721 when the repository classifies the contract so, or when the
    /// log itself has the NFT layout.
    async fn token_ref(&self, contract: Address, nft_layout: bool, proxies: &TokenProxyMap) -> TokenRef {
        if nft_layout || self.repo.get_standard(self.chain, contract).await == Some(TokenStandard::Erc721) {
            return TokenRef {
                address: Some(contract),
                symbol: self.repo.get_address_label(self.chain, contract, proxies).await,
                standard: Some(TokenStandard::Erc721),
                decimals: 0,
            };
        }
        let identity = self.repo.get_token_data(self.chain, contract, proxies).await;
        TokenRef {
            address: Some(contract),
            symbol: identity.symbol,
            standard: Some(TokenStandard::Erc20),
            decimals: identity.decimals,
        }
    }

    async fn transfer(
        &self,
        from: Address,
        to: Address,
        token: TokenRef,
        raw_amount: U256,
        proxies: &TokenProxyMap,
    ) -> Transfer {
        let from = AddressInfo::new(from, self.repo.get_address_label(self.chain, from, proxies).await);
        let to = AddressInfo::new(to, self.repo.get_address_label(self.chain, to, proxies).await);
        Transfer {
            from,
            to,
            amount: format_units(raw_amount, token.decimals),
            token,
            raw_amount,
            value_usd: None,
        }
    }
}
