//! Call tree → decoded call tree.
//!
//! Nodes are decoded in pre-order over the arena, then assembled into the
//! owned tree bottom-up (children always sit after their parent in the
//! arena), so neither pass recurses.

use alloy_primitives::{Address, B256};
use chaintrace_abi::{
    codec::decode_parameters,
    fingerprint::{calldata_selector, selector_hex},
    graffiti::decode_graffiti,
    revert::{decode_revert, REVERT_OUTPUT_NAME},
};
use chaintrace_core::{
    chain::ChainId,
    decoded::{AddressInfo, DecodedArgument, DecodedCall},
    error::DecoderError,
    semantics::{DelegationMap, FunctionSignature, TokenProxyMap},
    trace::{CallKind, CallTree, RawCall},
};
use chaintrace_semantics::SemanticsRepository;
use std::sync::Arc;
use tracing::{debug, warn};

/// Position of child `i` under a parent: `0003` below the root,
/// `0003_0001` below that.
fn child_call_id(parent: &str, i: usize) -> String {
    if parent.is_empty() {
        format!("{i:04}")
    } else {
        format!("{parent}_{i:04}")
    }
}

pub struct CallTreeDecoder<'a> {
    repo: &'a SemanticsRepository,
    chain: &'a ChainId,
    tx_hash: B256,
}

impl<'a> CallTreeDecoder<'a> {
    pub fn new(repo: &'a SemanticsRepository, chain: &'a ChainId, tx_hash: B256) -> Self {
        Self { repo, chain, tx_hash }
    }

    /// Decode every frame of `tree`. `Ok(None)` when there is no tree; an
    /// undecodable call input fails the whole tree.
    pub async fn decode(
        &self,
        tree: Option<&CallTree>,
        delegations: &DelegationMap,
        proxies: &TokenProxyMap,
    ) -> Result<Option<DecodedCall>, DecoderError> {
        let Some(tree) = tree else {
            return Ok(None);
        };

        let len = tree.len();
        let mut call_ids = vec![String::new(); len];
        let mut depths = vec![0u32; len];
        let mut statuses = vec![true; len];
        let mut slots: Vec<Option<DecodedCall>> = Vec::with_capacity(len);
        slots.resize_with(len, || None);

        for (idx, call) in tree.preorder() {
            let (parent_ok, depth) = match tree.parent(idx) {
                Some(parent) => (statuses[parent], depths[parent] + 1),
                None => (true, 0),
            };
            let status = parent_ok && call.error.is_none();
            statuses[idx] = status;
            depths[idx] = depth;
            for (i, &child) in tree.children(idx).iter().enumerate() {
                call_ids[child] = child_call_id(&call_ids[idx], i);
            }

            let call_id = std::mem::take(&mut call_ids[idx]);
            let decoded = self
                .decode_call(call, call_id.clone(), depth, status, delegations, proxies)
                .await?;
            call_ids[idx] = call_id;
            slots[idx] = Some(decoded);
        }

        // Children of a node are pushed in descending arena order and are
        // reversed once all of them have arrived.
        for idx in (1..len).rev() {
            let (Some(parent), Some(mut node)) = (tree.parent(idx), slots[idx].take()) else {
                continue;
            };
            node.children.reverse();
            if let Some(parent_node) = slots[parent].as_mut() {
                parent_node.children.push(node);
            }
        }
        let mut root = slots.first_mut().and_then(Option::take);
        if let Some(root) = root.as_mut() {
            root.children.reverse();
        }
        Ok(root)
    }

    /// Decode one frame (no children).
    pub async fn decode_call(
        &self,
        call: &RawCall,
        call_id: String,
        depth: u32,
        status: bool,
        delegations: &DelegationMap,
        proxies: &TokenProxyMap,
    ) -> Result<DecodedCall, DecoderError> {
        let selector = calldata_selector(&call.input).map(|s| selector_hex(&s));
        let from = self.address_info(call.from, proxies).await;
        let to = self.address_info(call.to, proxies).await;
        let mut error = call.error.clone();
        let is_contract = self.repo.check_is_contract(self.chain, call.to).await;

        let (function_name, arguments, outputs) = match call.kind {
            CallKind::SelfDestruct => ("selfdestruct".to_string(), Vec::new(), Vec::new()),
            CallKind::Create2 => ("new".to_string(), Vec::new(), Vec::new()),
            _ if is_contract => {
                let abi = match &selector {
                    Some(selector) => self.resolve_function(call.to, selector, delegations).await,
                    None => None,
                };
                let function_name = match (&abi, &selector) {
                    (Some(func), _) => func.name.clone(),
                    (None, Some(selector)) => selector.clone(),
                    (None, None) => "fallback".to_string(),
                };
                let arguments = match &abi {
                    Some(func) => decode_parameters(&func.inputs, &call.input[4..]).map_err(|e| {
                        warn!(tx_hash = %self.tx_hash, call_id = %call_id, function = %func.name, error = %e,
                            "call input does not match its ABI");
                        DecoderError::from(e)
                    })?,
                    None => Vec::new(),
                };
                let mut outputs = self.decode_outputs(call, abi.as_deref(), &call_id);
                if call.error.is_some() && outputs.first().is_some_and(|o| o.name == REVERT_OUTPUT_NAME) {
                    let reason = outputs.remove(0);
                    error = Some(format!("Failed with \"{}\"", reason.value));
                }
                (function_name, arguments, outputs)
            }
            _ => ("fallback".to_string(), decode_graffiti(&call.input), Vec::new()),
        };

        Ok(DecodedCall {
            chain_id: self.chain.slug.clone(),
            tx_hash: self.tx_hash,
            call_id,
            call_type: call.kind,
            from,
            to,
            value: call.value.unwrap_or_default(),
            function_signature: selector,
            function_name,
            arguments,
            outputs,
            gas_used: call.gas_used,
            error,
            status,
            depth,
            children: Vec::new(),
        })
    }

    /// Return data of a successful call through the ABI (lenient), or the
    /// revert reason of a failed one.
    fn decode_outputs(&self, call: &RawCall, abi: Option<&FunctionSignature>, call_id: &str) -> Vec<DecodedArgument> {
        if call.error.is_some() {
            return decode_revert(&call.output).into_iter().collect();
        }
        let Some(func) = abi else {
            return Vec::new();
        };
        match decode_parameters(&func.outputs, &call.output) {
            Ok(outputs) => outputs,
            Err(e) => {
                debug!(tx_hash = %self.tx_hash, call_id = %call_id, function = %func.name, error = %e,
                    "return data does not match its ABI");
                Vec::new()
            }
        }
    }

    /// Function ABI on the target, else on each contract it delegates to.
    async fn resolve_function(
        &self,
        to: Address,
        selector: &str,
        delegations: &DelegationMap,
    ) -> Option<Arc<FunctionSignature>> {
        if let Some(func) = self.repo.get_function_abi(self.chain, to, selector).await {
            return Some(func);
        }
        for delegate in delegations.get(&to).into_iter().flatten() {
            if let Some(func) = self.repo.get_function_abi(self.chain, *delegate, selector).await {
                debug!(address = %to, delegate = %delegate, %selector, "function resolved through delegate");
                return Some(func);
            }
        }
        None
    }

    async fn address_info(&self, address: Address, proxies: &TokenProxyMap) -> AddressInfo {
        AddressInfo::new(address, self.repo.get_address_label(self.chain, address, proxies).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_ids_are_zero_padded_paths() {
        assert_eq!(child_call_id("", 0), "0000");
        assert_eq!(child_call_id("", 12), "0012");
        assert_eq!(child_call_id("0001", 0), "0001_0000");
        assert_eq!(child_call_id("0001_0000", 3), "0001_0000_0003");
    }
}
