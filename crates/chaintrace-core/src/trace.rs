//! Raw execution trace types: call kinds, the call-tree arena, logs and
//! transaction metadata.

use crate::error::TraceError;
use alloy_primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

/// Kind of a call frame, as reported by the node tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CallKind {
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
    SelfDestruct,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Call => "call",
            CallKind::StaticCall => "staticcall",
            CallKind::DelegateCall => "delegatecall",
            CallKind::CallCode => "callcode",
            CallKind::Create => "create",
            CallKind::Create2 => "create2",
            CallKind::SelfDestruct => "selfdestruct",
        }
    }

    /// Whether a non-zero value on this frame actually moves native tokens.
    pub fn transfers_value(&self) -> bool {
        match self {
            CallKind::Call | CallKind::Create | CallKind::Create2 | CallKind::SelfDestruct => true,
            CallKind::StaticCall | CallKind::DelegateCall | CallKind::CallCode => false,
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallKind {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(CallKind::Call),
            "staticcall" => Ok(CallKind::StaticCall),
            "delegatecall" => Ok(CallKind::DelegateCall),
            "callcode" => Ok(CallKind::CallCode),
            "create" => Ok(CallKind::Create),
            "create2" => Ok(CallKind::Create2),
            "selfdestruct" | "suicide" => Ok(CallKind::SelfDestruct),
            other => Err(TraceError::UnknownCallKind {
                kind: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for CallKind {
    type Error = TraceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CallKind> for String {
    fn from(kind: CallKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One call frame as produced by the tracer, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCall {
    #[serde(rename = "type")]
    pub kind: CallKind,
    pub from: Address,
    pub to: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default)]
    pub input: Bytes,
    #[serde(default)]
    pub output: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RawCall {
    pub fn new(kind: CallKind, from: Address, to: Address) -> Self {
        Self {
            kind,
            from,
            to,
            value: None,
            input: Bytes::new(),
            output: Bytes::new(),
            gas: None,
            gas_used: None,
            error: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<Bytes>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_output(mut self, output: impl Into<Bytes>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// A flat tracer frame addressed by its position in the call tree
/// (`[]` is the root, `[0, 2]` the third child of the first child).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    #[serde(default)]
    pub trace_address: Vec<usize>,
    #[serde(flatten)]
    pub call: RawCall,
}

pub type CallIndex = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallNode {
    pub call: RawCall,
    pub parent: Option<CallIndex>,
    pub children: Vec<CallIndex>,
}

/// Arena-backed call tree. Index 0 is the root and every node is stored
/// after its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTree {
    nodes: Vec<CallNode>,
}

impl CallTree {
    pub const ROOT: CallIndex = 0;

    pub fn new(root: RawCall) -> Self {
        Self {
            nodes: vec![CallNode {
                call: root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Append `call` as the last child of `parent`.
    pub fn push_child(&mut self, parent: CallIndex, call: RawCall) -> Result<CallIndex, TraceError> {
        if parent >= self.nodes.len() {
            return Err(TraceError::InvalidFrame {
                trace_address: vec![parent],
                reason: "parent index out of range".into(),
            });
        }
        let idx = self.nodes.len();
        self.nodes.push(CallNode {
            call,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(idx);
        Ok(idx)
    }

    /// Build a tree from flat frames in any order.
    pub fn from_frames(mut frames: Vec<TraceFrame>) -> Result<Self, TraceError> {
        frames.sort_by(|a, b| a.trace_address.cmp(&b.trace_address));
        let mut frames = frames.into_iter();

        let root = frames.next().ok_or(TraceError::MissingRoot)?;
        if !root.trace_address.is_empty() {
            return Err(TraceError::MissingRoot);
        }

        let mut tree = CallTree::new(root.call);
        let mut by_address: HashMap<Vec<usize>, CallIndex> = HashMap::new();
        by_address.insert(Vec::new(), Self::ROOT);

        for frame in frames {
            if by_address.contains_key(&frame.trace_address) {
                return Err(TraceError::InvalidFrame {
                    trace_address: frame.trace_address,
                    reason: "duplicate trace address".into(),
                });
            }
            let parent_address = &frame.trace_address[..frame.trace_address.len() - 1];
            let parent = *by_address.get(parent_address).ok_or_else(|| TraceError::InvalidFrame {
                trace_address: frame.trace_address.clone(),
                reason: "parent frame missing".into(),
            })?;
            let idx = tree.push_child(parent, frame.call)?;
            by_address.insert(frame.trace_address, idx);
        }

        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, idx: CallIndex) -> Option<&RawCall> {
        self.nodes.get(idx).map(|n| &n.call)
    }

    pub fn root(&self) -> &RawCall {
        &self.nodes[Self::ROOT].call
    }

    pub fn children(&self, idx: CallIndex) -> &[CallIndex] {
        self.nodes.get(idx).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, idx: CallIndex) -> Option<CallIndex> {
        self.nodes.get(idx).and_then(|n| n.parent)
    }

    /// Distance from the root (root = 0).
    pub fn depth(&self, idx: CallIndex) -> usize {
        let mut depth = 0;
        let mut cur = idx;
        while let Some(parent) = self.parent(cur) {
            depth += 1;
            cur = parent;
        }
        depth
    }

    /// False if this node or any ancestor reported an error.
    pub fn succeeded(&self, idx: CallIndex) -> bool {
        let mut cur = Some(idx);
        while let Some(i) = cur {
            match self.nodes.get(i) {
                Some(node) if node.call.error.is_none() => cur = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// Pre-order traversal (parent before children, children in order).
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![Self::ROOT],
        }
    }
}

pub struct Preorder<'a> {
    tree: &'a CallTree,
    stack: Vec<CallIndex>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (CallIndex, &'a RawCall);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let node = self.tree.nodes.get(idx)?;
        self.stack.extend(node.children.iter().rev());
        Some((idx, &node.call))
    }
}

/// A log emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub log_index: u64,
}

impl RawLog {
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// Transaction-level context shared by every decoded element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub chain_id: String,
    pub tx_hash: B256,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tx_index: u64,
    pub sender: Address,
    #[serde(default)]
    pub receiver: Option<Address>,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub gas_used: u64,
    #[serde(default)]
    pub gas_price: u128,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_price_usd: Option<f64>,
}

fn default_success() -> bool {
    true
}

/// Everything the ABI pass needs for one transaction.
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub metadata: TransactionMetadata,
    pub root_call: Option<CallTree>,
    pub logs: Vec<RawLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(kind: CallKind) -> RawCall {
        RawCall::new(kind, Address::repeat_byte(1), Address::repeat_byte(2))
    }

    #[test]
    fn call_kind_parsing() {
        assert_eq!("DELEGATECALL".parse::<CallKind>().unwrap(), CallKind::DelegateCall);
        assert_eq!("suicide".parse::<CallKind>().unwrap(), CallKind::SelfDestruct);
        assert!("jump".parse::<CallKind>().is_err());

        let json = serde_json::to_string(&CallKind::Create2).unwrap();
        assert_eq!(json, "\"create2\"");
        let back: CallKind = serde_json::from_str("\"STATICCALL\"").unwrap();
        assert_eq!(back, CallKind::StaticCall);
    }

    #[test]
    fn frames_build_ordered_tree() {
        let frames = vec![
            TraceFrame { trace_address: vec![1], call: call(CallKind::StaticCall) },
            TraceFrame { trace_address: vec![], call: call(CallKind::Call) },
            TraceFrame { trace_address: vec![0, 0], call: call(CallKind::DelegateCall) },
            TraceFrame { trace_address: vec![0], call: call(CallKind::Call) },
        ];
        let tree = CallTree::from_frames(frames).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.children(CallTree::ROOT).len(), 2);
        let first = tree.children(CallTree::ROOT)[0];
        assert_eq!(tree.get(first).unwrap().kind, CallKind::Call);
        let grandchild = tree.children(first)[0];
        assert_eq!(tree.depth(grandchild), 2);
        assert_eq!(tree.get(grandchild).unwrap().kind, CallKind::DelegateCall);

        let order: Vec<CallKind> = tree.preorder().map(|(_, c)| c.kind).collect();
        assert_eq!(
            order,
            vec![CallKind::Call, CallKind::Call, CallKind::DelegateCall, CallKind::StaticCall]
        );
    }

    #[test]
    fn frames_reject_orphans() {
        let frames = vec![
            TraceFrame { trace_address: vec![], call: call(CallKind::Call) },
            TraceFrame { trace_address: vec![3, 1], call: call(CallKind::Call) },
        ];
        assert!(matches!(
            CallTree::from_frames(frames),
            Err(TraceError::InvalidFrame { .. })
        ));
        assert_eq!(CallTree::from_frames(vec![]), Err(TraceError::MissingRoot));
    }

    #[test]
    fn failure_propagates_downward_only() {
        let mut tree = CallTree::new(call(CallKind::Call));
        let failed = tree
            .push_child(CallTree::ROOT, call(CallKind::Call).with_error("Reverted"))
            .unwrap();
        let below = tree.push_child(failed, call(CallKind::Call)).unwrap();
        let sibling = tree.push_child(CallTree::ROOT, call(CallKind::Call)).unwrap();

        assert!(tree.succeeded(CallTree::ROOT));
        assert!(!tree.succeeded(failed));
        assert!(!tree.succeeded(below));
        assert!(tree.succeeded(sibling));
    }

    #[test]
    fn deep_tree_walks_without_recursion() {
        let mut tree = CallTree::new(call(CallKind::Call));
        let mut cur = CallTree::ROOT;
        for _ in 0..10_000 {
            cur = tree.push_child(cur, call(CallKind::Call)).unwrap();
        }
        assert_eq!(tree.preorder().count(), 10_001);
        assert_eq!(tree.depth(cur), 10_000);
    }
}
