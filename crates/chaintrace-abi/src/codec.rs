//! Word-stream ABI decoder.
//!
//! # Layout
//! - Every value occupies a 32-byte head slot in its scope (static tuples and
//!   fixed arrays occupy consecutive slots).
//! - A dynamic value's head slot holds a byte offset, relative to the start of
//!   the enclosing scope, to its tail.
//! - `bytes`/`string`/`T[]` tails begin with a length word; `T[]` elements
//!   form a new scope starting right after it.
//!
//! All offsets and lengths are bounds-checked before use, so malformed data
//! yields a [`DecodeError`] naming the parameter and never panics.
//!
//! Offsets may legally point anywhere, so several heads can alias one tail.
//! Every value read from a word spends one unit of a [`Budget`] sized to the
//! data's word count; a well-formed encoding never reads more values than it
//! has words, while aliased tails that would fan out into more are rejected.

use crate::types::AbiType;
use alloy_primitives::{Bytes, B256, I256, U256};
use chaintrace_core::{
    decoded::{ArgValue, DecodedArgument},
    error::DecodeError,
    semantics::ParamDescriptor,
};

/// Decode a parameter list from ABI-encoded data (calldata without the
/// selector, return data, or a log's data blob).
pub fn decode_parameters(params: &[ParamDescriptor], data: &[u8]) -> Result<Vec<DecodedArgument>, DecodeError> {
    let items = params
        .iter()
        .enumerate()
        .map(|(i, p)| Ok((i, p, AbiType::from_param(p)?)))
        .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(decode_sequence(&items, data)?
        .into_iter()
        .map(|(_, arg)| arg)
        .collect())
}

/// Decode an event's parameters from its topics and data blob.
///
/// Topics are consumed from index 1, or from index 0 when `anonymous`.
/// Indexed single-word values decode from their topic; any other indexed
/// type was hashed by the EVM and surfaces as [`ArgValue::TopicHash`].
/// Results keep declaration order.
pub fn decode_event_parameters(
    params: &[ParamDescriptor],
    topics: &[B256],
    data: &[u8],
    anonymous: bool,
) -> Result<Vec<DecodedArgument>, DecodeError> {
    let mut topic_cursor = usize::from(!anonymous);
    let mut slots: Vec<Option<DecodedArgument>> = vec![None; params.len()];
    let mut body = Vec::new();

    for (index, param) in params.iter().enumerate() {
        let ty = AbiType::from_param(param)?;
        if !param.indexed {
            body.push((index, param, ty));
            continue;
        }
        let topic = topics
            .get(topic_cursor)
            .ok_or_else(|| param_error(index, param, format!("missing topic {topic_cursor}")))?;
        topic_cursor += 1;
        let value = if ty.is_word() {
            decode_value(&ty, topic.as_slice(), &mut Budget::for_data(topic.as_slice()))
                .map_err(|r| param_error(index, param, r))?
        } else {
            ArgValue::TopicHash(*topic)
        };
        slots[index] = Some(DecodedArgument::new(param.name.clone(), ty.canonical(), value));
    }

    for (index, arg) in decode_sequence(&body, data)? {
        slots[index] = Some(arg);
    }
    Ok(slots.into_iter().flatten().collect())
}

fn decode_sequence(
    items: &[(usize, &ParamDescriptor, AbiType)],
    data: &[u8],
) -> Result<Vec<(usize, DecodedArgument)>, DecodeError> {
    let mut out = Vec::with_capacity(items.len());
    let mut head = 0usize;
    let mut budget = Budget::for_data(data);
    for (index, param, ty) in items {
        let value = decode_head(ty, data, head, &mut budget).map_err(|r| param_error(*index, param, r))?;
        out.push((*index, DecodedArgument::new(param.name.clone(), ty.canonical(), value)));
        head = head.saturating_add(ty.head_size());
    }
    Ok(out)
}

fn param_error(index: usize, param: &ParamDescriptor, reason: String) -> DecodeError {
    DecodeError::Parameter {
        index,
        name: param.name.clone(),
        reason,
    }
}

/// Values left to decode from one data blob.
struct Budget {
    remaining: usize,
    words: usize,
}

impl Budget {
    fn for_data(data: &[u8]) -> Self {
        let words = data.len() / 32;
        Self { remaining: words, words }
    }

    fn spend(&mut self) -> Result<(), String> {
        self.remaining = self.remaining.checked_sub(1).ok_or_else(|| {
            format!("offsets alias: more values than the {} words of data can hold", self.words)
        })?;
        Ok(())
    }
}

/// Decode the value whose head slot sits at `pos` within `scope`.
fn decode_head(ty: &AbiType, scope: &[u8], pos: usize, budget: &mut Budget) -> Result<ArgValue, String> {
    let start = if ty.is_dynamic() { read_usize(scope, pos)? } else { pos };
    let tail = scope
        .get(start..)
        .ok_or_else(|| format!("offset {start} out of bounds ({} bytes)", scope.len()))?;
    decode_value(ty, tail, budget)
}

/// Decode a value whose encoding starts at the beginning of `s`.
fn decode_value(ty: &AbiType, s: &[u8], budget: &mut Budget) -> Result<ArgValue, String> {
    let value = match ty {
        AbiType::Uint(_) => ArgValue::Uint(U256::from_be_slice(word(s, 0)?)),
        AbiType::Int(_) => ArgValue::Int(I256::from_raw(U256::from_be_slice(word(s, 0)?))),
        AbiType::Address => {
            let w = word(s, 0)?;
            ArgValue::Address(format!("0x{}", hex::encode(&w[12..])))
        }
        AbiType::Bool => ArgValue::Bool(word(s, 0)?.iter().any(|b| *b != 0)),
        AbiType::FixedBytes(n) => {
            let w = word(s, 0)?;
            ArgValue::Bytes(Bytes::copy_from_slice(&w[..(*n).min(32)]))
        }
        AbiType::Function => ArgValue::Bytes(Bytes::copy_from_slice(&word(s, 0)?[..24])),
        AbiType::Bytes => ArgValue::Bytes(Bytes::copy_from_slice(length_prefixed(s)?)),
        AbiType::String => ArgValue::Str(String::from_utf8_lossy(length_prefixed(s)?).into_owned()),
        AbiType::Array(inner) => {
            let len = read_usize(s, 0)?;
            budget.spend()?;
            return decode_elements(inner, len, &s[32..], budget).map(ArgValue::Array);
        }
        // Composites read no word of their own.
        AbiType::FixedArray(inner, n) => return decode_elements(inner, *n, s, budget).map(ArgValue::Array),
        AbiType::Tuple(members) => {
            let mut out = Vec::with_capacity(members.len());
            let mut head = 0usize;
            for (name, member) in members {
                let value = decode_head(member, s, head, budget).map_err(|r| format!("{name}: {r}"))?;
                out.push(DecodedArgument::new(name.clone(), member.canonical(), value));
                head = head.saturating_add(member.head_size());
            }
            return Ok(ArgValue::Tuple(out));
        }
    };
    budget.spend()?;
    Ok(value)
}

fn decode_elements(
    inner: &AbiType,
    len: usize,
    scope: &[u8],
    budget: &mut Budget,
) -> Result<Vec<DecodedArgument>, String> {
    let stride = inner.head_size();
    let needed = len.checked_mul(stride.max(1)).ok_or("array length overflow")?;
    if needed > scope.len() {
        return Err(format!(
            "array of {len} elements needs {needed} bytes, have {}",
            scope.len()
        ));
    }
    let type_name = inner.canonical();
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let value = decode_head(inner, scope, i * stride, budget).map_err(|r| format!("[{i}]: {r}"))?;
        out.push(DecodedArgument::new(String::new(), type_name.clone(), value));
    }
    Ok(out)
}

fn word(scope: &[u8], pos: usize) -> Result<&[u8], String> {
    let end = pos.checked_add(32).ok_or("offset overflow")?;
    scope
        .get(pos..end)
        .ok_or_else(|| format!("data too short: need {end} bytes, have {}", scope.len()))
}

fn read_usize(scope: &[u8], pos: usize) -> Result<usize, String> {
    let raw = U256::from_be_slice(word(scope, pos)?);
    u64::try_from(raw)
        .ok()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| format!("word at byte {pos} is not a valid offset or length"))
}

fn length_prefixed(s: &[u8]) -> Result<&[u8], String> {
    let len = read_usize(s, 0)?;
    let end = len.checked_add(32).ok_or("length overflow")?;
    s.get(32..end)
        .ok_or_else(|| format!("length {len} exceeds available {} bytes", s.len().saturating_sub(32)))
}
