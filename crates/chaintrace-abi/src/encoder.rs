//! ABI encoder for decoded arguments.
//!
//! Converts [`DecodedArgument`] values back into alloy `DynSolValue`s and
//! encodes them, so decoded calls can be re-encoded and compared with the
//! original calldata, and so the repository can build `eth_call` payloads.

use crate::types::AbiType;
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Function, B256};
use chaintrace_core::{
    decoded::{ArgValue, DecodedArgument},
    error::DecodeError,
    semantics::ParamDescriptor,
};

/// Encode `args` as a parameter tuple matching `params`.
pub fn encode_arguments(params: &[ParamDescriptor], args: &[DecodedArgument]) -> Result<Vec<u8>, DecodeError> {
    if params.len() != args.len() {
        return Err(DecodeError::ArityMismatch {
            expected: params.len(),
            got: args.len(),
        });
    }
    let values = params
        .iter()
        .zip(args)
        .map(|(param, arg)| to_dyn_value(&AbiType::from_param(param)?, &arg.value, &param.name))
        .collect::<Result<Vec<_>, DecodeError>>()?;
    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Selector followed by the encoded arguments.
pub fn encode_call(
    selector: [u8; 4],
    params: &[ParamDescriptor],
    args: &[DecodedArgument],
) -> Result<Vec<u8>, DecodeError> {
    let mut out = selector.to_vec();
    out.extend(encode_arguments(params, args)?);
    Ok(out)
}

fn to_dyn_value(ty: &AbiType, value: &ArgValue, name: &str) -> Result<DynSolValue, DecodeError> {
    let mismatch = || DecodeError::TypeMismatch {
        name: name.to_string(),
        expected: ty.canonical(),
    };

    Ok(match (ty, value) {
        (AbiType::Uint(bits), ArgValue::Uint(v)) => DynSolValue::Uint(*v, *bits),
        (AbiType::Int(bits), ArgValue::Int(v)) => DynSolValue::Int(*v, *bits),
        (AbiType::Bool, ArgValue::Bool(b)) => DynSolValue::Bool(*b),
        (AbiType::Address, ArgValue::Address(s)) => {
            DynSolValue::Address(s.parse::<Address>().map_err(|_| mismatch())?)
        }
        (AbiType::FixedBytes(n), ArgValue::Bytes(b)) if b.len() == *n => {
            let mut word = [0u8; 32];
            word[..*n].copy_from_slice(b);
            DynSolValue::FixedBytes(B256::from(word), *n)
        }
        (AbiType::Function, ArgValue::Bytes(b)) => {
            let raw = <[u8; 24]>::try_from(&b[..]).map_err(|_| mismatch())?;
            DynSolValue::Function(Function::from(raw))
        }
        (AbiType::Bytes, ArgValue::Bytes(b)) => DynSolValue::Bytes(b.to_vec()),
        (AbiType::String, ArgValue::Str(s)) => DynSolValue::String(s.clone()),
        (AbiType::Array(inner), ArgValue::Array(items)) => DynSolValue::Array(
            items
                .iter()
                .map(|item| to_dyn_value(inner, &item.value, name))
                .collect::<Result<_, _>>()?,
        ),
        (AbiType::FixedArray(inner, n), ArgValue::Array(items)) if items.len() == *n => DynSolValue::FixedArray(
            items
                .iter()
                .map(|item| to_dyn_value(inner, &item.value, name))
                .collect::<Result<_, _>>()?,
        ),
        (AbiType::Tuple(members), ArgValue::Tuple(items)) if items.len() == members.len() => DynSolValue::Tuple(
            members
                .iter()
                .zip(items)
                .map(|((member_name, member), item)| to_dyn_value(member, &item.value, member_name))
                .collect::<Result<_, _>>()?,
        ),
        _ => return Err(mismatch()),
    })
}
