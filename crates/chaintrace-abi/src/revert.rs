//! Revert reasons carried in the return data of failed calls.
//!
//! `require(cond, "message")` returns `0x08c379a0` ++ ABI-encode(string);
//! Solidity ≥0.8 checked failures return `0x4e487b71` ++ ABI-encode(uint256).

use crate::codec::decode_parameters;
use chaintrace_core::{
    decoded::{ArgValue, DecodedArgument},
    semantics::ParamDescriptor,
};

const ERROR_PREFIX: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
const PANIC_PREFIX: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Name of the synthetic output carrying a revert reason.
pub const REVERT_OUTPUT_NAME: &str = "Error";

/// Compiler-inserted panic codes.
const PANIC_CODES: &[(u64, &str)] = &[
    (0x00, "generic panic"),
    (0x01, "assertion failed"),
    (0x11, "arithmetic overflow or underflow"),
    (0x12, "division or modulo by zero"),
    (0x21, "value out of range for enum"),
    (0x22, "incorrectly encoded storage byte array"),
    (0x31, "pop on an empty array"),
    (0x32, "array index out of bounds"),
    (0x41, "memory allocation too large"),
    (0x51, "call to an uninitialized function pointer"),
];

fn single_word(payload: &[u8], ty: &str) -> Option<ArgValue> {
    let mut args = decode_parameters(&[ParamDescriptor::new("", ty)], payload).ok()?;
    args.pop().map(|a| a.value)
}

fn reason(output: &[u8]) -> Option<String> {
    if let Some(payload) = output.strip_prefix(&ERROR_PREFIX[..]) {
        return single_word(payload, "string")?.as_str().map(str::to_owned);
    }
    let payload = output.strip_prefix(&PANIC_PREFIX[..])?;
    let code = u64::try_from(single_word(payload, "uint256")?.as_uint()?).ok()?;
    let meaning = PANIC_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map_or("unknown panic code", |(_, m)| m);
    Some(format!("Panic(0x{code:02x}): {meaning}"))
}

/// Decode the return data of a failed call into a single `Error` output.
pub fn decode_revert(output: &[u8]) -> Option<DecodedArgument> {
    reason(output).map(|r| DecodedArgument::new(REVERT_OUTPUT_NAME, "string", ArgValue::Str(r)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_dyn_abi::DynSolValue;
    use alloy_primitives::U256;

    fn revert_data(prefix: [u8; 4], value: DynSolValue) -> Vec<u8> {
        let mut data = prefix.to_vec();
        data.extend(DynSolValue::Tuple(vec![value]).abi_encode_params());
        data
    }

    #[test]
    fn require_message() {
        let data = revert_data(ERROR_PREFIX, DynSolValue::String("ERC20: insufficient allowance".into()));
        let arg = decode_revert(&data).unwrap();
        assert_eq!(arg.name, "Error");
        assert_eq!(arg.value, ArgValue::Str("ERC20: insufficient allowance".into()));
    }

    #[test]
    fn panic_codes_are_described() {
        let data = revert_data(PANIC_PREFIX, DynSolValue::Uint(U256::from(0x12), 256));
        assert_eq!(
            decode_revert(&data).unwrap().value,
            ArgValue::Str("Panic(0x12): division or modulo by zero".into())
        );
        let data = revert_data(PANIC_PREFIX, DynSolValue::Uint(U256::from(0x99), 256));
        assert_eq!(
            decode_revert(&data).unwrap().value,
            ArgValue::Str("Panic(0x99): unknown panic code".into())
        );
    }

    #[test]
    fn unrecognised_data_has_no_reason() {
        assert!(decode_revert(&[]).is_none());
        assert!(decode_revert(&[0x08, 0xc3]).is_none());
        assert!(decode_revert(&hex::decode("deadbeef").unwrap()).is_none());
        // Error selector with a truncated string payload.
        assert!(decode_revert(&ERROR_PREFIX).is_none());
    }
}
