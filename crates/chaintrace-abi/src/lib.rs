//! # chaintrace-abi
//!
//! EVM ABI parameter codec for ChainTrace.
//!
//! ## Features
//! - Word-stream decoding of function inputs/outputs and event logs, with
//!   errors that name the failing parameter
//! - Type grammar resolved through alloy-rs (`alloy-dyn-abi`)
//! - ABI JSON parsing (`alloy-json-abi`) into contract metadata
//! - Selector/topic fingerprints, revert reasons, ERC20/ERC721 tables

pub mod abi_json;
pub mod codec;
pub mod encoder;
pub mod fingerprint;
pub mod graffiti;
pub mod revert;
pub mod standards;
pub mod types;

pub use abi_json::{parse_abi, ParsedAbi};
pub use codec::{decode_event_parameters, decode_parameters};
pub use encoder::{encode_arguments, encode_call};
pub use fingerprint::{calldata_selector, event_topic, function_selector, selector_hex, topic_hex};
pub use graffiti::decode_graffiti;
pub use revert::{decode_revert, REVERT_OUTPUT_NAME};
pub use standards::{classify, looks_like_erc20, well_known_event};
pub use types::AbiType;
