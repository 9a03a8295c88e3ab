//! # chaintrace-core
//!
//! Core types, collaborator traits, and the error taxonomy shared by every
//! ChainTrace crate. The ABI codec, the semantics repository and the
//! decoding pipeline are all built on the model defined here.

pub mod chain;
pub mod decoded;
pub mod error;
pub mod fixture;
pub mod provider;
pub mod semantics;
pub mod trace;
pub mod validate;

pub use chain::{chains, ChainId};
pub use decoded::{
    format_signed_units, format_units, AddressInfo, ArgValue, BalanceDelta, DecodedArgument, DecodedCall,
    DecodedEvent, FullDecodedTransaction, Stage, StageFailure, TokenDelta, TokenRef, Transfer,
};
pub use error::{DecodeError, DecoderError, ErrorRecord, ErrorStatus, ProviderError, StoreError, TraceError};
pub use provider::{
    with_timeout, AbiSource, BlockInfo, ChainDataProvider, MetadataStore, PriceFeed, ReceiptInfo,
    TransactionInfo, VerifiedAbi,
};
pub use semantics::{
    AddressMetadata, ContractMetadata, DelegationMap, Erc20Data, EventSignature, FunctionSignature, ParamDescriptor,
    StoredAddress, TokenIdentity, TokenProxyMap, TokenStandard, Transformation, TransformationTable,
};
pub use trace::{CallIndex, CallKind, CallTree, RawCall, RawLog, RawTransaction, TraceFrame, TransactionMetadata};

use alloy_primitives::Address;

/// Lower-cased `0x`-prefixed hex form of an address.
pub fn address_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}
