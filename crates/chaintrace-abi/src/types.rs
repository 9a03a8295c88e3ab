//! ABI type grammar.
//!
//! Elementary type names are validated by `alloy_dyn_abi`'s parser; tuples
//! carry their member names from the ABI descriptor so decoded values keep
//! the field names declared by the contract.

use alloy_dyn_abi::DynSolType;
use chaintrace_core::{error::DecodeError, semantics::ParamDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Uint(usize),
    Int(usize),
    Address,
    Bool,
    FixedBytes(usize),
    Bytes,
    String,
    Function,
    Array(Box<AbiType>),
    FixedArray(Box<AbiType>, usize),
    /// Members as `(name, type)`
    Tuple(Vec<(String, AbiType)>),
}

impl AbiType {
    /// Resolve a descriptor, expanding `tuple` from its components.
    pub fn from_param(param: &ParamDescriptor) -> Result<Self, DecodeError> {
        if param.ty.starts_with('(') {
            return Self::parse(&param.ty);
        }
        let (base, suffix) = match param.ty.find('[') {
            Some(i) => param.ty.split_at(i),
            None => (param.ty.as_str(), ""),
        };

        let mut ty = if base == "tuple" {
            let members = param
                .components
                .iter()
                .map(|c| Ok((c.name.clone(), Self::from_param(c)?)))
                .collect::<Result<Vec<_>, DecodeError>>()?;
            AbiType::Tuple(members)
        } else {
            Self::parse(base)?
        };

        for dim in parse_dimensions(suffix).map_err(|reason| DecodeError::InvalidType {
            ty: param.ty.clone(),
            reason,
        })? {
            ty = match dim {
                None => AbiType::Array(Box::new(ty)),
                Some(n) => AbiType::FixedArray(Box::new(ty), n),
            };
        }
        Ok(ty)
    }

    /// Parse a canonical type string (`uint256`, `(address,bool)[]`).
    pub fn parse(ty: &str) -> Result<Self, DecodeError> {
        let parsed: DynSolType = ty.parse().map_err(|e: alloy_dyn_abi::Error| DecodeError::InvalidType {
            ty: ty.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_dyn(&parsed).map_err(|reason| DecodeError::InvalidType {
            ty: ty.to_string(),
            reason,
        })
    }

    fn from_dyn(ty: &DynSolType) -> Result<Self, String> {
        Ok(match ty {
            DynSolType::Bool => AbiType::Bool,
            DynSolType::Int(bits) => AbiType::Int(*bits),
            DynSolType::Uint(bits) => AbiType::Uint(*bits),
            DynSolType::FixedBytes(n) => AbiType::FixedBytes(*n),
            DynSolType::Address => AbiType::Address,
            DynSolType::Function => AbiType::Function,
            DynSolType::Bytes => AbiType::Bytes,
            DynSolType::String => AbiType::String,
            DynSolType::Array(inner) => AbiType::Array(Box::new(Self::from_dyn(inner)?)),
            DynSolType::FixedArray(inner, n) => AbiType::FixedArray(Box::new(Self::from_dyn(inner)?), *n),
            DynSolType::Tuple(items) => AbiType::Tuple(
                items
                    .iter()
                    .map(|t| Ok((String::new(), Self::from_dyn(t)?)))
                    .collect::<Result<Vec<_>, String>>()?,
            ),
            #[allow(unreachable_patterns)]
            other => return Err(format!("unsupported type {other}")),
        })
    }

    pub fn to_dyn(&self) -> DynSolType {
        match self {
            AbiType::Uint(bits) => DynSolType::Uint(*bits),
            AbiType::Int(bits) => DynSolType::Int(*bits),
            AbiType::Address => DynSolType::Address,
            AbiType::Bool => DynSolType::Bool,
            AbiType::FixedBytes(n) => DynSolType::FixedBytes(*n),
            AbiType::Bytes => DynSolType::Bytes,
            AbiType::String => DynSolType::String,
            AbiType::Function => DynSolType::Function,
            AbiType::Array(inner) => DynSolType::Array(Box::new(inner.to_dyn())),
            AbiType::FixedArray(inner, n) => DynSolType::FixedArray(Box::new(inner.to_dyn()), *n),
            AbiType::Tuple(members) => DynSolType::Tuple(members.iter().map(|(_, t)| t.to_dyn()).collect()),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::FixedArray(inner, _) => inner.is_dynamic(),
            AbiType::Tuple(members) => members.iter().any(|(_, t)| t.is_dynamic()),
            _ => false,
        }
    }

    /// Bytes this type occupies in the head of its enclosing scope.
    pub fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            AbiType::FixedArray(inner, n) => inner.head_size().saturating_mul(*n),
            AbiType::Tuple(members) => members
                .iter()
                .fold(0usize, |acc, (_, t)| acc.saturating_add(t.head_size())),
            _ => 32,
        }
    }

    /// Single-word elementary type (the only kind an indexed topic can hold verbatim).
    pub fn is_word(&self) -> bool {
        matches!(
            self,
            AbiType::Uint(_)
                | AbiType::Int(_)
                | AbiType::Address
                | AbiType::Bool
                | AbiType::FixedBytes(_)
                | AbiType::Function
        )
    }

    pub fn canonical(&self) -> String {
        match self {
            AbiType::Uint(bits) => format!("uint{bits}"),
            AbiType::Int(bits) => format!("int{bits}"),
            AbiType::Address => "address".into(),
            AbiType::Bool => "bool".into(),
            AbiType::FixedBytes(n) => format!("bytes{n}"),
            AbiType::Bytes => "bytes".into(),
            AbiType::String => "string".into(),
            AbiType::Function => "function".into(),
            AbiType::Array(inner) => format!("{}[]", inner.canonical()),
            AbiType::FixedArray(inner, n) => format!("{}[{n}]", inner.canonical()),
            AbiType::Tuple(members) => {
                let inner: Vec<String> = members.iter().map(|(_, t)| t.canonical()).collect();
                format!("({})", inner.join(","))
            }
        }
    }
}

/// `"[2][]"` → `[Some(2), None]`
fn parse_dimensions(suffix: &str) -> Result<Vec<Option<usize>>, String> {
    let mut dims = Vec::new();
    let mut rest = suffix;
    while !rest.is_empty() {
        let body = rest
            .strip_prefix('[')
            .ok_or_else(|| format!("unexpected '{rest}' in array suffix"))?;
        let close = body.find(']').ok_or("unterminated array suffix")?;
        let size = &body[..close];
        if size.is_empty() {
            dims.push(None);
        } else {
            let n = size
                .parse::<usize>()
                .map_err(|_| format!("invalid array length '{size}'"))?;
            dims.push(Some(n));
        }
        rest = &body[close + 1..];
    }
    Ok(dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elementary_types_resolve() {
        assert_eq!(AbiType::parse("uint").unwrap(), AbiType::Uint(256));
        assert_eq!(AbiType::parse("bytes32").unwrap(), AbiType::FixedBytes(32));
        assert!(AbiType::parse("uint7").is_err());
        assert!(AbiType::parse("strin").is_err());
    }

    #[test]
    fn array_suffixes_apply_left_to_right() {
        let p = ParamDescriptor::new("grid", "uint8[2][]");
        let ty = AbiType::from_param(&p).unwrap();
        assert_eq!(
            ty,
            AbiType::Array(Box::new(AbiType::FixedArray(Box::new(AbiType::Uint(8)), 2)))
        );
        assert_eq!(ty.canonical(), "uint8[2][]");
        assert!(ty.is_dynamic());
    }

    #[test]
    fn tuple_head_sizes() {
        let p = ParamDescriptor::with_components(
            "pair",
            "tuple[3]",
            vec![ParamDescriptor::new("a", "address"), ParamDescriptor::new("b", "uint128")],
        );
        let ty = AbiType::from_param(&p).unwrap();
        assert!(!ty.is_dynamic());
        assert_eq!(ty.head_size(), 3 * 64);
        assert_eq!(ty.canonical(), "(address,uint128)[3]");

        let dynamic = ParamDescriptor::with_components(
            "pair",
            "tuple",
            vec![ParamDescriptor::new("a", "string")],
        );
        assert_eq!(AbiType::from_param(&dynamic).unwrap().head_size(), 32);
    }

    #[test]
    fn malformed_suffix_is_rejected() {
        let p = ParamDescriptor::new("x", "uint256[2");
        assert!(matches!(
            AbiType::from_param(&p),
            Err(DecodeError::InvalidType { .. })
        ));
    }
}
