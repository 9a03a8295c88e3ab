//! Messages embedded in the input of plain value transfers to EOAs.

use chaintrace_core::decoded::{ArgValue, DecodedArgument};

/// Best-effort: printable UTF-8 input (NUL padding stripped) becomes a single
/// `message` argument; anything else yields nothing.
pub fn decode_graffiti(input: &[u8]) -> Vec<DecodedArgument> {
    let trimmed = trim_nul(input);
    if trimmed.is_empty() {
        return Vec::new();
    }
    match std::str::from_utf8(trimmed) {
        Ok(text) if text.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
            vec![DecodedArgument::new("message", "string", ArgValue::Str(text.to_string()))]
        }
        _ => Vec::new(),
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| *b != 0).map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_text_is_extracted() {
        let args = decode_graffiti(b"gm frens\n\0\0");
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].name, "message");
        assert_eq!(args[0].value, ArgValue::Str("gm frens\n".into()));
    }

    #[test]
    fn binary_input_is_ignored() {
        assert!(decode_graffiti(&[]).is_empty());
        assert!(decode_graffiti(&[0, 0, 0]).is_empty());
        assert!(decode_graffiti(&[0xa9, 0x05, 0x9c, 0xbb]).is_empty());
        assert!(decode_graffiti(&[0x01, 0x02, b'a']).is_empty());
    }
}
