//! Hex decoding for transport-reported byte strings.
//!
//! Transports report identifiers as contiguous hex (`"04A1B2C3"`) and
//! historical bytes as colon-delimited hex (`"04:1A:2B"`). Both decoders fail
//! closed: a single malformed token discards the whole value.

/// Decode a colon-delimited hex string such as `"04:1A:2B"`.
///
/// Each token must be one or two hex digits. Returns `None` if any token is
/// empty or not valid hex, so an empty input is `None` too; a partial
/// sequence is never returned.
pub fn decode_colon_hex(input: &str) -> Option<Vec<u8>> {
    input
        .trim()
        .split(':')
        .map(|token| {
            let token = token.trim();
            if token.is_empty()
                || token.len() > 2
                || !token.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return None;
            }
            u8::from_str_radix(token, 16).ok()
        })
        .collect()
}

/// Decode a hex identifier such as `"04A1B2C3"` or `"04:a1:b2:c3"`.
///
/// Separating colons are ignored. Odd digit counts and non-hex characters
/// yield `None`.
pub fn decode_hex_id(input: &str) -> Option<Vec<u8>> {
    let digits: String = input.trim().chars().filter(|&c| c != ':').collect();
    ::hex::decode(digits).ok()
}

/// Encode bytes as upper-case hex without separators.
pub fn encode_hex(bytes: &[u8]) -> String {
    ::hex::encode_upper(bytes)
}
