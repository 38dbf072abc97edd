//! Resource URIs: `data:` URIs and relative paths.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::util::{Error, Result};

/// True for inline `data:` URIs.
#[inline]
pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Decode a base64 `data:` URI into its MIME type and payload.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::invalid(format!("not a data URI: {uri:.32}")))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::invalid("data URI without payload"))?;
    let Some(mime) = header.strip_suffix(";base64") else {
        return Err(Error::invalid(format!("data URI is not base64: {header}")));
    };
    Ok((mime.to_string(), STANDARD.decode(payload)?))
}

/// Encode bytes as a base64 `data:` URI.
pub fn encode_data_uri(mime_type: &str, data: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(data))
}

/// Undo percent-encoding in a relative URI, leaving invalid escapes as-is.
pub fn decode_uri_path(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_round_trip() {
        let uri = encode_data_uri("application/octet-stream", &[1, 2, 3, 4]);
        assert!(is_data_uri(&uri));
        let (mime, data) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "application/octet-stream");
        assert_eq!(data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_bad_data_uri() {
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(matches!(
            decode_data_uri("data:application/octet-stream;base64,!!!"),
            Err(Error::Base64(_))
        ));
    }

    #[test]
    fn test_percent_decoding() {
        assert_eq!(decode_uri_path("my%20mesh.bin"), "my mesh.bin");
        assert_eq!(decode_uri_path("100%"), "100%");
    }
}
