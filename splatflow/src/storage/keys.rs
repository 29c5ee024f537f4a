//! Object keys carried in shared-download URLs.
//!
//! Share links end in the object key, base64-encoded with either alphabet
//! and usually without padding.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;

use crate::errors::{Result, SplatflowError};

/// Pads `encoded` with `=` to a multiple of four characters.
#[must_use]
pub fn pad_base64(encoded: &str) -> String {
    let trimmed = encoded.trim_end_matches('=');
    let padding = (4 - trimmed.len() % 4) % 4;
    let mut padded = String::with_capacity(trimmed.len() + padding);
    padded.push_str(trimmed);
    padded.extend(std::iter::repeat('=').take(padding));
    padded
}

/// Decodes a base64 object key, accepting URL-safe or standard alphabets
/// with or without padding.
///
/// # Errors
///
/// Returns [`SplatflowError::Storage`] when the value is not base64 or does
/// not decode to UTF-8.
pub fn decode_base64_key(encoded: &str) -> Result<String> {
    let padded = pad_base64(encoded);
    let bytes = URL_SAFE
        .decode(&padded)
        .or_else(|_| STANDARD.decode(&padded))
        .map_err(|e| SplatflowError::storage(format!("invalid base64 object key '{encoded}': {e}")))?;

    String::from_utf8(bytes)
        .map_err(|_| SplatflowError::storage(format!("object key '{encoded}' is not valid UTF-8")))
}

/// Extracts the object key from a shared-download URL.
///
/// The last path segment is the base64-encoded key.
///
/// # Errors
///
/// Returns [`SplatflowError::Storage`] when the URL has no final segment, or
/// the segment does not decode to a printable key.
pub fn object_key_from_url(url: &str) -> Result<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| SplatflowError::storage(format!("no object key in '{url}'")))?;

    let key = decode_base64_key(segment)?;
    if key.is_empty() || key.contains(char::is_control) {
        return Err(SplatflowError::storage(format!(
            "segment '{segment}' of '{url}' is not a base64 object key"
        )));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_base64() {
        assert_eq!(pad_base64("YQ"), "YQ==");
        assert_eq!(pad_base64("YWI"), "YWI=");
        assert_eq!(pad_base64("YWJj"), "YWJj");
        assert_eq!(pad_base64("YQ=="), "YQ==");
    }

    #[test]
    fn test_decode_unpadded_key() {
        // "videos/intro.mp4"
        assert_eq!(decode_base64_key("dmlkZW9zL2ludHJvLm1wNA").unwrap(), "videos/intro.mp4");
    }

    #[test]
    fn test_decode_url_safe_alphabet() {
        // "a?>b" encodes to "YT8-Yg" in the URL-safe alphabet.
        assert_eq!(decode_base64_key("YT8-Yg").unwrap(), "a?>b");
        assert_eq!(decode_base64_key("YT8+Yg==").unwrap(), "a?>b");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_base64_key("not base64!").is_err());
    }

    #[test]
    fn test_object_key_from_share_url() {
        let url = "https://share.example.com/api/v1/download-shared-object/dmlkZW9zL2ludHJvLm1wNA?x=1";
        assert_eq!(object_key_from_url(url).unwrap(), "videos/intro.mp4");
    }

    #[test]
    fn test_object_key_rejects_plain_url() {
        let err = object_key_from_url("http://minio:9000/videos/intro.mp4").unwrap_err();
        assert!(matches!(err, SplatflowError::Storage(_)));
        assert!(err.to_string().contains("intro.mp4"));
    }

    #[test]
    fn test_object_key_requires_segment() {
        assert!(object_key_from_url("").is_err());
    }
}
