//! Built-in skill providers
//!
//! - [`FsProvider`]: skills stored as directories holding a `SKILL.md`
//! - [`InMemoryProvider`]: skills registered programmatically

pub mod fs;
pub mod memory;

pub use fs::{FsProvider, FsProviderConfig};
pub use memory::{InMemoryProvider, MemorySkill};

use base64::Engine;

use crate::core::types::{ResourceEncoding, SkillResource};
use crate::error::{Error, Result};

/// Default cap on returned resource content
pub const DEFAULT_MAX_RESOURCE_BYTES: usize = 256 * 1024;

/// Encode raw resource bytes, cutting at `max_bytes`
pub(crate) fn encode_resource(
    location: &str,
    bytes: &[u8],
    encoding: ResourceEncoding,
    max_bytes: usize,
) -> Result<SkillResource> {
    let total = bytes.len() as u64;
    let truncated = bytes.len() > max_bytes;
    let kept = &bytes[..bytes.len().min(max_bytes)];

    let content = match encoding {
        ResourceEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(kept),
        ResourceEncoding::Utf8 => match std::str::from_utf8(kept) {
            Ok(text) => text.to_string(),
            // A cut may land inside a multi-byte character.
            Err(e) if truncated && e.error_len().is_none() => {
                String::from_utf8_lossy(&kept[..e.valid_up_to()]).into_owned()
            }
            Err(_) => {
                return Err(Error::InvalidArgument(format!(
                    "resource '{location}' is not valid UTF-8; request base64 encoding"
                )))
            }
        },
    };

    Ok(SkillResource {
        location: location.to_string(),
        encoding,
        content,
        truncated,
        bytes: total,
    })
}

/// Cut `text` to at most `max_bytes` on a character boundary
pub(crate) fn truncate_utf8(text: &str, max_bytes: usize) -> (String, bool) {
    if text.len() <= max_bytes {
        return (text.to_string(), false);
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (text[..end].to_string(), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_utf8_and_base64() {
        let text = encode_resource("a.txt", b"hello", ResourceEncoding::Utf8, 1024).unwrap();
        assert_eq!(text.content, "hello");
        assert!(!text.truncated);

        let b64 = encode_resource("a.bin", &[0xff, 0x00], ResourceEncoding::Base64, 1024).unwrap();
        assert_eq!(b64.content, "/wA=");
        assert_eq!(b64.bytes, 2);
    }

    #[test]
    fn test_encode_rejects_binary_as_utf8() {
        let err = encode_resource("a.bin", &[0xff, 0xfe], ResourceEncoding::Utf8, 1024).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let resource = encode_resource("a.txt", "héllo".as_bytes(), ResourceEncoding::Utf8, 2).unwrap();
        assert_eq!(resource.content, "h");
        assert!(resource.truncated);
        assert_eq!(resource.bytes, 6);

        assert_eq!(truncate_utf8("héllo", 2), ("h".to_string(), true));
        assert_eq!(truncate_utf8("abc", 10), ("abc".to_string(), false));
    }
}
