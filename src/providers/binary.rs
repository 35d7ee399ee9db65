//! Binary normalisation shared by the formatters.

use base64::Engine;

use crate::error::{HostError, Result};
use crate::session::BinarySource;

/// A binary part reduced to the two shapes providers accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryPayload {
    /// Inline base64 data with its MIME type.
    Base64 { data: String, mime_type: String },
    /// Remote URL the provider fetches itself.
    Url { url: String, mime_type: String },
}

impl BinaryPayload {
    pub fn mime_type(&self) -> &str {
        match self {
            BinaryPayload::Base64 { mime_type, .. } | BinaryPayload::Url { mime_type, .. } => {
                mime_type
            }
        }
    }

    /// `data:` URL for inline payloads, the URL itself otherwise.
    pub fn to_url(&self) -> String {
        match self {
            BinaryPayload::Base64 { data, mime_type } => {
                format!("data:{};base64,{}", mime_type, data)
            }
            BinaryPayload::Url { url, .. } => url.clone(),
        }
    }
}

/// Reduce a [`BinarySource`] to inline base64 or a remote URL.
///
/// Raw bytes are encoded. `data:` URLs are unpacked into inline base64; a
/// MIME type embedded in the URL takes precedence over `mime_type`.
pub fn extract_binary_as_base64_or_url(
    source: &BinarySource,
    mime_type: &str,
) -> Result<BinaryPayload> {
    match source {
        BinarySource::Base64(data) => Ok(BinaryPayload::Base64 {
            data: data.clone(),
            mime_type: mime_type.to_string(),
        }),
        BinarySource::Bytes(bytes) => Ok(BinaryPayload::Base64 {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.to_string(),
        }),
        BinarySource::Url(url) if url.starts_with("data:") => parse_data_url(url, mime_type),
        BinarySource::Url(url) => Ok(BinaryPayload::Url {
            url: url.clone(),
            mime_type: mime_type.to_string(),
        }),
    }
}

fn parse_data_url(url: &str, fallback_mime: &str) -> Result<BinaryPayload> {
    let rest = &url["data:".len()..];
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| HostError::Format("malformed data URL: missing ','".into()))?;

    let is_base64 = header.ends_with(";base64");
    let mime = header
        .trim_end_matches(";base64")
        .split(';')
        .next()
        .unwrap_or_default();
    let mime_type = if mime.is_empty() {
        fallback_mime.to_string()
    } else {
        mime.to_string()
    };

    let data = if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| HostError::Format(format!("invalid base64 in data URL: {}", e)))?;
        payload.to_string()
    } else {
        base64::engine::general_purpose::STANDARD.encode(payload.as_bytes())
    };

    Ok(BinaryPayload::Base64 { data, mime_type })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_are_encoded() {
        let payload =
            extract_binary_as_base64_or_url(&BinarySource::Bytes(b"hi".to_vec()), "text/plain")
                .unwrap();
        assert_eq!(
            payload,
            BinaryPayload::Base64 {
                data: "aGk=".into(),
                mime_type: "text/plain".into()
            }
        );
    }

    #[test]
    fn test_remote_url_passes_through() {
        let src = BinarySource::Url("https://example.com/cat.png".into());
        let payload = extract_binary_as_base64_or_url(&src, "image/png").unwrap();
        assert_eq!(payload.to_url(), "https://example.com/cat.png");
        assert_eq!(payload.mime_type(), "image/png");
    }

    #[test]
    fn test_data_url_is_unpacked() {
        let src = BinarySource::Url("data:image/jpeg;base64,AAEC".into());
        let payload = extract_binary_as_base64_or_url(&src, "image/png").unwrap();
        assert_eq!(
            payload,
            BinaryPayload::Base64 {
                data: "AAEC".into(),
                mime_type: "image/jpeg".into()
            }
        );
    }

    #[test]
    fn test_plain_data_url_is_encoded() {
        let src = BinarySource::Url("data:,hi".into());
        let payload = extract_binary_as_base64_or_url(&src, "text/plain").unwrap();
        assert_eq!(payload.to_url(), "data:text/plain;base64,aGk=");
    }

    #[test]
    fn test_malformed_data_url() {
        let src = BinarySource::Url("data:image/png;base64".into());
        assert!(extract_binary_as_base64_or_url(&src, "image/png").is_err());

        let src = BinarySource::Url("data:image/png;base64,@@@".into());
        assert!(extract_binary_as_base64_or_url(&src, "image/png").is_err());
    }
}
