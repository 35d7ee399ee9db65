//! Capability-based attachment filtering.
//!
//! Before a history is formatted, every image/file part whose MIME type
//! the active model cannot accept is dropped or replaced by a text note,
//! depending on the configured [`AttachmentPolicy`].

use once_cell::sync::Lazy;

use crate::config::{AttachmentPolicy, ProviderKind};
use crate::session::{ContentPart, Message, MessageContent};

const TEXT_ONLY: &[&str] = &[];
const VISION: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];
const VISION_PDF: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "application/pdf",
];
const GEMINI_MEDIA: &[&str] = &[
    "image/*",
    "audio/*",
    "video/*",
    "application/pdf",
    "text/plain",
];

/// Accepted MIME patterns as `(provider, model prefix, patterns)`.
///
/// Longest prefix wins; a model with no matching row is text-only.
static MEDIA_SUPPORT: Lazy<Vec<(ProviderKind, &'static str, &'static [&'static str])>> =
    Lazy::new(|| {
        use ProviderKind::*;
        vec![
            (Openai, "gpt-3.5", TEXT_ONLY),
            (Openai, "gpt-4-turbo", VISION),
            (Openai, "gpt-4o", VISION_PDF),
            (Openai, "gpt-4.1", VISION_PDF),
            (Openai, "gpt-5", VISION_PDF),
            (Openai, "o1", VISION),
            (Openai, "o3", VISION),
            (Openai, "o4", VISION),
            (Anthropic, "claude-2", TEXT_ONLY),
            (Anthropic, "claude-", VISION_PDF),
            (Gemini, "gemini-", GEMINI_MEDIA),
        ]
    });

/// Whether `model` accepts attachments of `mime_type`.
pub fn supports_mime(provider: ProviderKind, model: &str, mime_type: &str) -> bool {
    let model = model.trim_start_matches("models/");
    MEDIA_SUPPORT
        .iter()
        .filter(|(p, prefix, _)| *p == provider && model.starts_with(prefix))
        .max_by_key(|(_, prefix, _)| prefix.len())
        .map(|(_, _, patterns)| patterns.iter().any(|p| mime_matches(p, mime_type)))
        .unwrap_or(false)
}

fn mime_matches(pattern: &str, mime_type: &str) -> bool {
    let mime_type = mime_type.to_ascii_lowercase();
    match pattern.strip_suffix("/*") {
        Some(family) => mime_type
            .split_once('/')
            .is_some_and(|(major, _)| major == family),
        None => pattern == mime_type,
    }
}

/// Apply the capability table to a history view.
///
/// Returns the filtered messages and how many parts were removed or
/// replaced. Messages without binary parts are passed through untouched.
pub fn filter_attachments(
    messages: Vec<Message>,
    provider: ProviderKind,
    model: &str,
    policy: AttachmentPolicy,
) -> (Vec<Message>, usize) {
    let mut affected = 0;
    let filtered = messages
        .into_iter()
        .map(|mut msg| {
            let parts = match msg.content {
                MessageContent::Parts(parts) => parts,
                text @ MessageContent::Text(_) => {
                    msg.content = text;
                    return msg;
                }
            };
            let mut kept = Vec::with_capacity(parts.len());
            for part in parts {
                let supported = part
                    .mime_type()
                    .map_or(true, |mime| supports_mime(provider, model, mime));
                if supported {
                    kept.push(part);
                    continue;
                }
                affected += 1;
                if policy == AttachmentPolicy::Placeholder {
                    kept.push(ContentPart::text(&placeholder(&part, model)));
                }
            }
            msg.content = MessageContent::Parts(kept);
            msg
        })
        .collect();
    (filtered, affected)
}

fn placeholder(part: &ContentPart, model: &str) -> String {
    match part {
        ContentPart::File {
            filename: Some(name),
            mime_type,
            ..
        } => format!("[attachment '{}' ({}) not supported by {}]", name, mime_type, model),
        other => format!(
            "[attachment ({}) not supported by {}]",
            other.mime_type().unwrap_or("unknown"),
            model
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::BinarySource;

    fn png() -> ContentPart {
        ContentPart::image(BinarySource::Base64("AAAA".into()), "image/png")
    }

    fn pdf() -> ContentPart {
        ContentPart::file(
            BinarySource::Base64("JVBERg==".into()),
            "application/pdf",
            Some("report.pdf"),
        )
    }

    #[test]
    fn test_support_table() {
        assert!(supports_mime(ProviderKind::Openai, "gpt-4o-mini", "image/png"));
        assert!(supports_mime(ProviderKind::Openai, "gpt-4o", "application/pdf"));
        assert!(!supports_mime(ProviderKind::Openai, "gpt-4-turbo", "application/pdf"));
        assert!(!supports_mime(ProviderKind::Openai, "gpt-3.5-turbo", "image/png"));
        assert!(supports_mime(ProviderKind::Anthropic, "claude-3-haiku", "image/webp"));
        assert!(!supports_mime(ProviderKind::Anthropic, "claude-2.1", "image/png"));
        assert!(!supports_mime(ProviderKind::Openai, "unknown", "image/png"));
    }

    #[test]
    fn test_wildcard_patterns() {
        assert!(supports_mime(ProviderKind::Gemini, "gemini-1.5-pro", "image/heic"));
        assert!(supports_mime(ProviderKind::Gemini, "gemini-2.0-flash", "audio/mpeg"));
        assert!(supports_mime(ProviderKind::Gemini, "gemini-2.0-flash", "IMAGE/PNG"));
        assert!(!supports_mime(ProviderKind::Gemini, "gemini-2.0-flash", "application/zip"));
    }

    #[test]
    fn test_placeholder_policy() {
        let msg = Message::user_with_parts(vec![ContentPart::text("see"), png(), pdf()]);
        let (out, affected) = filter_attachments(
            vec![msg],
            ProviderKind::Openai,
            "gpt-3.5-turbo",
            AttachmentPolicy::Placeholder,
        );
        assert_eq!(affected, 2);
        let parts = out[0].parts();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.mime_type().is_none()));
        assert!(out[0].text().contains("'report.pdf'"));
    }

    #[test]
    fn test_drop_policy_keeps_supported() {
        let msg = Message::user_with_parts(vec![png(), pdf()]);
        let (out, affected) = filter_attachments(
            vec![msg, Message::assistant("ok")],
            ProviderKind::Openai,
            "gpt-4-turbo",
            AttachmentPolicy::Drop,
        );
        assert_eq!(affected, 1);
        assert_eq!(out[0].parts(), vec![png()]);
        assert_eq!(out[1].text(), "ok");
    }
}
