//! UTF-8 safe previews for log lines and placeholders.

/// Shorten `s` to at most `n` characters, appending `...` when cut.
///
/// Works on chars, never on byte offsets, so multibyte input cannot panic.
pub fn preview(s: &str, n: usize) -> String {
    let mut chars = s.chars();
    let mut out: String = chars.by_ref().take(n).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}
