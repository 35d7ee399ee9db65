//! Token counting.

/// Counts tokens in a piece of text.
///
/// Counts are estimates used for budgeting only; the provider's own
/// tokenizer may disagree.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Character-ratio estimate: one token per `chars_per_token` characters,
/// rounded up.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicTokenizer {
    chars_per_token: usize,
}

impl HeuristicTokenizer {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_rounds_up() {
        let t = HeuristicTokenizer::default();
        assert_eq!(t.count(""), 0);
        assert_eq!(t.count("abc"), 1);
        assert_eq!(t.count("abcd"), 1);
        assert_eq!(t.count("abcde"), 2);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let t = HeuristicTokenizer::default();
        // 4 characters, 12 bytes
        assert_eq!(t.count("日本語字"), 1);
    }

    #[test]
    fn test_zero_ratio_is_clamped() {
        assert_eq!(HeuristicTokenizer::new(0).count("abc"), 3);
    }
}
