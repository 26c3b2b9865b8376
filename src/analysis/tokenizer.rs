use serde::{Serialize, Deserialize};
use unicode_segmentation::UnicodeSegmentation;
use crate::analysis::normalizer::Normalizer;
use crate::analysis::token::Token;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;
}

/// Tokenizers a lexicon table can name as its default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenizerKind {
    Bigram,
}

impl TokenizerKind {
    pub fn build(&self) -> Box<dyn Tokenizer> {
        match self {
            TokenizerKind::Bigram => Box::new(BigramTokenizer::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TokenizerKind::Bigram => "TokenBigram",
        }
    }
}

/// Overlapping grapheme bigrams over normalized text. Position `i` holds the
/// bigram starting at grapheme `i`; the last grapheme is emitted alone so
/// every grapheme starts exactly one token.
#[derive(Clone, Default)]
pub struct BigramTokenizer {
    pub normalizer: Normalizer,
}

impl BigramTokenizer {
    /// Tokenizes text that is already normalized.
    pub fn tokenize_normalized(&self, text: &str) -> Vec<Token> {
        let graphemes: Vec<&str> = text.graphemes(true).collect();
        let mut tokens = Vec::with_capacity(graphemes.len());

        for i in 0..graphemes.len() {
            let end = (i + 2).min(graphemes.len());
            let gram: String = graphemes[i..end].concat();
            tokens.push(Token::new(gram, i as u32));
        }

        tokens
    }
}

impl Tokenizer for BigramTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        self.tokenize_normalized(&self.normalizer.normalize(text))
    }

    fn name(&self) -> &str {
        TokenizerKind::Bigram.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn bigrams_with_trailing_unigram() {
        let tokens = BigramTokenizer::default().tokenize("ABcd");
        assert_eq!(texts(&tokens), vec!["ab", "bc", "cd", "d"]);
        assert_eq!(tokens[3].position, 3);
    }

    #[test]
    fn multibyte_graphemes() {
        let tokens = BigramTokenizer::default().tokenize("日本語");
        assert_eq!(texts(&tokens), vec!["日本", "本語", "語"]);
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert!(BigramTokenizer::default().tokenize("   ").is_empty());
    }
}
