//! English text analysis for the in-process engine: simple tokenization,
//! lower-casing, English stop words and Snowball stemming.

use tantivy::tokenizer::{Language, LowerCaser, SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer, TokenStream};

/// Lucene's English stop set, as used by `_english_` stop filters.
pub const ENGLISH_STOP_WORDS: [&str; 33] = [
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it", "no", "not", "of",
    "on", "or", "such", "that", "the", "their", "then", "there", "these", "they", "this", "to", "was", "will", "with",
];

/// One analyzed token. `raw` is the lower-cased surface form, `stem` the
/// indexed form; offsets are byte offsets into the analyzed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub stem: String,
    pub raw: String,
    pub position: usize,
    pub offset_from: usize,
    pub offset_to: usize,
}

#[derive(Clone)]
pub struct Analyzer {
    plain: TextAnalyzer,
    stemmed: TextAnalyzer,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::english()
    }
}

impl Analyzer {
    pub fn english() -> Self {
        let stop_words = || StopWordFilter::remove(ENGLISH_STOP_WORDS.iter().map(|s| s.to_string()));
        let plain = TextAnalyzer::builder(SimpleTokenizer::default()).filter(LowerCaser).filter(stop_words()).build();
        let stemmed = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(stop_words())
            .filter(Stemmer::new(Language::English))
            .build();
        Self { plain, stemmed }
    }

    pub fn analyze(&self, text: &str) -> Vec<Term> {
        let mut plain = self.plain.clone();
        let mut stemmed = self.stemmed.clone();
        let mut raw_stream = plain.token_stream(text);
        let mut stem_stream = stemmed.token_stream(text);
        let mut terms = Vec::new();
        while raw_stream.advance() && stem_stream.advance() {
            let raw = raw_stream.token();
            terms.push(Term {
                stem: stem_stream.token().text.clone(),
                raw: raw.text.clone(),
                position: raw.position,
                offset_from: raw.offset_from,
                offset_to: raw.offset_to,
            });
        }
        terms
    }

    pub fn stems(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.stem).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stop_words_but_keeps_positions() {
        let terms = Analyzer::english().analyze("Mouse for the Gamers");
        let raw: Vec<(&str, usize)> = terms.iter().map(|t| (t.raw.as_str(), t.position)).collect();
        assert_eq!(raw, [("mouse", 0), ("gamers", 3)]);
        assert_eq!(terms[1].stem, "gamer");
    }

    #[test]
    fn offsets_point_into_original_text() {
        let text = "Wireless MOUSE";
        let terms = Analyzer::english().analyze(text);
        assert_eq!(&text[terms[1].offset_from..terms[1].offset_to], "MOUSE");
    }

    #[test]
    fn plural_and_singular_share_a_stem() {
        let analyzer = Analyzer::english();
        assert_eq!(analyzer.stems("shoes"), analyzer.stems("shoe"));
    }
}
