//! Highlighting: wraps query terms found in the requested fields with the
//! configured markers. Each matching field value is returned whole as one
//! fragment.

use std::collections::{BTreeMap, HashSet};

use prodsearch_query::dsl::{MatchKind, MultiMatch};
use prodsearch_query::{Highlight, Query};

use crate::analysis::Analyzer;
use crate::memory::{field_kind, string_values, FieldKind, IndexedDoc};

/// Terms of the scoring part of a query. Filter clauses do not highlight.
#[derive(Debug, Default)]
pub(crate) struct HighlightTerms {
    stems: HashSet<String>,
    prefixes: Vec<String>,
    phrases: Vec<String>,
}

impl HighlightTerms {
    pub fn collect(query: &Query, analyzer: &Analyzer) -> Self {
        let mut terms = Self::default();
        terms.visit(query, analyzer);
        terms
    }

    fn visit(&mut self, query: &Query, analyzer: &Analyzer) {
        match query {
            Query::MultiMatch(MultiMatch { query, kind, .. }) => {
                let analyzed = analyzer.analyze(query);
                if *kind == MatchKind::PhrasePrefix {
                    if let Some(last) = analyzed.last() {
                        self.prefixes.push(last.raw.clone());
                    }
                }
                self.stems.extend(analyzed.into_iter().map(|t| t.stem));
                self.phrases.push(query.clone());
            }
            Query::MatchPhrase { query, .. } => {
                self.stems.extend(analyzer.stems(query));
                self.phrases.push(query.clone());
            }
            Query::Bool(b) => {
                for clause in b.must.iter().chain(&b.should) {
                    self.visit(clause, analyzer);
                }
            }
            Query::ScriptScore { query, .. } => self.visit(query, analyzer),
            Query::MatchAll | Query::Term { .. } | Query::Range { .. } | Query::Knn(_) => {}
        }
    }
}

pub(crate) fn highlight(doc: &IndexedDoc, request: &Highlight, terms: &HighlightTerms) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    for field in &request.fields {
        let fragments: Vec<String> = match field_kind(field) {
            FieldKind::Text => doc
                .values(field)
                .iter()
                .filter_map(|value| {
                    let spans: Vec<(usize, usize)> = value
                        .terms
                        .iter()
                        .filter(|t| terms.stems.contains(&t.stem) || terms.prefixes.iter().any(|p| t.raw.starts_with(p.as_str())))
                        .map(|t| (t.offset_from, t.offset_to))
                        .collect();
                    (!spans.is_empty()).then(|| mark(&value.text, &spans, request))
                })
                .collect(),
            FieldKind::Keyword => string_values(&doc.doc, field)
                .into_iter()
                .filter(|v| terms.phrases.iter().any(|p| p.as_str() == *v))
                .map(|v| format!("{}{}{}", request.pre_tag, v, request.post_tag))
                .collect(),
            FieldKind::Numeric | FieldKind::Unknown => Vec::new(),
        };
        if !fragments.is_empty() {
            out.insert(field.clone(), fragments);
        }
    }
    out
}

fn mark(text: &str, spans: &[(usize, usize)], request: &Highlight) -> String {
    let mut marked = String::with_capacity(text.len() + spans.len() * (request.pre_tag.len() + request.post_tag.len()));
    let mut cursor = 0;
    for &(from, to) in spans {
        marked.push_str(&text[cursor..from]);
        marked.push_str(&request.pre_tag);
        marked.push_str(&text[from..to]);
        marked.push_str(&request.post_tag);
        cursor = to;
    }
    marked.push_str(&text[cursor..]);
    marked
}
