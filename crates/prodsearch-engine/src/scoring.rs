//! Query evaluation for the in-process engine.
//!
//! `eval` returns `None` when a document does not match and `Some(score)`
//! when it does. Text relevance is BM25 (k1 = 1.2, b = 0.75) over analyzed
//! terms; a multi-valued field is scored as one field. Best-fields matching
//! applies `minimum_should_match` per field and keeps the best field score.

use std::collections::HashMap;

use strsim::damerau_levenshtein;

use prodsearch_core::Scalar;
use prodsearch_query::dsl::{BoolQuery, CosineScript, Fuzziness, Knn, MatchKind, MultiMatch};
use prodsearch_query::Query;

use crate::analysis::{Analyzer, Term};
use crate::memory::{field_kind, numeric_values, string_values, Corpus, FieldKind, IndexedDoc};
use crate::EngineError;

const K1: f32 = 1.2;
const B: f32 = 0.75;
/// Score factor for a term reached through an edit rather than exactly.
const FUZZY_WEIGHT: f32 = 0.5;

type Eval = Result<Option<f32>, EngineError>;

fn idf(docs: usize, df: usize) -> f32 {
    let (n, df) = (docs as f32, df as f32);
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

fn tf_norm(tf: f32, len: f32, avg_len: f32) -> f32 {
    tf / (tf + K1 * (1.0 - B + B * len / avg_len))
}

/// Terms required out of `n` for a `minimum_should_match` percentage.
pub(crate) fn required_terms(n: usize, percent: Option<u8>) -> usize {
    percent.map_or(1, |p| (n * usize::from(p) / 100).max(1))
}

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

fn within_edits(query: &str, candidate: &str, fuzziness: Fuzziness) -> bool {
    damerau_levenshtein(query, candidate) <= fuzziness.max_edits(query.chars().count())
}

/// How a query term matches a document term: `1.0` exactly, [`FUZZY_WEIGHT`]
/// through edits.
fn term_weight(q: &Term, d: &Term, fuzziness: Option<Fuzziness>) -> Option<f32> {
    if q.stem == d.stem {
        return Some(1.0);
    }
    let f = fuzziness?;
    (within_edits(&q.raw, &d.raw, f) || within_edits(&q.stem, &d.stem, f)).then_some(FUZZY_WEIGHT)
}

pub(crate) struct Scorer<'a> {
    corpus: &'a Corpus,
    analyzer: &'a Analyzer,
}

impl<'a> Scorer<'a> {
    pub fn new(corpus: &'a Corpus, analyzer: &'a Analyzer) -> Self {
        Self { corpus, analyzer }
    }

    pub fn eval(&self, query: &Query, doc: &IndexedDoc) -> Eval {
        match query {
            Query::MatchAll => Ok(Some(1.0)),
            Query::MultiMatch(mm) => Ok(self.multi_match(mm, doc)),
            Query::MatchPhrase { field, query, boost } => {
                let terms = self.analyzer.analyze(query);
                Ok(self.phrase_field(field, query, &terms, false, doc).map(|s| s * *boost as f32))
            }
            Query::Term { field, value } => Ok(term_matches(field, value, doc).then_some(1.0)),
            Query::Range { field, bounds } => {
                Ok(numeric_values(&doc.doc, field).into_iter().any(|v| bounds.contains(v)).then_some(1.0))
            }
            Query::Bool(b) => self.bool_query(b, doc),
            Query::ScriptScore { query, script, boost } => {
                Ok(self.eval(query, doc)?.map(|_| script_score(script, doc) * *boost as f32))
            }
            Query::Knn(_) => Err(EngineError::UnsupportedQuery("knn is only supported as the root query".into())),
        }
    }

    fn bool_query(&self, b: &BoolQuery, doc: &IndexedDoc) -> Eval {
        let mut score = 0.0;
        for clause in &b.must {
            match self.eval(clause, doc)? {
                Some(s) => score += s,
                None => return Ok(None),
            }
        }
        for clause in &b.filter {
            if self.eval(clause, doc)?.is_none() {
                return Ok(None);
            }
        }
        let mut matched_should = 0;
        for clause in &b.should {
            if let Some(s) = self.eval(clause, doc)? {
                matched_should += 1;
                score += s;
            }
        }
        let default_msm = usize::from(b.must.is_empty() && b.filter.is_empty() && !b.should.is_empty());
        if matched_should < b.minimum_should_match.unwrap_or(default_msm) {
            return Ok(None);
        }
        Ok(Some(score * b.boost.unwrap_or(1.0) as f32))
    }

    fn multi_match(&self, mm: &MultiMatch, doc: &IndexedDoc) -> Option<f32> {
        let terms = self.analyzer.analyze(&mm.query);
        let best = mm
            .fields
            .iter()
            .filter_map(|fb| {
                let score = match mm.kind {
                    MatchKind::BestFields => self.best_fields_field(&fb.field, mm, &terms, doc),
                    MatchKind::Phrase => self.phrase_field(&fb.field, &mm.query, &terms, false, doc),
                    MatchKind::PhrasePrefix => self.phrase_field(&fb.field, &mm.query, &terms, true, doc),
                };
                score.map(|s| s * fb.boost as f32)
            })
            .reduce(f32::max)?;
        Some(best * mm.boost.unwrap_or(1.0) as f32)
    }

    fn best_fields_field(&self, field: &str, mm: &MultiMatch, terms: &[Term], doc: &IndexedDoc) -> Option<f32> {
        match field_kind(field) {
            FieldKind::Text => self.text_terms(field, terms, mm.fuzziness, mm.minimum_should_match, doc),
            FieldKind::Keyword => self.keyword_match(field, &mm.query, mm.fuzziness, false, doc),
            FieldKind::Numeric | FieldKind::Unknown => None,
        }
    }

    /// BM25 over the query terms found in `field`, if enough of them match.
    fn text_terms(
        &self,
        field: &str,
        terms: &[Term],
        fuzziness: Option<Fuzziness>,
        min_match: Option<u8>,
        doc: &IndexedDoc,
    ) -> Option<f32> {
        let stats = self.corpus.text_stats.get(field)?;
        if terms.is_empty() {
            return None;
        }
        let len = doc.field_len(field) as f32;
        let mut matched = 0;
        let mut score = 0.0;
        for q in terms {
            let mut candidates: HashMap<&str, (f32, f32)> = HashMap::new();
            for d in doc.values(field).iter().flat_map(|v| &v.terms) {
                if let Some(weight) = term_weight(q, d, fuzziness) {
                    let entry = candidates.entry(d.stem.as_str()).or_insert((0.0, weight));
                    entry.0 += 1.0;
                }
            }
            let best = candidates
                .into_iter()
                .map(|(stem, (tf, weight))| weight * idf(stats.docs, stats.df(stem)) * tf_norm(tf, len, stats.avg_len()))
                .reduce(f32::max);
            if let Some(s) = best {
                matched += 1;
                score += s;
            }
        }
        (matched >= required_terms(terms.len(), min_match)).then_some(score)
    }

    /// The whole query against a keyword value. Keyword fields are not
    /// analyzed, so the comparison is case-sensitive.
    fn keyword_match(&self, field: &str, query: &str, fuzziness: Option<Fuzziness>, prefix: bool, doc: &IndexedDoc) -> Option<f32> {
        let stats = self.corpus.keyword_stats.get(field)?;
        string_values(&doc.doc, field)
            .into_iter()
            .filter_map(|value| {
                let weight = if value == query || (prefix && value.starts_with(query)) {
                    1.0
                } else if fuzziness.is_some_and(|f| within_edits(query, value, f)) {
                    FUZZY_WEIGHT
                } else {
                    return None;
                };
                Some(weight * idf(stats.docs, stats.df(value)))
            })
            .reduce(f32::max)
    }

    /// Phrase (or phrase-prefix) match inside a single value of `field`.
    fn phrase_field(&self, field: &str, query: &str, terms: &[Term], prefix: bool, doc: &IndexedDoc) -> Option<f32> {
        match field_kind(field) {
            FieldKind::Keyword => return self.keyword_match(field, query, None, prefix, doc),
            FieldKind::Text => {}
            FieldKind::Numeric | FieldKind::Unknown => return None,
        }
        let stats = self.corpus.text_stats.get(field)?;
        let (first, last) = (terms.first()?, terms.len() - 1);
        let matches_at = |q: &Term, i: usize, d: &Term| {
            if prefix && i == last {
                d.raw.starts_with(&q.raw) || d.stem.starts_with(&q.stem)
            } else {
                d.stem == q.stem
            }
        };

        let mut freq = 0.0_f32;
        for value in doc.values(field) {
            for start in &value.terms {
                if !matches_at(first, 0, start) {
                    continue;
                }
                let complete = terms.iter().enumerate().skip(1).all(|(i, q)| {
                    let pos = start.position + (q.position - first.position);
                    value.terms.iter().any(|d| d.position == pos && matches_at(q, i, d))
                });
                if complete {
                    freq += 1.0;
                }
            }
        }
        if freq == 0.0 {
            return None;
        }
        let norm = tf_norm(freq, doc.field_len(field) as f32, stats.avg_len());
        let weight: f32 = terms
            .iter()
            .enumerate()
            .map(|(i, q)| if prefix && i == last { idf(stats.docs, stats.docs) } else { idf(stats.docs, stats.df(&q.stem)) })
            .sum();
        Some(weight * norm)
    }

    /// Root-level k-NN: filter, rank the candidate pool by similarity, keep `k`.
    pub fn knn(&self, knn: &Knn) -> Result<Vec<(f32, &'a IndexedDoc)>, EngineError> {
        let corpus = self.corpus;
        let mut pool = Vec::new();
        for doc in &corpus.docs {
            if doc.doc.text_vector.is_empty() {
                continue;
            }
            let mut admitted = true;
            for f in &knn.filter {
                if self.eval(f, doc)?.is_none() {
                    admitted = false;
                    break;
                }
            }
            if admitted {
                pool.push(((1.0 + cosine(&knn.vector, &doc.doc.text_vector)) / 2.0, doc));
            }
        }
        pool.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.doc.id.cmp(&b.1.doc.id)));
        pool.truncate(knn.num_candidates);
        pool.truncate(knn.k);
        Ok(pool)
    }
}

fn script_score(script: &CosineScript, doc: &IndexedDoc) -> f32 {
    cosine(&script.vector, &doc.doc.text_vector) + script.offset as f32
}

fn term_matches(field: &str, value: &Scalar, doc: &IndexedDoc) -> bool {
    match (field_kind(field), value) {
        (FieldKind::Numeric, Scalar::Number(n)) => numeric_values(&doc.doc, field).contains(n),
        (FieldKind::Keyword, value) => {
            let wanted = value.to_string();
            string_values(&doc.doc, field).into_iter().any(|v| v == wanted)
        }
        (FieldKind::Text, value) => {
            let wanted = value.to_string().to_lowercase();
            doc.values(field).iter().flat_map(|v| &v.terms).any(|t| t.raw == wanted)
        }
        _ => false,
    }
}
