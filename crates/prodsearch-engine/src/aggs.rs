//! Terms and range aggregations over the matched documents.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;

use prodsearch_query::dsl::{Aggregation, RangeBucketSpec};
use prodsearch_query::{RawAggregation, RawBucket};

use crate::memory::{numeric_values, string_values, IndexedDoc};

pub(crate) fn aggregate<'a>(
    requests: &[Aggregation],
    matched: impl Iterator<Item = &'a IndexedDoc> + Clone,
) -> BTreeMap<String, RawAggregation> {
    requests
        .iter()
        .map(|request| {
            let buckets = match request {
                Aggregation::Terms { field, size, .. } => terms(field, *size, matched.clone()),
                Aggregation::Range { field, ranges, .. } => range(field, ranges, matched.clone()),
            };
            (request.name().to_string(), RawAggregation { buckets })
        })
        .collect()
}

/// Document counts per distinct value, count-descending then key-ascending.
fn terms<'a>(field: &str, size: usize, matched: impl Iterator<Item = &'a IndexedDoc>) -> Vec<RawBucket> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for doc in matched {
        let distinct: BTreeSet<&str> = string_values(&doc.doc, field).into_iter().collect();
        for value in distinct {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    let mut buckets: Vec<(&str, u64)> = counts.into_iter().collect();
    buckets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    buckets
        .into_iter()
        .take(size)
        .map(|(key, doc_count)| RawBucket { key: Value::String(key.to_string()), doc_count, from: None, to: None })
        .collect()
}

/// One bucket per requested range; a document counts once per bucket it has
/// any value in.
fn range<'a>(field: &str, ranges: &[RangeBucketSpec], matched: impl Iterator<Item = &'a IndexedDoc>) -> Vec<RawBucket> {
    let mut counts = vec![0_u64; ranges.len()];
    for doc in matched {
        let values = numeric_values(&doc.doc, field);
        for (slot, spec) in counts.iter_mut().zip(ranges) {
            if values.iter().any(|v| spec.contains(*v)) {
                *slot += 1;
            }
        }
    }
    ranges
        .iter()
        .zip(counts)
        .map(|(spec, doc_count)| RawBucket { key: Value::String(spec.key()), doc_count, from: spec.from, to: spec.to })
        .collect()
}
