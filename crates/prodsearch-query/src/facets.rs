//! Facet aggregation requests and their conversion into a [`FacetSet`].
//!
//! Bucket order is whatever the engine returned; nothing is re-sorted here.

use std::collections::BTreeMap;

use prodsearch_core::{FacetBucket, FacetSet, RangeBounds, RatingBucket};

use crate::dsl::{Aggregation, RangeBucketSpec};
use crate::response::{RawAggregation, RawBucket};

pub const BRANDS: &str = "brands";
pub const CATEGORIES: &str = "categories";
pub const MANUFACTURERS: &str = "manufacturers";
pub const RATINGS: &str = "ratings";

pub const RATING_FIELD: &str = "reviews.rating";

/// `<1, 1-2, 2-3, 3-4, 4-5, >=5`
pub const RATING_BUCKETS: [RangeBucketSpec; 6] = [
    RangeBucketSpec::new(None, Some(1.0)),
    RangeBucketSpec::new(Some(1.0), Some(2.0)),
    RangeBucketSpec::new(Some(2.0), Some(3.0)),
    RangeBucketSpec::new(Some(3.0), Some(4.0)),
    RangeBucketSpec::new(Some(4.0), Some(5.0)),
    RangeBucketSpec::new(Some(5.0), None),
];

/// Rating buckets, limited to `window` when the results are filtered by
/// rating. A product passes the filter on any one review, so unclipped
/// buckets would also count its reviews outside the window.
pub fn rating_buckets(window: Option<&RangeBounds>) -> Vec<RangeBucketSpec> {
    match window {
        Some(window) => RATING_BUCKETS.iter().filter_map(|b| b.clip(window)).collect(),
        None => RATING_BUCKETS.to_vec(),
    }
}

pub fn facet_aggregations(size: usize, rating_window: Option<&RangeBounds>) -> Vec<Aggregation> {
    let terms = |name: &str, field: &str| Aggregation::Terms { name: name.into(), field: field.into(), size };
    vec![
        terms(BRANDS, "brand"),
        terms(CATEGORIES, "categories"),
        terms(MANUFACTURERS, "manufacturer"),
        Aggregation::Range { name: RATINGS.into(), field: RATING_FIELD.into(), ranges: rating_buckets(rating_window) },
    ]
}

fn buckets<'a>(aggregations: &'a BTreeMap<String, RawAggregation>, name: &str) -> &'a [RawBucket] {
    match aggregations.get(name) {
        Some(agg) => &agg.buckets,
        None => {
            tracing::warn!(aggregation = name, "aggregation missing from engine response");
            &[]
        }
    }
}

pub fn collect_facets(aggregations: &BTreeMap<String, RawAggregation>) -> FacetSet {
    let terms = |name: &str| -> Vec<FacetBucket> {
        buckets(aggregations, name).iter().map(|b| FacetBucket { key: b.key_string(), doc_count: b.doc_count }).collect()
    };
    FacetSet {
        brands: terms(BRANDS),
        categories: terms(CATEGORIES),
        manufacturers: terms(MANUFACTURERS),
        ratings: buckets(aggregations, RATINGS)
            .iter()
            .map(|b| RatingBucket { key: b.key_string(), from: b.from, to: b.to, doc_count: b.doc_count })
            .collect(),
    }
}
