//! Filter compilation: [`FilterSpec`] entries to non-scoring predicate clauses.

use prodsearch_core::{Error, FilterSpec, FilterValue, RangeBounds, Result, Scalar};

use crate::dsl::{BoolQuery, Query};

/// A compiled predicate. Clauses come out in the caller's field order.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    Term { field: String, value: Scalar },
    /// OR group over term clauses; matching any one value is enough.
    AnyOf { field: String, values: Vec<Scalar> },
    Range { field: String, bounds: RangeBounds },
}

impl FilterClause {
    pub fn field(&self) -> &str {
        match self {
            FilterClause::Term { field, .. } | FilterClause::AnyOf { field, .. } | FilterClause::Range { field, .. } => field,
        }
    }

    pub fn to_query(&self) -> Query {
        match self {
            FilterClause::Term { field, value } => Query::Term { field: field.clone(), value: value.clone() },
            FilterClause::AnyOf { field, values } => Query::Bool(BoolQuery {
                should: values.iter().map(|v| Query::Term { field: field.clone(), value: v.clone() }).collect(),
                minimum_should_match: Some(1),
                ..BoolQuery::default()
            }),
            FilterClause::Range { field, bounds } => Query::Range { field: field.clone(), bounds: *bounds },
        }
    }
}

pub fn to_queries(clauses: &[FilterClause]) -> Vec<Query> {
    clauses.iter().map(FilterClause::to_query).collect()
}

#[derive(Debug, Clone)]
pub struct FilterCompiler {
    range_fields: Vec<String>,
}

impl Default for FilterCompiler {
    fn default() -> Self {
        Self::new(vec!["reviews.rating".to_string()])
    }
}

impl FilterCompiler {
    /// `range_fields` lists the fields that accept a `{gte, lte}` range.
    pub fn new(range_fields: Vec<String>) -> Self {
        Self { range_fields }
    }

    pub fn accepts_range(&self, field: &str) -> bool {
        self.range_fields.iter().any(|f| f == field)
    }

    pub fn compile(&self, spec: &FilterSpec) -> Result<Vec<FilterClause>> {
        let mut clauses = Vec::with_capacity(spec.len());
        for (field, value) in spec.iter() {
            match value {
                FilterValue::Scalar(v) => clauses.push(FilterClause::Term { field: field.to_string(), value: v.clone() }),
                FilterValue::AnyOf(values) if values.is_empty() => {}
                FilterValue::AnyOf(values) => {
                    clauses.push(FilterClause::AnyOf { field: field.to_string(), values: values.clone() });
                }
                FilterValue::Range(bounds) => {
                    if !self.accepts_range(field) {
                        tracing::warn!(field, "range filter on a field without range support");
                        return Err(invalid(field, "range filters are only supported on numeric fields"));
                    }
                    if let (Some(lo), Some(hi)) = (bounds.gte, bounds.lte) {
                        if lo > hi {
                            return Err(invalid(field, &format!("gte ({lo}) is greater than lte ({hi})")));
                        }
                    }
                    if !bounds.is_unbounded() {
                        clauses.push(FilterClause::Range { field: field.to_string(), bounds: *bounds });
                    }
                }
            }
        }
        tracing::debug!(clauses = clauses.len(), "compiled filters");
        Ok(clauses)
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::InvalidFilter { field: field.to_string(), reason: reason.to_string() }
}
