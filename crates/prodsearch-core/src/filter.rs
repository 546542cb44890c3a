//! Caller-supplied structural filters.
//!
//! A [`FilterSpec`] maps field names to one of three shapes: a single scalar
//! (equality), a list of scalars (any-of) or a numeric range. Entries keep
//! their insertion order so compiled queries are deterministic.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Inclusive numeric bounds. Accepts both `{"gte": .., "lte": ..}` and the
/// wrapped form `{"range": {"gte": .., "lte": ..}}` on input.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RangeRepr")]
pub struct RangeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl RangeBounds {
    pub fn new(gte: Option<f64>, lte: Option<f64>) -> Self {
        Self { gte, lte }
    }

    pub fn is_unbounded(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }

    pub fn contains(&self, value: f64) -> bool {
        self.gte.map_or(true, |lo| value >= lo) && self.lte.map_or(true, |hi| value <= hi)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBounds {
    #[serde(default)]
    gte: Option<f64>,
    #[serde(default)]
    lte: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WrappedBounds {
    range: RawBounds,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RangeRepr {
    Wrapped(WrappedBounds),
    Flat(RawBounds),
}

impl From<RangeRepr> for RangeBounds {
    fn from(repr: RangeRepr) -> Self {
        let raw = match repr {
            RangeRepr::Wrapped(w) => w.range,
            RangeRepr::Flat(raw) => raw,
        };
        Self { gte: raw.gte, lte: raw.lte }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Scalar(Scalar),
    AnyOf(Vec<Scalar>),
    Range(RangeBounds),
}

impl From<Scalar> for FilterValue {
    fn from(value: Scalar) -> Self {
        FilterValue::Scalar(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Scalar(value.into())
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::AnyOf(values.into_iter().map(Scalar::from).collect())
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        FilterValue::AnyOf(values.into_iter().map(Scalar::from).collect())
    }
}

impl From<RangeBounds> for FilterValue {
    fn from(bounds: RangeBounds) -> Self {
        FilterValue::Range(bounds)
    }
}

/// Ordered field → value mapping. Inserting an existing field replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    entries: Vec<(String, FilterValue)>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> &mut Self {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((field, value)),
        }
        self
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v))
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.entries.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FilterSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, value) in &self.entries {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FilterSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = FilterSpec;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to filter values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FilterSpec, A::Error> {
                let mut spec = FilterSpec::new();
                while let Some((field, value)) = access.next_entry::<String, FilterValue>()? {
                    spec.insert(field, value);
                }
                Ok(spec)
            }
        }

        deserializer.deserialize_map(SpecVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_all_three_shapes_in_order() {
        let spec: FilterSpec = serde_json::from_str(
            r#"{"manufacturer": "Amazon", "brand": ["Acme", "Zeta"], "reviews.rating": {"range": {"gte": 4.0, "lte": 5}}}"#,
        )
        .expect("filter spec");

        let fields: Vec<&str> = spec.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, ["manufacturer", "brand", "reviews.rating"]);
        assert_eq!(spec.get("manufacturer"), Some(&FilterValue::Scalar(Scalar::Text("Amazon".into()))));
        assert_eq!(spec.get("brand"), Some(&FilterValue::from(vec!["Acme", "Zeta"])));
        assert_eq!(
            spec.get("reviews.rating"),
            Some(&FilterValue::Range(RangeBounds::new(Some(4.0), Some(5.0))))
        );
    }

    #[test]
    fn flat_range_is_accepted() {
        let value: FilterValue = serde_json::from_str(r#"{"gte": 1.5}"#).expect("range");
        assert_eq!(value, FilterValue::Range(RangeBounds::new(Some(1.5), None)));
    }

    #[test]
    fn unknown_dict_shape_is_rejected() {
        let err = serde_json::from_str::<FilterValue>(r#"{"between": [1, 2]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut spec = FilterSpec::new();
        spec.insert("brand", "Acme").insert("categories", vec!["Tablets"]);
        spec.insert("brand", "Zeta");
        let fields: Vec<&str> = spec.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, ["brand", "categories"]);
        assert_eq!(spec.get("brand"), Some(&FilterValue::from("Zeta")));
    }

    #[test]
    fn range_contains_is_inclusive() {
        let r = RangeBounds::new(Some(4.0), Some(5.0));
        assert!(r.contains(4.0) && r.contains(5.0));
        assert!(!r.contains(3.9));
        assert!(RangeBounds::default().is_unbounded());
    }
}
