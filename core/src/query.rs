//! Recursive query-string encoder for serializable values.
//!
//! # Design
//! The value is first serialized to a `serde_json::Value` tree, which gives
//! a uniform record / list / scalar shape regardless of the source type.
//! The tree is then walked depth first: records contribute `parent[key]`
//! composite keys in sorted key order, lists repeat their key, and scalars
//! become leaves. Sorting makes the output independent of field order in
//! the source type, so the same input always yields the same pairs.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::path::PathComponent;

/// RFC 3986 query escape set: only unreserved characters plus `/` and `?`
/// are left as-is; general and sub-delimiters are escaped.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b'?');

/// How list elements name their key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrayEncoding {
    /// `key=1&key=2`
    #[default]
    NoBrackets,
    /// `key[]=1&key[]=2`
    Brackets,
}

impl ArrayEncoding {
    fn encode(self, key: &str) -> String {
        match self {
            ArrayEncoding::NoBrackets => key.to_string(),
            ArrayEncoding::Brackets => format!("{key}[]"),
        }
    }
}

/// How booleans are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoolEncoding {
    /// `1` / `0`
    #[default]
    Numeric,
    /// `true` / `false`
    Literal,
}

impl BoolEncoding {
    fn encode(self, value: bool) -> &'static str {
        match (self, value) {
            (BoolEncoding::Numeric, true) => "1",
            (BoolEncoding::Numeric, false) => "0",
            (BoolEncoding::Literal, true) => "true",
            (BoolEncoding::Literal, false) => "false",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub array_encoding: ArrayEncoding,
    pub bool_encoding: BoolEncoding,
}

impl QueryOptions {
    pub fn new(array_encoding: ArrayEncoding, bool_encoding: BoolEncoding) -> Self {
        Self {
            array_encoding,
            bool_encoding,
        }
    }
}

/// Encode `value` into ordered, percent-escaped `(key, value)` pairs.
///
/// The value must serialize to a record at the top level. `null` leaves
/// (e.g. `Option::None` fields) produce no pair.
///
/// # Errors
/// Returns [`ApiError::Coding`] if the value fails to serialize or is not
/// record-shaped.
pub fn encode<T: Serialize + ?Sized>(
    value: &T,
    options: QueryOptions,
) -> Result<Vec<(String, String)>, ApiError> {
    let tree = serde_json::to_value(value).map_err(|e| ApiError::Coding(e.to_string()))?;
    let Value::Object(record) = tree else {
        return Err(ApiError::Coding(
            "query parameters must serialize to a record".to_string(),
        ));
    };

    let mut pairs = Vec::new();
    encode_record(None, &record, options, &mut pairs);
    Ok(pairs)
}

/// [`encode`], returned as `Parameter` path components.
///
/// # Errors
/// See [`encode`].
pub fn encode_components<T: Serialize + ?Sized>(
    value: &T,
    options: QueryOptions,
) -> Result<Vec<PathComponent>, ApiError> {
    Ok(encode(value, options)?
        .into_iter()
        .map(|(key, value)| PathComponent::Parameter { key, value })
        .collect())
}

/// Percent-escape a single query key or value.
pub fn escape(input: &str) -> String {
    utf8_percent_encode(input, QUERY_ESCAPE).to_string()
}

fn encode_record(
    parent: Option<&str>,
    record: &Map<String, Value>,
    options: QueryOptions,
    out: &mut Vec<(String, String)>,
) {
    let mut keys: Vec<&String> = record.keys().collect();
    keys.sort();
    for key in keys {
        let composite = match parent {
            Some(parent) => format!("{parent}[{key}]"),
            None => key.clone(),
        };
        encode_value(&composite, &record[key], options, out);
    }
}

fn encode_value(key: &str, value: &Value, options: QueryOptions, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(record) => encode_record(Some(key), record, options, out),
        Value::Array(items) => {
            let item_key = options.array_encoding.encode(key);
            for item in items {
                encode_value(&item_key, item, options, out);
            }
        }
        Value::Bool(b) => out.push((escape(key), escape(options.bool_encoding.encode(*b)))),
        Value::Number(n) => out.push((escape(key), escape(&n.to_string()))),
        Value::String(s) => out.push((escape(key), escape(s))),
        Value::Null => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct Search {
        term: String,
        page: u32,
        active: bool,
        tags: Vec<&'static str>,
        limit: Option<u32>,
    }

    fn search() -> Search {
        Search {
            term: "a&b c".to_string(),
            page: 2,
            active: true,
            tags: vec!["x", "y"],
            limit: None,
        }
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn keys_come_out_sorted_and_escaped() {
        let encoded = encode(&search(), QueryOptions::default()).unwrap();
        assert_eq!(
            encoded,
            pairs(&[
                ("active", "1"),
                ("page", "2"),
                ("tags", "x"),
                ("tags", "y"),
                ("term", "a%26b%20c"),
            ])
        );
    }

    #[test]
    fn encoding_is_deterministic() {
        let first = encode(&search(), QueryOptions::default()).unwrap();
        let second = encode(&search(), QueryOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn brackets_and_literal_bools() {
        let options = QueryOptions::new(ArrayEncoding::Brackets, BoolEncoding::Literal);
        let encoded = encode(&json!({ "ids": [1, 2], "flag": false }), options).unwrap();
        assert_eq!(
            encoded,
            pairs(&[("flag", "false"), ("ids%5B%5D", "1"), ("ids%5B%5D", "2")])
        );
    }

    #[test]
    fn nested_records_use_composite_keys() {
        let value = json!({ "filter": { "size": 3, "color": "red" } });
        let encoded = encode(&value, QueryOptions::default()).unwrap();
        assert_eq!(
            encoded,
            pairs(&[("filter%5Bcolor%5D", "red"), ("filter%5Bsize%5D", "3")])
        );
    }

    #[test]
    fn slash_and_question_mark_are_not_escaped() {
        assert_eq!(escape("a/b?c"), "a/b?c");
        assert_eq!(escape("k:v#x@y"), "k%3Av%23x%40y");
        assert_eq!(escape("!$'()*+,;="), "%21%24%27%28%29%2A%2B%2C%3B%3D");
        assert_eq!(escape("é"), "%C3%A9");
    }

    #[test]
    fn top_level_must_be_a_record() {
        let err = encode(&vec![1, 2], QueryOptions::default()).unwrap_err();
        assert!(matches!(err, ApiError::Coding(_)));

        let err = encode(&"plain", QueryOptions::default()).unwrap_err();
        assert!(matches!(err, ApiError::Coding(_)));
    }

    #[test]
    fn components_are_parameters() {
        let components = encode_components(&json!({ "q": "rust" }), QueryOptions::default()).unwrap();
        assert_eq!(components, vec![PathComponent::parameter("q", "rust")]);
    }
}
