//! Ordered query parameter pairs.
//!
//! [`QueryPairs`] is an insertion-ordered multi-map: keys may repeat and the
//! order pairs were appended in is the order they serialize in.

use serde_json::Value;

use crate::Result;

/// Ordered query parameters; keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPairs(Vec<(String, String)>);

impl QueryPairs {
    /// Creates an empty set of pairs.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a single pair.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if key.is_empty() {
            return;
        }
        self.0.push((key, value.into()));
    }

    /// Appends a pair with a JSON value, stringified.
    ///
    /// Booleans and numbers use their display form, strings pass through,
    /// null becomes the empty string, arrays and objects are JSON-encoded.
    pub fn append_value(&mut self, key: impl Into<String>, value: &Value) {
        let text = match value {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.append(key, text);
    }

    /// Appends every field of a JSON object.
    ///
    /// Non-object values are ignored.
    pub fn append_object(&mut self, value: &Value) {
        if let Value::Object(fields) = value {
            for (key, field) in fields {
                self.append_value(key.clone(), field);
            }
        }
    }

    /// Appends all pairs from `other`, preserving their order.
    pub fn extend(&mut self, other: &Self) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Builds pairs from any `Serialize` value.
    ///
    /// Repeated fields (`Vec<T>`) become repeated keys.
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Self> {
        let encoded = serde_html_form::to_string(value)?;
        let pairs = url::form_urlencoded::parse(encoded.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Self(pairs))
    }

    /// Parses pairs out of an url-encoded byte string.
    #[must_use]
    pub fn from_encoded(bytes: &[u8]) -> Self {
        let pairs = url::form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self(pairs)
    }

    /// Serializes the pairs to an url-encoded string, preserving order.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.0 {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Appends the pairs to the query string of `url`.
    pub fn append_to_url(&self, url: &mut url::Url) {
        if self.0.is_empty() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (key, value) in &self.0 {
            query.append_pair(key, value);
        }
    }

    /// The first value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryPairs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut pairs = Self::new();
        for (key, value) in iter {
            pairs.append(key, value);
        }
        pairs
    }
}

impl<'a> IntoIterator for &'a QueryPairs {
    type Item = (&'a String, &'a String);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, String)>,
        fn(&'a (String, String)) -> (&'a String, &'a String),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use serde_json::json;

    use super::*;

    #[test]
    fn append_preserves_order_and_repeats() {
        let mut pairs = QueryPairs::new();
        pairs.append("b", "2");
        pairs.append("a", "1");
        pairs.append("b", "3");

        check!(pairs.to_query_string() == "b=2&a=1&b=3");
        check!(pairs.get("b") == Some("2"));
    }

    #[test]
    fn append_skips_empty_keys() {
        let mut pairs = QueryPairs::new();
        pairs.append("", "x");
        check!(pairs.is_empty());
    }

    #[test]
    fn append_value_stringification() {
        let mut pairs = QueryPairs::new();
        pairs.append_value("n", &json!(42));
        pairs.append_value("b", &json!(true));
        pairs.append_value("s", &json!("text"));
        pairs.append_value("nil", &json!(null));
        pairs.append_value("arr", &json!([1, 2]));

        check!(pairs.to_query_string() == "n=42&b=true&s=text&nil=&arr=%5B1%2C2%5D");
    }

    #[test]
    fn from_serialize_repeated_fields() {
        #[derive(serde::Serialize)]
        struct Filter {
            q: String,
            tags: Vec<String>,
        }

        let filter = Filter {
            q: "rust".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
        };
        let pairs = QueryPairs::from_serialize(&filter).expect("serialize");
        check!(pairs.to_query_string() == "q=rust&tags=a&tags=b");
    }

    #[test]
    fn append_to_url() {
        let mut url = url::Url::parse("https://api.example.com/items?page=1").expect("url");
        let pairs: QueryPairs = [("limit", "10")].into_iter().collect();
        pairs.append_to_url(&mut url);
        check!(url.as_str() == "https://api.example.com/items?page=1&limit=10");
    }

    #[test]
    fn from_encoded_roundtrip() {
        let pairs = QueryPairs::from_encoded(b"a=1&b=x%20y");
        check!(pairs.get("b") == Some("x y"));
        check!(pairs.len() == 2);
    }
}
