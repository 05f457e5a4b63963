//! Parameter values and URL escaping.

use std::collections::BTreeMap;
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// Characters allowed unescaped in a path segment: unreserved plus `:@&=+$,;`.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b';');

/// Characters left alone in query string keys and values (space becomes `+`).
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b' ')
    .remove(b'_')
    .remove(b'.')
    .remove(b'-');

/// A recognized or supplied parameter. Glob segments carry lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl ParamValue {
    /// String form used in paths; lists join with `/`.
    pub fn to_param(&self) -> String {
        match self {
            ParamValue::Single(value) => value.clone(),
            ParamValue::List(parts) => parts.join("/"),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(value) => Some(value),
            ParamValue::List(_) => None,
        }
    }

    /// Path components; a single value is split on `/`.
    pub fn components(&self) -> Vec<String> {
        match self {
            ParamValue::Single(value) => value.split('/').map(str::to_string).collect(),
            ParamValue::List(parts) => parts.clone(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Single(value.clone())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(parts: Vec<String>) -> Self {
        ParamValue::List(parts)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(parts: Vec<&str>) -> Self {
        ParamValue::List(parts.into_iter().map(str::to_string).collect())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Single(value.to_string())
    }
}

/// Parameters keyed by name, ordered for stable output.
pub type Params = BTreeMap<String, ParamValue>;

/// Build a parameter map from pairs.
pub fn param_map<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Debug-style rendering used in error messages: `{action: "show", id: "5"}`.
pub fn inspect(params: &Params) -> String {
    let body = params
        .iter()
        .map(|(k, v)| match v {
            ParamValue::Single(s) => format!("{k}: {s:?}"),
            ParamValue::List(parts) => format!("{k}: {parts:?}"),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

/// Escape a value for use inside one path segment.
pub fn escape_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Decode percent escapes; `+` is left alone.
pub fn unescape(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Escape for a query string key or value.
pub fn escape_query(value: &str) -> String {
    utf8_percent_encode(value, QUERY_COMPONENT)
        .to_string()
        .replace(' ', "+")
}

/// `?a=1&b=2` from the given keys of `params`, sorted; empty when nothing remains.
pub fn build_query_string<'a, I>(params: &Params, keys: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let mut elements = Vec::new();
    for key in keys {
        match params.get(key) {
            Some(ParamValue::Single(value)) => {
                elements.push(format!("{}={}", escape_query(key), escape_query(value)));
            }
            Some(ParamValue::List(values)) => {
                let list_key = escape_query(&format!("{key}[]"));
                elements.extend(
                    values
                        .iter()
                        .map(|value| format!("{list_key}={}", escape_query(value))),
                );
            }
            None => {}
        }
    }
    if elements.is_empty() {
        return String::new();
    }
    elements.sort();
    format!("?{}", elements.join("&"))
}
