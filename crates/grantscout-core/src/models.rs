use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Wire names used by the scrape API. Older deployments disagree on a
/// couple of them, so some fields have more than one spelling.
pub mod fields {
    pub const TITLE: &str = "Grant name/title";
    pub const SHORT_SUMMARY: &str = "Short summary";
    pub const SUMMARY: &str = "Summary";
    pub const ORGANIZATION: &str = "Funding organization";
    pub const VALUE: &str = "Grant value";
    pub const VALUE_NUMERIC: &str = "Grant value (numeric only)";
    pub const DEADLINE: &str = "Application deadline";
    pub const COUNTRIES: &str = "Eligible countries";
    pub const SECTORS: &str = "Sector/field";
    pub const LINK: &str = "link URL";
}

/// How the user is searching
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Keywords,
    Url,
}

impl SearchMode {
    /// Stable name, also used as the cache key component
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Keywords => "keywords",
            SearchMode::Url => "url",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keywords" => Ok(SearchMode::Keywords),
            "url" => Ok(SearchMode::Url),
            other => Err(format!("unknown search mode '{}' (expected keywords or url)", other)),
        }
    }
}

/// Grant value as the API reports it: a number, or free text such as
/// "Not specified" or "Up to EUR 50k"
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GrantValue {
    Amount(f64),
    Text(String),
}

impl fmt::Display for GrantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantValue::Amount(n) => f.write_str(&format_plain_number(*n)),
            GrantValue::Text(s) => f.write_str(s),
        }
    }
}

/// Shortest decimal form: 5000.0 prints as "5000", 1500.5 as "1500.5"
pub fn format_plain_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One funding opportunity, in the one shape the rest of the crate uses.
///
/// Built from loose API JSON by [`GrantRecord::from_json`]; serializes back
/// to the primary wire names so cached entries look like API output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct GrantRecord {
    #[serde(rename = "Grant name/title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "Short summary", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(rename = "Funding organization", skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(rename = "Grant value", skip_serializing_if = "Option::is_none")]
    pub value: Option<GrantValue>,

    #[serde(rename = "Application deadline", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,

    #[serde(rename = "Eligible countries", skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,

    /// Kept as delivered; a single comma-delimited string stays one entry
    #[serde(rename = "Sector/field", skip_serializing_if = "Vec::is_empty")]
    pub sectors: Vec<String>,

    #[serde(rename = "link URL", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl GrantRecord {
    /// Normalize one API object. Anything that isn't a JSON object is not a
    /// grant and yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        Some(Self {
            title: text_field(obj, &[fields::TITLE]),
            summary: text_field(obj, &[fields::SHORT_SUMMARY, fields::SUMMARY]),
            organization: text_field(obj, &[fields::ORGANIZATION]),
            value: value_field(obj, &[fields::VALUE, fields::VALUE_NUMERIC]),
            deadline: text_field(obj, &[fields::DEADLINE]),
            countries: list_field(obj, fields::COUNTRIES),
            sectors: list_field(obj, fields::SECTORS),
            link: text_field(obj, &[fields::LINK]),
        })
    }
}

impl TryFrom<Value> for GrantRecord {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        GrantRecord::from_json(&value)
            .ok_or_else(|| format!("expected a grant object, found {}", json_kind(&value)))
    }
}

/// Pull the `grants` array out of a scrape response body.
///
/// Missing or non-array `grants` means no grants; non-object entries are
/// skipped.
pub fn grants_from_response(body: &Value) -> Vec<GrantRecord> {
    body.get("grants")
        .and_then(Value::as_array)
        .map(|grants| grants.iter().filter_map(GrantRecord::from_json).collect())
        .unwrap_or_default()
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            Some(parts.join("; "))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_present(obj, keys).and_then(scalar_text)
}

fn value_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<GrantValue> {
    match first_present(obj, keys)? {
        Value::Number(n) => match n.as_f64() {
            Some(f) => Some(GrantValue::Amount(f)),
            None => Some(GrantValue::Text(n.to_string())),
        },
        other => scalar_text(other).map(GrantValue::Text),
    }
}

fn list_field(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other)
            .filter(|s| !s.is_empty())
            .into_iter()
            .collect(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
