//! Runtime value tree shared by fields, groups and collections.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A typed form value.
///
/// Leaf fields produce `Text`/`Number`/`Bool`/`Date`, groups produce `Map`,
/// collections produce `List`. `Null` marks the absence of a value: a failed
/// cast, an invalid element, or an aggregate nulled by an invalid child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// No value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A numeric value.
    Number(f64),
    /// A string value.
    Text(String),
    /// A calendar date value (UTC).
    Date(DateTime<Utc>),
    /// An ordered list of values (collection aggregate).
    List(Vec<Value>),
    /// A keyed map of values (group aggregate).
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Check whether this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the string content, if this is a `Text` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the numeric content, if this is a `Number` value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the boolean content, if this is a `Bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the date content, if this is a `Date` value.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the list content, if this is a `List` value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the map content, if this is a `Map` value.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Render the value as the raw string a field would hold.
    ///
    /// `Null` renders empty, numbers drop a trailing `.0`, dates render as
    /// RFC 3339. Composite values render recursively; they only show up here
    /// when a composite value is pushed into a leaf, which is a user error we
    /// keep printable rather than panicking on.
    pub fn stringify(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Text(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::stringify).collect();
                write!(f, "[{}]", parts.join(","))
            }
            Self::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{k}:{}", v.stringify()))
                    .collect();
                write!(f, "{{{}}}", parts.join(","))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Map(entries)
    }
}

/// Check whether a raw string is a well-formed numeric literal.
///
/// This is deliberately stricter than `f64::from_str`, which also accepts
/// `inf` and `NaN` spellings that no form input should silently become.
pub fn is_numeric(raw: &str) -> bool {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    let re = NUMERIC.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+(\.\d+)?|\.\d+)([eE][+-]?\d+)?$").expect("numeric regex")
    });
    re.is_match(raw.trim())
}
