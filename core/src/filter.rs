//! Filter expression templates.
//!
//! A template such as `"user = {:user} && active = {:active}"` is rendered by
//! substituting each `{:name}` token with its value from [`FilterParams`]:
//! text is wrapped in single quotes, numbers and booleans are written bare.
//! Spaces are then stripped and the whole expression is parenthesised, giving
//! `(user='john'&&active=true)`.
//!
//! Text values are not escaped. A value containing `'` changes the meaning of
//! the expression, so untrusted input must be validated before it gets here.
//! Spaces inside text values are stripped along with the rest.
//!
//! Floats use Rust's shortest round-trip formatting, so `1e21` renders as
//! `1000000000000000000000` rather than exponent notation, and `1.0` as `1`.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::FilterError;

const OPEN: &str = "{:";
const CLOSE: char = '}';

/// A value that can be substituted into a filter template.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FilterValue {
    fn render(&self) -> String {
        match self {
            FilterValue::Text(s) => format!("'{s}'"),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(s) => f.write_str(s),
            FilterValue::Int(n) => write!(f, "{n}"),
            FilterValue::Float(n) => write!(f, "{n}"),
            FilterValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<f32> for FilterValue {
    fn from(value: f32) -> Self {
        FilterValue::Float(f64::from(value))
    }
}

macro_rules! int_filter_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FilterValue {
                fn from(value: $t) -> Self {
                    FilterValue::Int(i64::from(value))
                }
            }
        )*
    };
}

int_filter_value!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! wide_filter_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FilterValue {
                /// Values outside the `i64` range are kept as floats.
                fn from(value: $t) -> Self {
                    match i64::try_from(value) {
                        Ok(n) => FilterValue::Int(n),
                        Err(_) => FilterValue::Float(value as f64),
                    }
                }
            }
        )*
    };
}

wide_filter_value!(u64, usize, isize);

/// Placeholder name to value. Keys are unique; order does not matter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams(BTreeMap<String, FilterValue>);

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FilterParams
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = FilterParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// A filter template together with the values for its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub content: String,
    pub params: FilterParams,
}

impl Filter {
    pub fn new(content: impl Into<String>, params: FilterParams) -> Self {
        Self {
            content: content.into(),
            params,
        }
    }

    /// Render the filter. Placeholders without a value are left verbatim and
    /// parameters the template never mentions are ignored.
    pub fn build(&self) -> String {
        let rendered = substitute(&self.content, |name| self.params.get(name).map(FilterValue::render));
        finish(&rendered)
    }

    /// Like [`build`](Self::build), but fails on the first placeholder that
    /// has no value.
    pub fn build_strict(&self) -> Result<String, FilterError> {
        let mut missing = None;
        let rendered = substitute(&self.content, |name| match self.params.get(name) {
            Some(value) => Some(value.render()),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                None
            }
        });
        match missing {
            Some(name) => Err(FilterError::MissingParam(name)),
            None => Ok(finish(&rendered)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Single pass over the template: each complete `{:name}` token is looked up
/// once, and substituted text is never scanned again. When the text after a
/// `{:` is not a usable name, only the `{:` is copied and scanning resumes
/// right after it, so a stray opener cannot hide a later placeholder.
fn substitute<F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let value = after_open
            .find(CLOSE)
            .map(|end| &after_open[..end])
            .filter(|name| !name.contains(OPEN))
            .and_then(|name| lookup(name).map(|value| (name.len(), value)));
        match value {
            Some((name_len, value)) => {
                out.push_str(&value);
                rest = &after_open[name_len + CLOSE.len_utf8()..];
            }
            None => {
                out.push_str(OPEN);
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    out
}

fn finish(rendered: &str) -> String {
    let compact: String = rendered.chars().filter(|c| *c != ' ').collect();
    format!("({compact})")
}
