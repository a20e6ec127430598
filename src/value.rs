//! Store terms, typed values and literal encoding

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::vocab::XSD;

/// Storage datatype of a predicate's object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Datatype {
    /// Plain quoted string literal
    String,
    /// `"..."^^xsd:dateTime`
    DateTime,
    /// `"..."^^xsd:boolean`
    Boolean,
    /// `"..."^^xsd:anyURI`
    AnyUri,
    /// `"..."^^xsd:integer`
    Integer,
    /// Reference to another resource, rendered as `<iri>`
    Iri,
}

impl Datatype {
    /// Prefixed datatype annotation appended after the quoted lexical form
    pub fn annotation(&self) -> Option<&'static str> {
        match self {
            Datatype::DateTime => Some("xsd:dateTime"),
            Datatype::Boolean => Some("xsd:boolean"),
            Datatype::AnyUri => Some("xsd:anyURI"),
            Datatype::Integer => Some("xsd:integer"),
            Datatype::String | Datatype::Iri => None,
        }
    }

    /// Expanded datatype IRI, as reported back by the store
    pub fn xsd_iri(&self) -> Option<String> {
        self.annotation()
            .map(|a| format!("{}{}", XSD, a.trim_start_matches("xsd:")))
    }

    /// Render a lexical form as query text for this datatype
    pub fn render(&self, lexical: &str) -> String {
        match self {
            Datatype::Iri => format!("<{}>", strip_angles(lexical)),
            other => match other.annotation() {
                Some(annotation) => format!("\"{}\"^^{}", escape_literal(lexical), annotation),
                None => format!("\"{}\"", escape_literal(lexical)),
            },
        }
    }
}

/// Escape a lexical form for embedding inside a double-quoted literal
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Remove surrounding `<` `>` if present
pub fn strip_angles(iri: &str) -> &str {
    iri.strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(iri)
}

/// One bound value as returned by the store (SPARQL JSON results shape)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Term {
    #[serde(rename = "uri")]
    Iri { value: String },
    #[serde(rename = "literal", alias = "typed-literal")]
    Literal {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
    },
    #[serde(rename = "bnode")]
    Blank { value: String },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri { value: value.into() }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal { value: value.into(), datatype: None }
    }

    pub fn typed(value: impl Into<String>, datatype: Datatype) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: datatype.xsd_iri(),
        }
    }

    /// Lexical form regardless of term kind
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri { value } | Term::Literal { value, .. } | Term::Blank { value } => value,
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri { .. })
    }
}

/// A typed scalar value on a reduced object or in caller input
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<FixedOffset>),
    Iri(String),
}

impl Value {
    /// Coerce a store term using the schema's declared datatype.
    ///
    /// Unparseable lexical forms are kept as strings.
    pub fn from_term(term: &Term, datatype: Datatype) -> Value {
        if let Term::Iri { value } = term {
            return Value::Iri(value.clone());
        }
        Value::parse_as(term.lexical(), datatype)
    }

    /// Parse a lexical form as the given datatype, falling back to a string
    pub fn parse_as(lexical: &str, datatype: Datatype) -> Value {
        match datatype {
            Datatype::String | Datatype::AnyUri => Value::Str(lexical.to_string()),
            Datatype::Iri => Value::Iri(strip_angles(lexical).to_string()),
            Datatype::Boolean => match lexical {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => Value::Str(lexical.to_string()),
            },
            Datatype::Integer => lexical
                .parse::<i64>()
                .map(Value::Int)
                .or_else(|_| lexical.parse::<f64>().map(Value::Float))
                .unwrap_or_else(|_| Value::Str(lexical.to_string())),
            Datatype::DateTime => parse_datetime(lexical)
                .map(Value::DateTime)
                .unwrap_or_else(|| Value::Str(lexical.to_string())),
        }
    }

    /// Lexical form used when embedding the value into query text
    pub fn lexical(&self) -> String {
        match self {
            Value::Str(s) | Value::Iri(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Render as query text for the given storage datatype
    pub fn render(&self, datatype: Datatype) -> String {
        match self {
            Value::Iri(iri) => format!("<{}>", strip_angles(iri)),
            other => datatype.render(&other.lexical()),
        }
    }

    /// True for empty strings, the only scalar treated as "unset"
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Iri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Order two values of possibly different kinds.
    ///
    /// Numbers compare numerically, datetimes chronologically, booleans
    /// false < true, everything else by lexical form.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => self.lexical().cmp(&other.lexical()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Bool(b) => serializer.serialize_bool(*b),
            other => serializer.serialize_str(&other.lexical()),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
            Float(f64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Value::Bool(b),
            Raw::Int(i) => Value::Int(i),
            Raw::Float(f) => Value::Float(f),
            Raw::Str(s) => Value::Str(s),
        })
    }
}

/// Parse an xsd:dateTime, accepting a bare date as midnight UTC
pub fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// A field on a reduced object: single-valued or multi-valued per schema
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    One(Value),
    Many(Vec<Value>),
}

impl FieldValue {
    pub fn values(&self) -> &[Value] {
        match self {
            FieldValue::One(v) => std::slice::from_ref(v),
            FieldValue::Many(vs) => vs,
        }
    }

    pub fn first(&self) -> Option<&Value> {
        self.values().first()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.first().and_then(Value::as_str)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::One(v) => v.serialize(serializer),
            FieldValue::Many(vs) => vs.serialize(serializer),
        }
    }
}
