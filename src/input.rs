//! Caller-supplied field values for create and edit

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Value of one input field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Null,
    Scalar(Value),
    List(Vec<Value>),
    /// Nested sub-objects (ports, addresses)
    Objects(Vec<Input>),
    Object(Input),
}

impl InputValue {
    /// Null, empty string, and empty collections count as unset
    pub fn is_empty(&self) -> bool {
        match self {
            InputValue::Null => true,
            InputValue::Scalar(v) => v.is_empty(),
            InputValue::List(vs) => vs.is_empty(),
            InputValue::Objects(os) => os.is_empty(),
            InputValue::Object(o) => o.is_empty(),
        }
    }

    /// Scalar values carried by this field (empty for nested objects)
    pub fn values(&self) -> Vec<&Value> {
        match self {
            InputValue::Scalar(v) => vec![v],
            InputValue::List(vs) => vs.iter().collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Value> for InputValue {
    fn from(v: Value) -> Self {
        InputValue::Scalar(v)
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        InputValue::Scalar(Value::from(s))
    }
}

impl From<bool> for InputValue {
    fn from(b: bool) -> Self {
        InputValue::Scalar(Value::Bool(b))
    }
}

impl From<i64> for InputValue {
    fn from(i: i64) -> Self {
        InputValue::Scalar(Value::Int(i))
    }
}

impl From<Vec<&str>> for InputValue {
    fn from(vs: Vec<&str>) -> Self {
        InputValue::List(vs.into_iter().map(Value::from).collect())
    }
}

impl From<Vec<Input>> for InputValue {
    fn from(os: Vec<Input>) -> Self {
        InputValue::Objects(os)
    }
}

/// Field map for one entity being created
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Input {
    fields: BTreeMap<String, InputValue>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<InputValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<InputValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&InputValue> {
        self.fields.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<InputValue> {
        self.fields.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &InputValue)> {
        self.fields.iter()
    }

    /// Scalar string value of a field, if set
    pub fn str_value(&self, key: &str) -> Option<String> {
        match self.fields.get(key) {
            Some(InputValue::Scalar(v)) if !v.is_empty() => Some(v.lexical()),
            _ => None,
        }
    }

    /// Drop every unset field; absent and empty are the same at the storage
    /// boundary
    pub fn normalized(mut self) -> Self {
        self.fields.retain(|_, v| !v.is_empty());
        self
    }
}

/// How an edit delta is applied
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOperation {
    Add,
    Replace,
    Remove,
}

/// One field change in an edit request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub key: String,
    #[serde(default)]
    pub value: Vec<Value>,
    #[serde(default)]
    pub operation: Option<EditOperation>,
}

impl Delta {
    pub fn new(key: &str, value: impl Into<Value>) -> Self {
        Delta {
            key: key.to_string(),
            value: vec![value.into()],
            operation: None,
        }
    }

    pub fn with_operation(mut self, operation: EditOperation) -> Self {
        self.operation = Some(operation);
        self
    }
}
