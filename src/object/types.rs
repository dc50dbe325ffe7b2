use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a reflected attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int,
    Double,
    String,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Double => "double",
            Self::String => "string",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically typed attribute value.
///
/// Serialized as a bare JSON scalar, so `1` is an `Int` and `1.5` a
/// `Double`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Equality for change detection. Unlike `==`, a NaN double matches
    /// another NaN, so rewriting NaN is not a change.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Double(a), Self::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{}", d),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Identifies a change-notification channel by name and argument signature.
///
/// Two channels with the same name but different argument types are
/// distinct, e.g. `valueChanged(int)` and `valueChanged(double)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    pub name: String,
    #[serde(default)]
    pub argument: Option<ValueType>,
}

impl ChannelId {
    pub fn new(name: impl Into<String>, argument: Option<ValueType>) -> Self {
        Self {
            name: name.into(),
            argument,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument {
            Some(arg) => write!(f, "{}({})", self.name, arg),
            None => write!(f, "{}()", self.name),
        }
    }
}

/// Reflected metadata for one attribute of an object's class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub value_type: ValueType,
    pub readable: bool,
    pub writable: bool,
    /// Change channel declared by the class itself, if any.
    pub notify: Option<ChannelId>,
}

impl AttributeInfo {
    /// True when the attribute can take part in a link.
    pub fn is_bindable(&self) -> bool {
        self.readable && self.writable
    }
}

/// Generational handle to an object stored in an
/// [`ObjectTree`](super::ObjectTree).
///
/// A handle goes stale as soon as the object it names is destroyed; the
/// slot may be reused, but with a different generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.index, self.generation)
    }
}

/// A notification raised by an object after one of its attributes changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub object: ObjectHandle,
    pub channel: ChannelId,
    /// Channel argument, present when the channel signature carries one.
    pub value: Option<Value>,
}

/// How an [`ObjectTree`](super::ObjectTree) hands change events to
/// subscribers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Subscribers run synchronously right after the write.
    #[default]
    Immediate,
    /// Events wait in a queue until the event loop dispatches them.
    Queued,
}
