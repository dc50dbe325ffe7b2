//! The reflection contract every linkable object implements.

use thiserror::Error;

use super::types::{AttributeInfo, ChannelId, Value, ValueType};

/// Reasons an object refuses an attribute write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReflectError {
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("attribute '{0}' is read-only")]
    ReadOnly(String),
    #[error("attribute '{attribute}' expects {expected}, got {actual}")]
    TypeMismatch {
        attribute: String,
        expected: ValueType,
        actual: ValueType,
    },
    #[error("object no longer exists")]
    Expired,
}

/// Result of a successful attribute write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// False when the written value equalled the stored one.
    pub changed: bool,
    /// Channels the object emitted because of the write.
    pub emitted: Vec<ChannelId>,
}

/// Explicit reflection interface for an object that can be inspected and
/// linked by attribute name.
///
/// Implementations must not emit anything when a write leaves the value
/// unchanged.
pub trait Reflectable: Send + Sync {
    /// Class name shown in listings and error messages.
    fn class_name(&self) -> &'static str;

    fn attributes(&self) -> Vec<AttributeInfo>;

    fn attribute(&self, name: &str) -> Option<AttributeInfo> {
        self.attributes().into_iter().find(|a| a.name == name)
    }

    /// Every change channel this object can emit.
    fn channels(&self) -> Vec<ChannelId>;

    fn has_channel(&self, channel: &ChannelId) -> bool {
        self.channels().iter().any(|c| c == channel)
    }

    /// Current value, or `None` if the attribute is unknown or unreadable.
    fn get_attribute(&self, name: &str) -> Option<Value>;

    /// Write a value of exactly the attribute's declared type.
    fn set_attribute(&mut self, name: &str, value: Value) -> Result<WriteOutcome, ReflectError>;
}
