//! uilink - two-way property links over a reflected UI object tree
//!
//! Objects expose typed attributes and change channels through
//! [`object::Reflectable`]. A [`link::PropertyLink`] keeps one attribute of
//! one object equal to an attribute of another, converting values between
//! types and suppressing feedback loops. [`host::LinkHost`] loads UI
//! descriptions and applies the bindings they declare.

pub mod config;
pub mod host;
pub mod link;
pub mod object;
pub mod widgets;

pub use config::Config;
pub use host::LinkHost;
pub use link::{LinkError, PropertyLink};
pub use object::{ObjectHandle, ObjectTree, Value, ValueType};
