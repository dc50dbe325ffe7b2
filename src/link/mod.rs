//! Property links
//!
//! Parses link specifications, resolves them to endpoints on reflected
//! objects and keeps the two attributes of each link in sync.
//! Works purely against the object model.

pub mod binder;
pub mod channels;
pub mod coerce;
pub mod endpoint;
pub mod error;
pub mod property_link;
pub mod resolver;
pub mod spec;

pub use binder::{bind_from_spec, bind_one_to_spec};
pub use channels::{ChannelRule, ChannelRules};
pub use coerce::{CoercionError, coerce};
pub use endpoint::Endpoint;
pub use error::LinkError;
pub use property_link::{LinkId, LinkState, PropertyLink};
pub use resolver::Resolver;
pub use spec::{AttrRef, LinkSpec, ParseError, ParseErrorKind, parse_attr_ref, parse_link_spec};
