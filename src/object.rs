//! Reflected object model
//!
//! Objects expose their attributes and change channels through the
//! [`Reflectable`] trait and live in an [`ObjectTree`] arena, addressed by
//! generational [`ObjectHandle`]s that go stale when the object dies.

mod reflect;
mod tree;
mod types;

pub use reflect::{ReflectError, Reflectable, WriteOutcome};
pub use tree::{ObjectTree, Subscription};
pub use types::*;
