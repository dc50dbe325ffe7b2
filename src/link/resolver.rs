//! Attribute resolution
//!
//! Turns object names and attribute names into validated [`Endpoint`]s:
//! the object must exist, the attribute must be both readable and
//! writable, and the change channel is picked from the class's declaration
//! or, failing that, from the [`ChannelRules`] heuristics.

use std::sync::Arc;

use super::channels::ChannelRules;
use super::endpoint::Endpoint;
use super::error::LinkError;
use crate::object::{AttributeInfo, ChannelId, ObjectHandle, ObjectTree};

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    rules: ChannelRules,
}

impl Resolver {
    pub fn new(rules: ChannelRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ChannelRules {
        &self.rules
    }

    /// Resolve `object_name.attribute` against `root` (the root itself or any
    /// descendant).
    pub fn resolve_endpoint(
        &self,
        tree: &Arc<ObjectTree>,
        root: ObjectHandle,
        object_name: &str,
        attribute: &str,
    ) -> Result<Endpoint, LinkError> {
        if !tree.is_alive(root) {
            return Err(LinkError::InvalidObject);
        }
        let object = tree
            .find_by_name(root, object_name)
            .ok_or_else(|| LinkError::ObjectNotFound {
                name: object_name.to_string(),
            })?;
        self.resolve_endpoint_direct(tree, object, attribute)
    }

    /// Resolve `attribute` on an object the caller already holds.
    pub fn resolve_endpoint_direct(
        &self,
        tree: &Arc<ObjectTree>,
        object: ObjectHandle,
        attribute: &str,
    ) -> Result<Endpoint, LinkError> {
        let (Some(object_name), Some(class)) = (tree.name(object), tree.class_name(object)) else {
            return Err(LinkError::InvalidObject);
        };

        let info = tree
            .attribute_info(object, attribute)
            .ok_or_else(|| LinkError::AttributeNotFound {
                attribute: attribute.to_string(),
                object: object_name.clone(),
                class: class.to_string(),
            })?;
        if !info.is_bindable() {
            return Err(LinkError::AttributeNotBindable {
                attribute: attribute.to_string(),
                object: object_name,
            });
        }

        let channel = self.infer_change_channel(&tree.channels(object), &info);
        match &channel {
            Some(c) => log::debug!("{}.{} changes announced by {}", object_name, attribute, c),
            None => log::debug!(
                "{}.{} has no change channel; it will only sync on creation",
                object_name,
                attribute
            ),
        }
        Ok(Endpoint::new(tree, object, object_name, info, channel))
    }

    /// Pick the channel that fires when `attribute` changes, given the
    /// channels the object exposes.
    ///
    /// A declared channel wins; otherwise the first heuristic rule whose
    /// exact signature is available. `None` means changes on this side are
    /// never observed.
    pub fn infer_change_channel(
        &self,
        available: &[ChannelId],
        attribute: &AttributeInfo,
    ) -> Option<ChannelId> {
        if let Some(declared) = &attribute.notify
            && available.contains(declared)
        {
            return Some(declared.clone());
        }
        self.rules.best_match(&attribute.name, available)
    }
}
