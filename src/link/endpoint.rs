use std::sync::{Arc, Weak};

use crate::object::{
    AttributeInfo, ChangeEvent, ChannelId, ObjectHandle, ObjectTree, ReflectError, Subscription,
    Value,
};

/// One side of a property link: an object, one of its bindable attributes,
/// and the channel (if any) that announces changes to it.
///
/// Holds no ownership over the object. Every access re-checks that the tree
/// and the object are still alive.
#[derive(Debug, Clone)]
pub struct Endpoint {
    tree: Weak<ObjectTree>,
    object: ObjectHandle,
    object_name: String,
    attribute: AttributeInfo,
    channel: Option<ChannelId>,
}

impl Endpoint {
    pub(crate) fn new(
        tree: &Arc<ObjectTree>,
        object: ObjectHandle,
        object_name: String,
        attribute: AttributeInfo,
        channel: Option<ChannelId>,
    ) -> Self {
        Self {
            tree: Arc::downgrade(tree),
            object,
            object_name,
            attribute,
            channel,
        }
    }

    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    /// Object name captured when the endpoint was resolved.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn attribute(&self) -> &AttributeInfo {
        &self.attribute
    }

    pub fn channel(&self) -> Option<&ChannelId> {
        self.channel.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.attribute.is_bindable()
            && self
                .tree
                .upgrade()
                .is_some_and(|tree| tree.is_alive(self.object))
    }

    /// `object.attribute`, using the object's current name.
    pub fn pretty(&self) -> String {
        match self.tree.upgrade().and_then(|tree| tree.name(self.object)) {
            Some(name) => format!("{}.{}", name, self.attribute.name),
            None => "<null>.<null>".to_string(),
        }
    }

    pub(crate) fn read(&self) -> Option<Value> {
        self.tree
            .upgrade()?
            .get_attribute(self.object, &self.attribute.name)
    }

    pub(crate) fn write(&self, value: Value) -> Result<bool, ReflectError> {
        let tree = self.tree.upgrade().ok_or(ReflectError::Expired)?;
        tree.set_attribute(self.object, &self.attribute.name, value)
    }

    pub(crate) fn subscribe(
        &self,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Option<Subscription> {
        let channel = self.channel.clone()?;
        self.tree
            .upgrade()?
            .subscribe(self.object, channel, callback)
    }
}
