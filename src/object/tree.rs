use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};

use super::reflect::{ReflectError, Reflectable};
use super::types::*;

type SubscriptionId = u64;

type Callback = dyn Fn(&ChangeEvent) + Send + Sync;

struct ObjectNode {
    name: String,
    parent: Option<ObjectHandle>,
    children: Vec<ObjectHandle>,
    /// Object-level extended attributes, outside the class's reflected set.
    dynamic: BTreeMap<String, Value>,
    object: Box<dyn Reflectable>,
}

struct Slot {
    generation: u32,
    node: Option<ObjectNode>,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Arena {
    fn get(&self, handle: ObjectHandle) -> Option<&ObjectNode> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut ObjectNode> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.node.as_mut())
    }

    fn insert(&mut self, node: ObjectNode) -> ObjectHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return ObjectHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        ObjectHandle {
            index,
            generation: 0,
        }
    }

    fn vacate(&mut self, handle: ObjectHandle) {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.node.take().is_some()
        {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(handle.index);
        }
    }
}

struct Subscriber {
    id: SubscriptionId,
    object: ObjectHandle,
    channel: ChannelId,
    callback: Weak<Callback>,
}

/// Arena that owns a tree of reflected objects and routes their change
/// notifications.
///
/// Handles stay valid only while their object lives; every accessor takes
/// the handle and quietly reports absence for stale ones. No lock is held
/// while subscriber callbacks run, so callbacks may read and write the tree.
#[derive(Default)]
pub struct ObjectTree {
    arena: RwLock<Arena>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_subscription: Mutex<SubscriptionId>,
    pending: Mutex<VecDeque<ChangeEvent>>,
    delivery: RwLock<Delivery>,
    change_counter: RwLock<u64>,
}

impl std::fmt::Debug for ObjectTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectTree")
            .field("objects", &self.len())
            .field("subscribers", &self.subscribers.read().len())
            .field("delivery", &*self.delivery.read())
            .finish_non_exhaustive()
    }
}

impl ObjectTree {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delivery(delivery: Delivery) -> Arc<Self> {
        let tree = Self::default();
        *tree.delivery.write() = delivery;
        Arc::new(tree)
    }

    fn mark_changed(&self) {
        let mut counter = self.change_counter.write();
        *counter = counter.wrapping_add(1);
    }

    /// Bumped on every structural change and every effective attribute write.
    pub fn change_counter(&self) -> u64 {
        *self.change_counter.read()
    }

    pub fn delivery(&self) -> Delivery {
        *self.delivery.read()
    }

    pub fn set_delivery(&self, delivery: Delivery) {
        *self.delivery.write() = delivery;
    }

    // ── Structure ──────────────────────────────────────────────────────────

    pub fn insert_root(&self, name: impl Into<String>, object: Box<dyn Reflectable>) -> ObjectHandle {
        let handle = self.arena.write().insert(ObjectNode {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            dynamic: BTreeMap::new(),
            object,
        });
        self.mark_changed();
        handle
    }

    /// Insert `object` as the last child of `parent`. Returns `None` if the
    /// parent is gone.
    pub fn insert_child(
        &self,
        parent: ObjectHandle,
        name: impl Into<String>,
        object: Box<dyn Reflectable>,
    ) -> Option<ObjectHandle> {
        let handle = {
            let mut arena = self.arena.write();
            arena.get(parent)?;
            let handle = arena.insert(ObjectNode {
                name: name.into(),
                parent: Some(parent),
                children: Vec::new(),
                dynamic: BTreeMap::new(),
                object,
            });
            if let Some(node) = arena.get_mut(parent) {
                node.children.push(handle);
            }
            handle
        };
        self.mark_changed();
        Some(handle)
    }

    /// Destroy an object and its whole subtree. Every handle into the subtree
    /// goes stale and its subscriptions and queued events are dropped.
    pub fn destroy(&self, handle: ObjectHandle) -> bool {
        let doomed = self.descendants(handle);
        if doomed.is_empty() {
            return false;
        }

        {
            let mut arena = self.arena.write();
            let parent = arena.get(handle).and_then(|n| n.parent);
            if let Some(parent) = parent
                && let Some(node) = arena.get_mut(parent)
            {
                node.children.retain(|c| *c != handle);
            }
            for h in &doomed {
                arena.vacate(*h);
            }
        }

        self.subscribers
            .write()
            .retain(|s| !doomed.contains(&s.object));
        self.pending.lock().retain(|e| !doomed.contains(&e.object));

        log::debug!("Destroyed {} object(s) under {}", doomed.len(), handle);
        self.mark_changed();
        true
    }

    pub fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.arena.read().get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        let arena = self.arena.read();
        arena.slots.len() - arena.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self, handle: ObjectHandle) -> Option<String> {
        self.arena.read().get(handle).map(|n| n.name.clone())
    }

    pub fn class_name(&self, handle: ObjectHandle) -> Option<&'static str> {
        self.arena.read().get(handle).map(|n| n.object.class_name())
    }

    pub fn parent(&self, handle: ObjectHandle) -> Option<ObjectHandle> {
        self.arena.read().get(handle).and_then(|n| n.parent)
    }

    pub fn children(&self, handle: ObjectHandle) -> Vec<ObjectHandle> {
        self.arena
            .read()
            .get(handle)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// `root` followed by all of its descendants, depth-first in insertion
    /// order. Empty if `root` is stale.
    pub fn descendants(&self, root: ObjectHandle) -> Vec<ObjectHandle> {
        let arena = self.arena.read();
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            if let Some(node) = arena.get(handle) {
                out.push(handle);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Find an object named `name`: `root` itself first, then its direct
    /// children, then recursively into each child in order.
    pub fn find_by_name(&self, root: ObjectHandle, name: &str) -> Option<ObjectHandle> {
        let arena = self.arena.read();
        let node = arena.get(root)?;
        if node.name == name {
            return Some(root);
        }
        find_child(&arena, &node.children, name)
    }

    // ── Attributes ─────────────────────────────────────────────────────────

    pub fn attributes(&self, handle: ObjectHandle) -> Vec<AttributeInfo> {
        self.arena
            .read()
            .get(handle)
            .map(|n| n.object.attributes())
            .unwrap_or_default()
    }

    pub fn attribute_info(&self, handle: ObjectHandle, name: &str) -> Option<AttributeInfo> {
        self.arena.read().get(handle)?.object.attribute(name)
    }

    pub fn channels(&self, handle: ObjectHandle) -> Vec<ChannelId> {
        self.arena
            .read()
            .get(handle)
            .map(|n| n.object.channels())
            .unwrap_or_default()
    }

    pub fn get_attribute(&self, handle: ObjectHandle, name: &str) -> Option<Value> {
        self.arena.read().get(handle)?.object.get_attribute(name)
    }

    /// Write an attribute and notify subscribers of every channel the object
    /// emitted. Returns whether the stored value changed.
    pub fn set_attribute(
        &self,
        handle: ObjectHandle,
        name: &str,
        value: Value,
    ) -> Result<bool, ReflectError> {
        let (outcome, current) = {
            let mut arena = self.arena.write();
            let node = arena.get_mut(handle).ok_or(ReflectError::Expired)?;
            let outcome = node.object.set_attribute(name, value)?;
            (outcome, node.object.get_attribute(name))
        };

        if !outcome.changed {
            return Ok(false);
        }
        self.mark_changed();

        let events = outcome.emitted.into_iter().map(|channel| ChangeEvent {
            object: handle,
            value: channel.argument.and(current.clone()),
            channel,
        });
        match self.delivery() {
            Delivery::Immediate => {
                for event in events {
                    self.deliver(&event);
                }
            }
            Delivery::Queued => self.pending.lock().extend(events),
        }
        Ok(true)
    }

    pub fn dynamic_attributes(&self, handle: ObjectHandle) -> Vec<(String, Value)> {
        self.arena
            .read()
            .get(handle)
            .map(|n| {
                n.dynamic
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn dynamic_attribute(&self, handle: ObjectHandle, name: &str) -> Option<Value> {
        self.arena.read().get(handle)?.dynamic.get(name).cloned()
    }

    pub fn set_dynamic_attribute(
        &self,
        handle: ObjectHandle,
        name: impl Into<String>,
        value: Value,
    ) -> bool {
        match self.arena.write().get_mut(handle) {
            Some(node) => {
                node.dynamic.insert(name.into(), value);
                true
            }
            None => false,
        }
    }

    // ── Notifications ──────────────────────────────────────────────────────

    /// Call `callback` whenever `handle` emits `channel`. Returns `None` if
    /// the object is gone.
    pub fn subscribe(
        self: &Arc<Self>,
        handle: ObjectHandle,
        channel: ChannelId,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Option<Subscription> {
        if !self.is_alive(handle) {
            return None;
        }
        let strong: Arc<Callback> = Arc::new(callback);
        let id = {
            let mut next = self.next_subscription.lock();
            *next += 1;
            *next
        };
        self.subscribers.write().push(Subscriber {
            id,
            object: handle,
            channel,
            callback: Arc::downgrade(&strong),
        });
        Some(Subscription {
            id,
            tree: Arc::downgrade(self),
            callback: Some(strong),
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Deliver the events queued so far. Events raised while dispatching stay
    /// queued for the next call. Returns the number of events delivered.
    pub fn dispatch_pending(&self) -> usize {
        let batch: Vec<ChangeEvent> = self.pending.lock().drain(..).collect();
        for event in &batch {
            self.deliver(event);
        }
        batch.len()
    }

    fn deliver(&self, event: &ChangeEvent) {
        // Collect live callbacks first so no lock is held during the calls.
        let callbacks: Vec<Arc<Callback>> = {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|s| s.callback.strong_count() > 0);
            subscribers
                .iter()
                .filter(|s| s.object == event.object && s.channel == event.channel)
                .filter_map(|s| s.callback.upgrade())
                .collect()
        };
        log::trace!(
            "{} {} -> {} subscriber(s)",
            event.object,
            event.channel,
            callbacks.len()
        );
        for callback in callbacks {
            callback(event);
        }
    }
}

fn find_child(arena: &Arena, children: &[ObjectHandle], name: &str) -> Option<ObjectHandle> {
    for &child in children {
        if arena.get(child).is_some_and(|n| n.name == name) {
            return Some(child);
        }
    }
    for &child in children {
        if let Some(node) = arena.get(child)
            && let Some(found) = find_child(arena, &node.children, name)
        {
            return Some(found);
        }
    }
    None
}

/// Guard for a change callback registered with [`ObjectTree::subscribe`].
///
/// Cancelling (or dropping) the guard removes the callback. Both are safe
/// after the tree or the object is gone.
pub struct Subscription {
    id: SubscriptionId,
    tree: Weak<ObjectTree>,
    callback: Option<Arc<Callback>>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.callback.is_some()
    }

    pub fn cancel(&mut self) {
        if self.callback.take().is_some()
            && let Some(tree) = self.tree.upgrade()
        {
            tree.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample() -> (Arc<ObjectTree>, ObjectHandle, ObjectHandle, ObjectHandle) {
        let tree = ObjectTree::new();
        let root = tree.insert_root("Form", widgets::create("QWidget").unwrap());
        let group = tree
            .insert_child(root, "group", widgets::create("QWidget").unwrap())
            .unwrap();
        let edit = tree
            .insert_child(group, "lineEdit", widgets::create("QLineEdit").unwrap())
            .unwrap();
        (tree, root, group, edit)
    }

    fn text_changed() -> ChannelId {
        ChannelId::new("textChanged", Some(ValueType::String))
    }

    #[test]
    fn test_find_by_name() {
        let (tree, root, group, edit) = sample();
        assert_eq!(tree.find_by_name(root, "Form"), Some(root));
        assert_eq!(tree.find_by_name(root, "group"), Some(group));
        assert_eq!(tree.find_by_name(root, "lineEdit"), Some(edit));
        assert_eq!(tree.find_by_name(group, "Form"), None);
        assert_eq!(tree.find_by_name(root, "missing"), None);
    }

    #[test]
    fn test_find_prefers_shallow_match() {
        let (tree, root, group, _) = sample();
        let deep = tree
            .insert_child(group, "twin", widgets::create("QLabel").unwrap())
            .unwrap();
        let shallow = tree
            .insert_child(root, "twin", widgets::create("QLabel").unwrap())
            .unwrap();
        assert_ne!(deep, shallow);
        assert_eq!(tree.find_by_name(root, "twin"), Some(shallow));
    }

    #[test]
    fn test_descendants_order() {
        let (tree, root, group, edit) = sample();
        assert_eq!(tree.descendants(root), vec![root, group, edit]);
    }

    #[test]
    fn test_destroy_makes_handles_stale() {
        let (tree, root, group, edit) = sample();
        assert!(tree.destroy(group));
        assert!(!tree.is_alive(group));
        assert!(!tree.is_alive(edit));
        assert!(tree.children(root).is_empty());
        assert_eq!(tree.get_attribute(edit, "text"), None);
        assert_eq!(
            tree.set_attribute(edit, "text", "x".into()),
            Err(ReflectError::Expired)
        );

        // Slot reuse must not revive old handles.
        let fresh = tree
            .insert_child(root, "other", widgets::create("QLabel").unwrap())
            .unwrap();
        assert!(tree.is_alive(fresh));
        assert!(!tree.is_alive(edit));
        assert!(!tree.is_alive(group));
        assert!(!tree.destroy(group));
    }

    #[test]
    fn test_immediate_delivery() {
        let (tree, _, _, edit) = sample();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let _sub = tree
            .subscribe(edit, text_changed(), move |event| {
                assert_eq!(event.value, Some(Value::from("hello")));
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(tree.set_attribute(edit, "text", "hello".into()), Ok(true));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Equal write: no change, no notification.
        assert_eq!(tree.set_attribute(edit, "text", "hello".into()), Ok(false));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_delivery() {
        let (tree, _, _, edit) = sample();
        tree.set_delivery(Delivery::Queued);
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let _sub = tree
            .subscribe(edit, text_changed(), move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        tree.set_attribute(edit, "text", "a".into()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(tree.pending_count(), 1);
        assert_eq!(tree.dispatch_pending(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(tree.pending_count(), 0);
    }

    #[test]
    fn test_subscription_cancel_is_idempotent() {
        let (tree, _, _, edit) = sample();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let mut sub = tree
            .subscribe(edit, text_changed(), move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(tree.subscriber_count(), 1);

        sub.cancel();
        sub.cancel();
        assert!(!sub.is_active());
        assert_eq!(tree.subscriber_count(), 0);

        tree.set_attribute(edit, "text", "b".into()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_outlives_tree() {
        let (tree, _, _, edit) = sample();
        let mut sub = tree.subscribe(edit, text_changed(), |_| {}).unwrap();
        drop(tree);
        sub.cancel();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_subscribe_to_stale_object() {
        let (tree, _, group, edit) = sample();
        tree.destroy(group);
        assert!(tree.subscribe(edit, text_changed(), |_| {}).is_none());
    }

    #[test]
    fn test_dynamic_attributes() {
        let (tree, root, _, edit) = sample();
        assert!(tree.set_dynamic_attribute(edit, "_text", "label.text".into()));
        assert_eq!(
            tree.dynamic_attribute(edit, "_text"),
            Some(Value::from("label.text"))
        );
        assert_eq!(tree.dynamic_attributes(root), vec![]);
        // Extended attributes are not part of the reflected class.
        assert!(tree.attribute_info(edit, "_text").is_none());
    }
}
