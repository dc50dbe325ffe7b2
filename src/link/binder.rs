//! Link factories for textual specifications.

use std::sync::Arc;

use super::error::LinkError;
use super::property_link::PropertyLink;
use super::resolver::Resolver;
use super::spec::{parse_attr_ref, parse_link_spec};
use crate::object::{ObjectHandle, ObjectTree};

/// Bind `"Obj1.attr1 : Obj2.attr2"`, both objects looked up under `root`.
pub fn bind_from_spec(
    tree: &Arc<ObjectTree>,
    root: ObjectHandle,
    spec: &str,
    resolver: &Resolver,
) -> Result<PropertyLink, LinkError> {
    if !tree.is_alive(root) {
        return Err(LinkError::NoTree);
    }
    let spec = parse_link_spec(spec)?;
    let a = resolver.resolve_endpoint(tree, root, &spec.left.object, &spec.left.attribute)?;
    let b = resolver.resolve_endpoint(tree, root, &spec.right.object, &spec.right.attribute)?;
    PropertyLink::create(a, b)
}

/// Bind `object.attribute` (left) to `"Obj.attr"` (right) looked up under
/// `root`.
pub fn bind_one_to_spec(
    tree: &Arc<ObjectTree>,
    object: ObjectHandle,
    attribute: &str,
    root: ObjectHandle,
    right_spec: &str,
    resolver: &Resolver,
) -> Result<PropertyLink, LinkError> {
    if !tree.is_alive(object) || !tree.is_alive(root) {
        return Err(LinkError::InvalidObject);
    }
    let right = parse_attr_ref(right_spec)?;
    let a = resolver.resolve_endpoint_direct(tree, object, attribute)?;
    let b = resolver.resolve_endpoint(tree, root, &right.object, &right.attribute)?;
    PropertyLink::create(a, b)
}
