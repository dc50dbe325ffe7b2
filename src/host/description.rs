//! UI descriptions
//!
//! A UI description is a JSON object tree. Each object names its widget
//! class, its object name, initial attribute values, extended attributes and
//! children:
//!
//! ```json
//! {
//!   "root": {
//!     "class": "QWidget",
//!     "name": "Form",
//!     "children": [
//!       { "class": "QLineEdit", "name": "lineEdit", "properties": { "text": "hi" } },
//!       { "class": "QLabel", "name": "label", "dynamic": { "_text": "lineEdit.text" } }
//!     ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::link::coerce;
use crate::object::{Delivery, ObjectHandle, ObjectTree, Reflectable, Value};
use crate::widgets;

/// Name given to a root object loaded without one.
pub const DEFAULT_ROOT_NAME: &str = "LoadedRoot";

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("cannot read UI description: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid UI description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown widget class '{class}' for object '{object}'")]
    UnknownClass { class: String, object: String },
    #[error("'{object}' ({class}) has no property '{property}'")]
    UnknownProperty {
        object: String,
        class: String,
        property: String,
    },
    #[error("cannot set '{object}.{property}': {reason}")]
    BadProperty {
        object: String,
        property: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescription {
    pub class: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    /// Extended attributes attached to the object, outside its class.
    #[serde(default)]
    pub dynamic: BTreeMap<String, Value>,
    #[serde(default)]
    pub children: Vec<ObjectDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiDescription {
    pub root: ObjectDescription,
}

impl std::str::FromStr for UiDescription {
    type Err = DescriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

impl UiDescription {
    pub fn from_path(path: &Path) -> Result<Self, DescriptionError> {
        std::fs::read_to_string(path)?.parse()
    }

    /// Instantiate the description into a fresh tree.
    pub fn build(&self, delivery: Delivery) -> Result<(Arc<ObjectTree>, ObjectHandle), DescriptionError> {
        let tree = ObjectTree::with_delivery(delivery);
        let root_name = if self.root.name.is_empty() {
            DEFAULT_ROOT_NAME
        } else {
            self.root.name.as_str()
        };
        let root = tree.insert_root(root_name, instantiate(&self.root, root_name)?);
        apply_dynamic(&tree, root, &self.root);
        for child in &self.root.children {
            build_subtree(&tree, root, child)?;
        }
        Ok((tree, root))
    }
}

fn build_subtree(
    tree: &ObjectTree,
    parent: ObjectHandle,
    desc: &ObjectDescription,
) -> Result<(), DescriptionError> {
    let object = instantiate(desc, &desc.name)?;
    // The parent was inserted just before its children.
    let Some(handle) = tree.insert_child(parent, desc.name.clone(), object) else {
        return Ok(());
    };
    apply_dynamic(tree, handle, desc);
    for child in &desc.children {
        build_subtree(tree, handle, child)?;
    }
    Ok(())
}

fn instantiate(desc: &ObjectDescription, name: &str) -> Result<Box<dyn Reflectable>, DescriptionError> {
    let mut object = widgets::create(&desc.class).ok_or_else(|| DescriptionError::UnknownClass {
        class: desc.class.clone(),
        object: name.to_string(),
    })?;

    for (property, value) in &desc.properties {
        let info = object
            .attribute(property)
            .ok_or_else(|| DescriptionError::UnknownProperty {
                object: name.to_string(),
                class: desc.class.clone(),
                property: property.clone(),
            })?;
        let bad = |reason: String| DescriptionError::BadProperty {
            object: name.to_string(),
            property: property.clone(),
            reason,
        };
        let value = coerce(value.clone(), info.value_type).map_err(|e| bad(e.to_string()))?;
        object
            .set_attribute(property, value)
            .map_err(|e| bad(e.to_string()))?;
    }
    Ok(object)
}

fn apply_dynamic(tree: &ObjectTree, handle: ObjectHandle, desc: &ObjectDescription) {
    for (name, value) in &desc.dynamic {
        tree.set_dynamic_attribute(handle, name.clone(), value.clone());
    }
}
