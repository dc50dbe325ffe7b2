//! Host session
//!
//! Owns the currently loaded object tree and every link created against it.
//! Links are disposed before the tree they point into is discarded, both on
//! reload and on [`LinkHost::clear`].
//!
//! ## Declarative bindings
//! After a load, every object (root included) is scanned for extended
//! attributes whose name starts with the configured prefix (`_` by
//! default). `_text = "le2.text"` on object `o` binds `o.text` to
//! `le2.text`. Each declaration is reported on its own and tallied.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::description::{DescriptionError, UiDescription};
use crate::config::Config;
use crate::link::{
    LinkError, PropertyLink, Resolver, bind_from_spec, bind_one_to_spec, coerce, parse_attr_ref,
};
use crate::object::{ObjectHandle, ObjectTree, Value};

/// Outcome of scanning a tree for declarative bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicBindingReport {
    pub ok: usize,
    pub errors: usize,
    /// One line per declaration, in tree order.
    pub messages: Vec<String>,
}

impl DynamicBindingReport {
    /// Tally line, or `None` when the tree declared nothing.
    pub fn summary(&self) -> Option<String> {
        (self.ok > 0 || self.errors > 0).then(|| {
            format!(
                "Dynamic bindings: {} ok, {} errors.",
                self.ok, self.errors
            )
        })
    }
}

struct LoadedUi {
    tree: Arc<ObjectTree>,
    root: ObjectHandle,
    source: Option<PathBuf>,
}

pub struct LinkHost {
    config: Config,
    resolver: Resolver,
    loaded: Option<LoadedUi>,
    links: Vec<PropertyLink>,
}

impl LinkHost {
    pub fn new(config: Config) -> Self {
        let resolver = config.resolver();
        Self {
            config,
            resolver,
            loaded: None,
            links: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn tree(&self) -> Option<&Arc<ObjectTree>> {
        self.loaded.as_ref().map(|ui| &ui.tree)
    }

    pub fn root(&self) -> Option<ObjectHandle> {
        self.loaded.as_ref().map(|ui| ui.root)
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.loaded.as_ref().and_then(|ui| ui.source.as_deref())
    }

    pub fn links(&self) -> &[PropertyLink] {
        &self.links
    }

    // ── Loading ────────────────────────────────────────────────────────────

    /// Replace the current UI with `description` and apply its declarative
    /// bindings. On error the previous UI stays loaded.
    pub fn load(
        &mut self,
        description: &UiDescription,
        source: Option<PathBuf>,
    ) -> Result<DynamicBindingReport, DescriptionError> {
        let (tree, root) = description.build(self.config.delivery)?;
        self.clear();
        log::info!(
            "Loaded UI with {} objects{}",
            tree.len(),
            source
                .as_ref()
                .map(|p| format!(" from {}", p.display()))
                .unwrap_or_default()
        );
        self.loaded = Some(LoadedUi { tree, root, source });
        Ok(self.setup_dynamic_bindings())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<DynamicBindingReport, DescriptionError> {
        let description = UiDescription::from_path(path)?;
        self.load(&description, Some(path.to_path_buf()))
    }

    /// Dispose every link, then discard the loaded tree.
    pub fn clear(&mut self) {
        self.unbind_all();
        if let Some(ui) = self.loaded.take() {
            ui.tree.destroy(ui.root);
        }
    }

    // ── Bindings ───────────────────────────────────────────────────────────

    /// Bind `"Obj1.attr1 : Obj2.attr2"`. Returns the text to show the user.
    pub fn add_binding(&mut self, spec: &str) -> Result<String, String> {
        let Some(ui) = &self.loaded else {
            return Err(format!("Bind error: {}", LinkError::NoTree));
        };
        match bind_from_spec(&ui.tree, ui.root, spec, &self.resolver) {
            Ok(link) => {
                let message = format!("OK: {}  <=>  {}", link.a().pretty(), link.b().pretty());
                self.links.push(link);
                Ok(message)
            }
            Err(e) => {
                log::debug!("Binding '{}' failed: {}", spec, e);
                Err(format!("Bind error: {}", e))
            }
        }
    }

    /// Create the links declared through prefixed extended attributes.
    pub fn setup_dynamic_bindings(&mut self) -> DynamicBindingReport {
        let mut report = DynamicBindingReport::default();
        let Some(ui) = &self.loaded else {
            return report;
        };
        let (tree, root) = (ui.tree.clone(), ui.root);
        let prefix = self.config.dynamic_prefix.as_str();
        if prefix.is_empty() {
            log::warn!("Empty dynamic binding prefix; declarative bindings disabled");
            return report;
        }

        for object in tree.descendants(root) {
            for (name, value) in tree.dynamic_attributes(object) {
                let Some(attribute) = name.strip_prefix(prefix) else {
                    continue;
                };
                let right_spec = value.to_string().trim().to_string();
                if right_spec.is_empty() {
                    continue;
                }

                match bind_one_to_spec(&tree, object, attribute, root, &right_spec, &self.resolver) {
                    Ok(link) => {
                        report.ok += 1;
                        report.messages.push(format!(
                            "Dyn OK: {}  <=>  {}",
                            link.a().pretty(),
                            link.b().pretty()
                        ));
                        self.links.push(link);
                    }
                    Err(e) => {
                        report.errors += 1;
                        report.messages.push(format!(
                            "Dyn ERR: {}.{} -> {}  | {}",
                            tree.name(object).unwrap_or_default(),
                            name,
                            right_spec,
                            e
                        ));
                    }
                }
            }
        }

        if let Some(summary) = report.summary() {
            log::info!("{}", summary);
        }
        report
    }

    /// Dispose every link. Returns how many there were.
    pub fn unbind_all(&mut self) -> usize {
        let count = self.links.len();
        for link in &mut self.links {
            link.dispose();
        }
        self.links.clear();
        count
    }

    // ── External access ────────────────────────────────────────────────────

    fn lookup(&self, reference: &str) -> Result<(&Arc<ObjectTree>, ObjectHandle, String), LinkError> {
        let ui = self.loaded.as_ref().ok_or(LinkError::NoTree)?;
        let r = parse_attr_ref(reference)?;
        let object = ui
            .tree
            .find_by_name(ui.root, &r.object)
            .ok_or(LinkError::ObjectNotFound { name: r.object })?;
        Ok((&ui.tree, object, r.attribute))
    }

    pub fn get_value(&self, reference: &str) -> Result<Value, String> {
        let (tree, object, attribute) = self.lookup(reference).map_err(|e| e.to_string())?;
        tree.get_attribute(object, &attribute).ok_or_else(|| {
            LinkError::AttributeNotFound {
                object: tree.name(object).unwrap_or_default(),
                class: tree.class_name(object).unwrap_or_default().to_string(),
                attribute,
            }
            .to_string()
        })
    }

    /// Write `text` into `Obj.attr` from outside any link, converting it to
    /// the attribute's type. Returns whether the value changed.
    pub fn set_value(&self, reference: &str, text: &str) -> Result<bool, String> {
        let (tree, object, attribute) = self.lookup(reference).map_err(|e| e.to_string())?;
        let info = tree.attribute_info(object, &attribute).ok_or_else(|| {
            LinkError::AttributeNotFound {
                object: tree.name(object).unwrap_or_default(),
                class: tree.class_name(object).unwrap_or_default().to_string(),
                attribute: attribute.clone(),
            }
            .to_string()
        })?;
        let value = coerce(Value::from(text), info.value_type).map_err(|e| e.to_string())?;
        tree.set_attribute(object, &attribute, value)
            .map_err(|e| e.to_string())
    }

    /// Deliver queued change notifications.
    pub fn dispatch_pending(&self) -> usize {
        self.tree().map(|t| t.dispatch_pending()).unwrap_or(0)
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    /// One line per object: `path | class | objectName="name"`, keeping
    /// objects whose name contains `filter` (case-insensitive).
    pub fn listing(&self, filter: &str) -> Vec<String> {
        let Some(ui) = &self.loaded else {
            return vec!["No UI loaded yet.".to_string()];
        };
        let filter = filter.to_lowercase();
        let mut lines: Vec<String> = ui
            .tree
            .descendants(ui.root)
            .into_iter()
            .filter_map(|handle| {
                let name = ui.tree.name(handle)?;
                if !filter.is_empty() && !name.to_lowercase().contains(&filter) {
                    return None;
                }
                Some(format!(
                    "{} | {} | objectName=\"{}\"",
                    object_path(&ui.tree, handle),
                    ui.tree.class_name(handle).unwrap_or_default(),
                    if name.is_empty() { "<empty>" } else { name.as_str() }
                ))
            })
            .collect();

        if lines.is_empty() {
            lines.push("(No objects match current filter.)".to_string());
        }
        if let Some(path) = &ui.source {
            lines.insert(0, format!("Loaded file: {}", path.display()));
        }
        lines
    }

    /// Attributes, values and channels of one object.
    pub fn inspect(&self, object_name: &str) -> Result<Vec<String>, String> {
        let ui = self
            .loaded
            .as_ref()
            .ok_or_else(|| LinkError::NoTree.to_string())?;
        let object = ui
            .tree
            .find_by_name(ui.root, object_name)
            .ok_or_else(|| {
                LinkError::ObjectNotFound {
                    name: object_name.to_string(),
                }
                .to_string()
            })?;

        let channels = ui.tree.channels(object);
        let mut lines = vec![format!(
            "{} ({})",
            object_path(&ui.tree, object),
            ui.tree.class_name(object).unwrap_or_default()
        )];
        for info in ui.tree.attributes(object) {
            let value = ui
                .tree
                .get_attribute(object, &info.name)
                .map(|v| format!("{:?}", v.to_string()))
                .unwrap_or_else(|| "<unreadable>".to_string());
            let access = if info.is_bindable() { "rw" } else { "r" };
            let channel = self
                .resolver
                .infer_change_channel(&channels, &info)
                .map(|c| format!("  ~ {}", c))
                .unwrap_or_default();
            lines.push(format!(
                "  {}: {} = {} [{}]{}",
                info.name, info.value_type, value, access, channel
            ));
        }
        for (name, value) in ui.tree.dynamic_attributes(object) {
            lines.push(format!("  {} (extended) = {:?}", name, value.to_string()));
        }
        Ok(lines)
    }
}

/// `/`-separated object names from the root down to `handle`; unnamed
/// objects appear as `<unnamed Class>`.
pub fn object_path(tree: &ObjectTree, handle: ObjectHandle) -> String {
    let mut parts = Vec::new();
    let mut current = Some(handle);
    while let Some(h) = current {
        let Some(name) = tree.name(h) else {
            break;
        };
        parts.push(if name.is_empty() {
            format!("<unnamed {}>", tree.class_name(h).unwrap_or_default())
        } else {
            name
        });
        current = tree.parent(h);
    }
    parts.reverse();
    parts.join("/")
}
