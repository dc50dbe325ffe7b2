//! Host glue
//!
//! Loads UI descriptions into an object tree, applies declarative bindings
//! and exposes a small command shell for binding and inspecting attributes.

mod description;
mod link_host;
mod shell;

pub use description::{DEFAULT_ROOT_NAME, DescriptionError, ObjectDescription, UiDescription};
pub use link_host::{DynamicBindingReport, LinkHost, object_path};
pub use shell::run_shell;
