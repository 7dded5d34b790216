pub mod manifest_loader;
pub mod notebook_loader;

pub use manifest_loader::{load_manifest, parse_manifest, StageEntry, WorkflowManifest};
pub use notebook_loader::load_notebook;
