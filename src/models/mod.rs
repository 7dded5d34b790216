pub mod loaders;
pub mod notebook;
pub mod report;
pub mod stage;

pub use loaders::{load_manifest, load_notebook, StageEntry, WorkflowManifest};
pub use notebook::{Cell, CellKind, NotebookDocument};
pub use report::{ExecutionResult, WorkflowReport};
pub use stage::{stage_name_from_path, StageKind, StageTarget};
