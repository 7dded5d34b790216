pub mod artifact_store;
pub mod indentation;
pub mod partitioner;
pub mod results_loader;
pub mod synthesizer;

pub use artifact_store::{clear_data_dirs, ArtifactStore, StoredFile};
pub use partitioner::{partition, Partition};
pub use results_loader::ResultsLoader;
pub use synthesizer::{ScriptSynthesizer, SynthesizedProgram};
