//! Modelgate Training
//!
//! Backend-agnostic primitives for the model pipeline:
//! - Vehicle listing records and dataset loading (`CarRecord`, `load_dataset`)
//! - Run identity and the `TrainingRun` record
//! - Artifact metadata and the artifact store layout
//! - Capability traits for the opaque training step (`Trainer`) and inference (`ModelRuntime`)

pub mod artifacts;
pub mod dataset;
pub mod error;
pub mod job;
pub mod layout;
pub mod loader;
pub mod progress;
pub mod registry;
pub mod runtime;
pub mod trainer;

pub use artifacts::{ArtifactMetadata, ModelArtifact, fingerprint_dataset, make_artifact, sha256_file};
pub use dataset::{CarRecord, Dataset, DatasetFingerprint, FieldValue, NumericField};
pub use error::{TrainingError, TrainingResult};
pub use job::{ArtifactIdentity, RunId, RunStatus, TrainingRequest, TrainingRun};
pub use layout::StoreLayout;
pub use loader::{DatasetFormat, load_dataset, write_csv_dataset};
pub use progress::{ProgressEvent, ProgressSink, TracingProgressSink};
pub use registry::{PublishedModelEntry, discover_published_models, read_metadata, resolve_published_model};
pub use runtime::{LoadedModel, ModelRuntime};
pub use trainer::{Trainer, TrainerOutcome};
