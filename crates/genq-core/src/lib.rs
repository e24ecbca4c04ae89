pub mod job;
pub mod progress;
mod model_types;

pub use job::{Artifact, Job, JobPatch, JobStatus, Metadata, PatchError};
pub use model_types::{GenerationType, UnknownGenerationType};
