//! Shared data models for the shorts pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - The generated script and its validation rules
//! - Artifacts handed from one pipeline stage to the next
//! - Stage identifiers and their fixed execution order
//! - Upload metadata and encoding defaults
//! - Environment-driven configuration reading

pub mod artifact;
pub mod encoding;
pub mod env;
pub mod metadata;
pub mod run;
pub mod script;
pub mod stage;
pub mod timestamp;

// Re-export common types
pub use artifact::{
    ImageArtifact, ImageSet, NarrationAudio, RenderedVideo, SubtitledVideo, UploadResult,
};
pub use encoding::EncodingConfig;
pub use env::{EnvReader, Lookup};
pub use metadata::{PrivacyStatus, VideoMetadata};
pub use run::RunId;
pub use script::{Script, ScriptError};
pub use stage::Stage;
