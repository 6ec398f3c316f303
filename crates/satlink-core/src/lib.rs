pub mod artifact;
pub mod config;
pub mod types;

pub use artifact::{Artifact, ArtifactDir, ArtifactError, BuiltinTemplates, TemplateResolver};
pub use config::{ConfigError, SatlinkConfig};
pub use types::*;
