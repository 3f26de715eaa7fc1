//! Contracts for external collaborators.
//!
//! These subsystems live elsewhere in the product; the pipeline consumes
//! them through trait objects only.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A template from the gallery, used to seed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Unique template identifier.
    pub id: String,
    /// Human-readable template name.
    pub name: String,
    /// Gallery category.
    pub category: String,
    /// Short description shown to the analyzer as context.
    pub description: String,
    /// Template source text.
    pub source: String,
    /// Language hint for the generator ("tsx", "html", ...).
    pub language: String,
}

/// Read-only access to the template gallery.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Lists templates in a category.
    async fn get_templates_by_category(&self, category: &str) -> Result<Vec<TemplateInfo>>;

    /// Fetches a single template by id.
    async fn get_template(&self, id: &str) -> Result<TemplateInfo>;
}

/// Minimal file metadata as exposed by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Storage identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Containing folder id, if any.
    pub folder_id: Option<String>,
}

/// File storage operations the surrounding product implements.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Lists files, optionally scoped to a folder.
    async fn list_files(&self, folder_id: Option<&str>) -> Result<Vec<FileEntry>>;

    /// Moves files into a folder.
    async fn move_files(&self, ids: &[String], folder_id: Option<&str>) -> Result<()>;

    /// Deletes files.
    async fn delete_files(&self, ids: &[String]) -> Result<()>;
}

/// Output of the out-of-process component-markup compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledBundle {
    /// Directly executable code.
    pub compiled_code: String,
    /// External modules the compiled code imports.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Content hash of the compiled code.
    pub hash: String,
    /// Whether this result was served from the compiler's cache.
    #[serde(default)]
    pub cached: bool,
}

/// Structured compile failure from the out-of-process compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileFailure {
    /// Human-readable error message.
    pub message: String,
    /// Error category ("syntax", "module-resolution", ...).
    pub category: String,
    /// Suggested fix, when the compiler can name one.
    pub suggestion: Option<String>,
}

impl std::fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Out-of-process compiler turning component markup into executable code.
#[async_trait]
pub trait ComponentCompiler: Send + Sync {
    /// Compiles raw component-markup source.
    ///
    /// Returns a structured failure rather than an `Err` for source-level
    /// problems; `Err` is reserved for transport/process failures.
    async fn compile(
        &self,
        source: &str,
        libraries: &[String],
    ) -> Result<std::result::Result<CompiledBundle, CompileFailure>>;
}
