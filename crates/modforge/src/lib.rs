//! modforge: generator for the golden Python module template
//!
//! This crate turns a small module descriptor into a complete, style-compliant
//! Python module:
//! - Descriptor validation against naming and shape rules
//! - Deterministic rendering of the fixed template
//! - Atomic writes of the rendered module
//!
//! Each stage has its own type, and each transition is one-way:
//! [`ModuleDescriptor`] → [`validate`] → [`ValidatedDescriptor`] → [`render`]
//! → [`RenderedModule`] → [`write`].
//!
//! ```no_run
//! use modforge::{generate, FieldSpec, ModuleDescriptor, TypeTag, WriteOptions};
//! use std::path::Path;
//!
//! let descriptor = ModuleDescriptor::new("orders", "Order", "Store", "save_order")
//!     .with_field(FieldSpec::new("id", TypeTag::Integer))
//!     .with_field(FieldSpec::new("note", TypeTag::String).with_default());
//!
//! let path = generate(descriptor, Path::new("orders.py"), WriteOptions::default())?;
//! println!("wrote {}", path.display());
//! # Ok::<(), modforge::GenerateError>(())
//! ```

use std::path::{Path, PathBuf};

pub mod config;
pub mod descriptor;
pub mod naming;
pub mod render;
pub mod validate;
pub mod writer;

// Re-export main types
pub use descriptor::{
    DescriptorLoadError, FieldSpec, FieldSpecParseError, ModuleDescriptor, TypeTag,
};
pub use naming::IdentifierRule;
pub use render::{render, RenderedModule};
pub use validate::{diagnose, validate, ValidatedDescriptor, ValidationError};
pub use writer::{write, AtomicRename, Commit, OutputWriter, WriteError, WriteOptions};

/// Errors that can occur while generating a module
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl GenerateError {
    /// Taxonomy name of the underlying error, e.g. `DuplicateField`
    pub fn kind(&self) -> &'static str {
        match self {
            GenerateError::Validation(e) => e.kind(),
            GenerateError::Write(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerateError>;

/// Validate, render and write a module in one call.
pub fn generate(
    descriptor: ModuleDescriptor,
    destination: &Path,
    options: WriteOptions,
) -> Result<PathBuf> {
    let validated = validate(descriptor)?;
    let rendered = render(&validated);
    Ok(write(&rendered, destination, options)?)
}
