//! Module descriptors: the raw, caller-supplied description of a module.
//!
//! A [`ModuleDescriptor`] can be built in code, parsed from field shorthand
//! (`name:type[:default]`), or loaded from a TOML or JSON file:
//!
//! ```toml
//! module_name = "orders"
//! value_type_name = "Order"
//! capability_name = "Store"
//! operation_name = "save_order"
//!
//! [[fields]]
//! name = "id"
//! type = "integer"
//!
//! [[fields]]
//! name = "note"
//! type = "string"
//! default = true
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The type of a field in the generated value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    #[serde(alias = "str")]
    String,
    #[serde(alias = "int")]
    Integer,
    Path,
    Bytes,
}

impl TypeTag {
    /// Python annotation used for the field.
    pub fn annotation(&self) -> &'static str {
        match self {
            TypeTag::String => "str",
            TypeTag::Integer => "int",
            TypeTag::Path => "Path",
            TypeTag::Bytes => "bytes",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::String => write!(f, "string"),
            TypeTag::Integer => write!(f, "integer"),
            TypeTag::Path => write!(f, "path"),
            TypeTag::Bytes => write!(f, "bytes"),
        }
    }
}

impl FromStr for TypeTag {
    type Err = FieldSpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(TypeTag::String),
            "integer" | "int" => Ok(TypeTag::Integer),
            "path" => Ok(TypeTag::Path),
            "bytes" => Ok(TypeTag::Bytes),
            _ => Err(FieldSpecParseError::UnknownType(s.to_string())),
        }
    }
}

/// One field of the generated value type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    #[serde(default, alias = "default")]
    pub has_default: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            has_default: false,
        }
    }

    /// Render this field with a default value clause
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// Errors from parsing `name:type[:default]` shorthand
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldSpecParseError {
    #[error("expected name:type[:default], got {0:?}")]
    Malformed(String),

    #[error("unknown field type {0:?} (expected string, integer, path or bytes)")]
    UnknownType(String),

    #[error("unknown field flag {0:?} (only \"default\" is supported)")]
    UnknownFlag(String),
}

impl FromStr for FieldSpec {
    type Err = FieldSpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (name, type_tag, flag) = match parts.as_slice() {
            [name, ty] => (*name, *ty, None),
            [name, ty, flag] => (*name, *ty, Some(*flag)),
            _ => return Err(FieldSpecParseError::Malformed(s.to_string())),
        };

        // Name rules are the validator's job; only reject an obviously missing name here.
        if name.is_empty() {
            return Err(FieldSpecParseError::Malformed(s.to_string()));
        }

        let spec = FieldSpec::new(name, type_tag.parse()?);
        match flag {
            None => Ok(spec),
            Some("default") => Ok(spec.with_default()),
            Some(other) => Err(FieldSpecParseError::UnknownFlag(other.to_string())),
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.type_tag)?;
        if self.has_default {
            write!(f, ":default")?;
        }
        Ok(())
    }
}

/// Everything needed to generate one module.
///
/// This is the unchecked stage. Pass it to [`crate::validate`] to obtain a
/// [`crate::ValidatedDescriptor`], the only input the renderer accepts.
///
/// Every key is optional on disk so a file can be completed by CLI flags;
/// missing names and fields are reported by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub value_type_name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub capability_name: String,
    #[serde(default)]
    pub operation_name: String,
    /// Author credited in the module header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(
        module_name: impl Into<String>,
        value_type_name: impl Into<String>,
        capability_name: impl Into<String>,
        operation_name: impl Into<String>,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            value_type_name: value_type_name.into(),
            fields: Vec::new(),
            capability_name: capability_name.into(),
            operation_name: operation_name.into(),
            author: None,
        }
    }

    /// Append a field
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Set the header author
    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    /// Load a descriptor from a `.toml` or `.json` file.
    ///
    /// Files with any other extension are parsed as TOML.
    pub fn load(path: &Path) -> Result<Self, DescriptorLoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DescriptorLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let descriptor = if is_json {
            serde_json::from_str(&contents).map_err(|e| DescriptorLoadError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            toml::from_str(&contents).map_err(|e| DescriptorLoadError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        tracing::debug!("Loaded descriptor from {:?}", path);
        Ok(descriptor)
    }
}

/// Errors that can occur while loading a descriptor file
#[derive(Debug, thiserror::Error)]
pub enum DescriptorLoadError {
    #[error("Failed to read descriptor {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse descriptor {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}
