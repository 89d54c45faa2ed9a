//! Descriptor validation.
//!
//! [`validate`] is the only way to produce a [`ValidatedDescriptor`], so the
//! renderer's signature alone guarantees its input was checked.
//!
//! ```
//! use modforge::{validate, FieldSpec, ModuleDescriptor, TypeTag, ValidationError};
//!
//! let descriptor = ModuleDescriptor::new("orders", "Order", "Store", "save_order")
//!     .with_field(FieldSpec::new("id", TypeTag::Integer));
//! assert!(validate(descriptor).is_ok());
//!
//! let empty = ModuleDescriptor::new("orders", "Order", "Store", "save_order");
//! assert_eq!(validate(empty), Err(ValidationError::NoFields));
//! ```

use std::collections::HashMap;

use crate::descriptor::{ModuleDescriptor, TypeTag};
use crate::naming::{self, IdentifierRule};

/// Problems that make a descriptor unusable for rendering
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} {value:?} is not a valid identifier: expected {expected}")]
    InvalidIdentifier {
        /// Location of the offending name, e.g. `module_name` or `fields[2].name`
        field: String,
        value: String,
        expected: IdentifierRule,
    },

    #[error("descriptor declares no fields")]
    NoFields,

    #[error("field {name:?} is declared twice (fields[{first}] and fields[{second}])")]
    DuplicateField {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("field {name:?} (fields[{index}]) has type bytes and cannot have a default")]
    InvalidDefault { name: String, index: usize },

    #[error("{name:?} is used as both {first} and {second}")]
    ConflictingNames {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("{field} is invalid: {reason}")]
    InvalidMetadata {
        field: &'static str,
        reason: &'static str,
    },
}

impl ValidationError {
    /// Taxonomy name of this error
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidIdentifier { .. } => "InvalidIdentifier",
            ValidationError::NoFields => "NoFields",
            ValidationError::DuplicateField { .. } => "DuplicateField",
            ValidationError::InvalidDefault { .. } => "InvalidDefault",
            ValidationError::ConflictingNames { .. } => "ConflictingNames",
            ValidationError::InvalidMetadata { .. } => "InvalidMetadata",
        }
    }
}

/// A descriptor that passed validation.
///
/// Only [`validate`] constructs this type. It is immutable; use
/// [`ValidatedDescriptor::into_inner`] to get the raw descriptor back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDescriptor(ModuleDescriptor);

impl ValidatedDescriptor {
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.0
    }

    pub fn into_inner(self) -> ModuleDescriptor {
        self.0
    }

    /// Method name on the capability boundary, derived from the capability name
    pub fn capability_method(&self) -> String {
        naming::to_snake_case(&self.0.capability_name)
    }
}

impl AsRef<ModuleDescriptor> for ValidatedDescriptor {
    fn as_ref(&self) -> &ModuleDescriptor {
        &self.0
    }
}

/// Validate a descriptor, reporting the first problem found.
pub fn validate(descriptor: ModuleDescriptor) -> Result<ValidatedDescriptor, ValidationError> {
    match diagnose(&descriptor).into_iter().next() {
        Some(err) => {
            tracing::debug!(module = %descriptor.module_name, "Descriptor rejected: {}", err);
            Err(err)
        }
        None => {
            tracing::debug!(
                module = %descriptor.module_name,
                fields = descriptor.fields.len(),
                "Descriptor validated"
            );
            Ok(ValidatedDescriptor(descriptor))
        }
    }
}

/// Collect every problem with a descriptor, in check order.
///
/// Returns an empty vector when the descriptor is valid.
pub fn diagnose(descriptor: &ModuleDescriptor) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_lower(&mut errors, "module_name", &descriptor.module_name);
    check_pascal(&mut errors, "value_type_name", &descriptor.value_type_name);
    check_capability(&mut errors, &descriptor.capability_name);
    check_lower(&mut errors, "operation_name", &descriptor.operation_name);
    if naming::shadows_import(&descriptor.operation_name) {
        errors.push(reserved("operation_name", &descriptor.operation_name));
    }

    if descriptor.value_type_name == descriptor.capability_name {
        errors.push(ValidationError::ConflictingNames {
            name: descriptor.value_type_name.clone(),
            first: "value_type_name",
            second: "capability_name",
        });
    }

    if let Some(author) = &descriptor.author {
        if let Some(reason) = author_problem(author) {
            errors.push(ValidationError::InvalidMetadata {
                field: "author",
                reason,
            });
        }
    }

    if descriptor.fields.is_empty() {
        errors.push(ValidationError::NoFields);
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (index, field) in descriptor.fields.iter().enumerate() {
        let location = format!("fields[{}].name", index);
        check_lower(&mut errors, &location, &field.name);
        if field.name == "self" {
            errors.push(reserved(&location, &field.name));
        }

        match seen.get(field.name.as_str()) {
            Some(&first) => errors.push(ValidationError::DuplicateField {
                name: field.name.clone(),
                first,
                second: index,
            }),
            None => {
                seen.insert(&field.name, index);
            }
        }

        if field.type_tag == TypeTag::Bytes && field.has_default {
            errors.push(ValidationError::InvalidDefault {
                name: field.name.clone(),
                index,
            });
        }
    }

    errors
}

fn check_lower(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if !naming::is_lower_snake(value) {
        errors.push(invalid(field, value, IdentifierRule::LowerSnake));
    } else if naming::is_keyword(value) {
        errors.push(reserved(field, value));
    }
}

fn check_pascal(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if !naming::is_pascal(value) {
        errors.push(invalid(field, value, IdentifierRule::Pascal));
    } else if naming::is_keyword(value) || naming::shadows_import(value) {
        errors.push(reserved(field, value));
    }
}

fn check_capability(errors: &mut Vec<ValidationError>, value: &str) {
    let before = errors.len();
    check_pascal(errors, "capability_name", value);
    // The capability also names its method and the operation's receiver parameter.
    let method = naming::to_snake_case(value);
    if errors.len() == before
        && (naming::is_keyword(&method) || naming::is_template_local(&method))
    {
        errors.push(reserved("capability_name", value));
    }
}

fn author_problem(author: &str) -> Option<&'static str> {
    if author.trim().is_empty() {
        Some("must not be blank")
    } else if author.contains(['\n', '\r']) {
        Some("must be a single line")
    } else if author.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    }
}

fn invalid(field: &str, value: &str, expected: IdentifierRule) -> ValidationError {
    ValidationError::InvalidIdentifier {
        field: field.to_string(),
        value: value.to_string(),
        expected,
    }
}

fn reserved(field: &str, value: &str) -> ValidationError {
    invalid(field, value, IdentifierRule::NotReserved)
}
