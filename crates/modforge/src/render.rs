//! Rendering of the golden module template.
//!
//! Output for the `orders` descriptor (`id: int`, `note: str` with a default,
//! capability `Store`, operation `save_order`):
//!
//! ```text
//! # orders.py
//! # Generated by modforge from a module descriptor.
//!
//! from __future__ import annotations
//!
//! from dataclasses import dataclass
//! from pathlib import Path
//! from typing import Protocol
//!
//!
//! @dataclass(frozen=True, slots=True, kw_only=True)
//! class Order:
//!     id: int
//!     note: str = "note"
//!
//!
//! class Store(Protocol):
//!     def store(self, value: Order, *, target: Path) -> None: ...
//!
//!
//! def save_order(store: Store, *, out_dir: Path) -> Path:
//!     value = Order(
//!         id=0,
//!     )
//!     target = out_dir / "orders.dat"
//!     store.store(value, target=target)
//!     return target
//! ```

use std::fmt::Write;

use crate::descriptor::{FieldSpec, TypeTag};
use crate::validate::ValidatedDescriptor;

const INDENT: &str = "    ";

/// Extension of the output location returned by the generated operation.
const OUTPUT_EXTENSION: &str = "dat";

/// A rendered module, tied to the descriptor it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedModule<'a> {
    text: String,
    source: &'a ValidatedDescriptor,
}

impl<'a> RenderedModule<'a> {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn descriptor(&self) -> &'a ValidatedDescriptor {
        self.source
    }

    /// Names of the fields declared on the value type, in declaration order
    pub fn field_names(&self) -> Vec<&'a str> {
        self.source
            .descriptor()
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect()
    }

    /// File name the module should be written under, e.g. `orders.py`
    pub fn file_name(&self) -> String {
        format!("{}.py", self.source.descriptor().module_name)
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Render a validated descriptor. Pure and deterministic.
pub fn render(validated: &ValidatedDescriptor) -> RenderedModule<'_> {
    let mut text = String::with_capacity(1024);

    push_header(&mut text, validated);
    push_imports(&mut text);
    push_value_type(&mut text, validated);
    push_capability(&mut text, validated);
    push_operation(&mut text, validated);

    tracing::debug!(
        module = %validated.descriptor().module_name,
        bytes = text.len(),
        "Rendered module"
    );

    RenderedModule {
        text,
        source: validated,
    }
}

/// Literal used for a field's default and for its constructor argument.
fn placeholder(field: &FieldSpec) -> String {
    match field.type_tag {
        TypeTag::String => format!("\"{}\"", field.name),
        TypeTag::Integer => "0".to_string(),
        TypeTag::Path => "Path(\".\")".to_string(),
        TypeTag::Bytes => "b\"\"".to_string(),
    }
}

fn push_header(out: &mut String, validated: &ValidatedDescriptor) {
    let d = validated.descriptor();
    let _ = writeln!(out, "# {}.py", d.module_name);
    out.push_str("# Generated by modforge from a module descriptor.\n");
    if let Some(author) = &d.author {
        let _ = writeln!(out, "# Author: {}", author.trim());
    }
    out.push('\n');
}

fn push_imports(out: &mut String) {
    out.push_str("from __future__ import annotations\n");
    out.push('\n');
    out.push_str("from dataclasses import dataclass\n");
    out.push_str("from pathlib import Path\n");
    out.push_str("from typing import Protocol\n");
}

fn push_value_type(out: &mut String, validated: &ValidatedDescriptor) {
    let d = validated.descriptor();
    out.push_str("\n\n@dataclass(frozen=True, slots=True, kw_only=True)\n");
    let _ = writeln!(out, "class {}:", d.value_type_name);
    for field in &d.fields {
        let _ = write!(out, "{INDENT}{}: {}", field.name, field.type_tag.annotation());
        if field.has_default {
            let _ = write!(out, " = {}", placeholder(field));
        }
        out.push('\n');
    }
}

fn push_capability(out: &mut String, validated: &ValidatedDescriptor) {
    let d = validated.descriptor();
    let _ = write!(
        out,
        "\n\nclass {cap}(Protocol):\n\
         {INDENT}def {method}(self, value: {value}, *, target: Path) -> None: ...\n",
        cap = d.capability_name,
        method = validated.capability_method(),
        value = d.value_type_name,
    );
}

fn push_operation(out: &mut String, validated: &ValidatedDescriptor) {
    let d = validated.descriptor();
    let receiver = validated.capability_method();

    let _ = write!(
        out,
        "\n\ndef {op}({receiver}: {cap}, *, out_dir: Path) -> Path:\n",
        op = d.operation_name,
        cap = d.capability_name,
    );

    let _ = writeln!(out, "{INDENT}value = {}(", d.value_type_name);
    for field in d.fields.iter().filter(|f| !f.has_default) {
        let _ = writeln!(out, "{INDENT}{INDENT}{}={},", field.name, placeholder(field));
    }
    let _ = writeln!(out, "{INDENT})");

    let _ = writeln!(
        out,
        "{INDENT}target = out_dir / \"{}.{OUTPUT_EXTENSION}\"",
        d.module_name
    );
    let _ = writeln!(out, "{INDENT}{receiver}.{receiver}(value, target=target)");
    let _ = writeln!(out, "{INDENT}return target");
}
