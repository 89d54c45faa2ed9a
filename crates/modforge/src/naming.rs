//! Identifier rules for names that end up in the generated Python module.

use std::fmt;

/// Python hard keywords. Soft keywords (`match`, `case`, `type`, `_`) are
/// valid identifiers and stay allowed.
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Names bound at module level by the template's imports.
const IMPORTED_NAMES: &[&str] = &["Path", "Protocol", "dataclass"];

/// Parameter and local names used inside the generated operation.
const TEMPLATE_LOCALS: &[&str] = &["out_dir", "target", "value"];

/// The rule a name failed to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierRule {
    /// `[a-z][a-z0-9_]*`
    LowerSnake,
    /// `[A-Z][A-Za-z0-9]*`
    Pascal,
    /// Matches its pattern but would break the generated module.
    NotReserved,
}

impl IdentifierRule {
    pub fn pattern(&self) -> &'static str {
        match self {
            IdentifierRule::LowerSnake => "[a-z][a-z0-9_]*",
            IdentifierRule::Pascal => "[A-Z][A-Za-z0-9]*",
            IdentifierRule::NotReserved => "a name that is not reserved in the generated module",
        }
    }
}

impl fmt::Display for IdentifierRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

/// `[a-z][a-z0-9_]*`
pub fn is_lower_snake(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    }
}

/// `[A-Z][A-Za-z0-9]*`
pub fn is_pascal(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

pub fn is_keyword(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(&name)
}

/// True if a module-level definition with this name would shadow an import.
pub fn shadows_import(name: &str) -> bool {
    IMPORTED_NAMES.contains(&name)
}

/// True if the name collides with a parameter or local of the generated operation.
pub fn is_template_local(name: &str) -> bool {
    TEMPLATE_LOCALS.contains(&name)
}

/// Convert a PascalCase name to snake_case.
///
/// Acronym runs stay together: `HTTPClient` becomes `http_client`,
/// `S3Store` becomes `s3_store`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    out
}
