//! Checks that rendered modules are valid Python, using tree-sitter-python.

use modforge::{render, validate, FieldSpec, ModuleDescriptor, TypeTag};

/// Top-level declarations of a parsed module.
#[derive(Debug, Default)]
struct Outline {
    classes: Vec<String>,
    functions: Vec<String>,
    /// Annotated fields of the first class, in source order
    value_fields: Vec<String>,
    /// Fields of the first class that carry a default
    defaulted: Vec<String>,
}

fn parse(source: &str) -> tree_sitter::Tree {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .expect("tree-sitter-python grammar incompatible with tree-sitter version");
    parser.parse(source, None).expect("parser returned no tree")
}

fn text<'a>(node: &tree_sitter::Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap()
}

fn outline(source: &str) -> Outline {
    let tree = parse(source);
    let root = tree.root_node();
    assert!(!root.has_error(), "rendered module has syntax errors:\n{source}");

    let mut outline = Outline::default();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        let def = if child.kind() == "decorated_definition" {
            child.child_by_field_name("definition").unwrap()
        } else {
            child
        };

        let name = def
            .child_by_field_name("name")
            .map(|n| text(&n, source).to_string());

        match def.kind() {
            "class_definition" => {
                if outline.classes.is_empty() {
                    collect_fields(&def, source, &mut outline);
                }
                outline.classes.push(name.unwrap());
            }
            "function_definition" => outline.functions.push(name.unwrap()),
            _ => {}
        }
    }

    outline
}

fn collect_fields(class: &tree_sitter::Node, source: &str, outline: &mut Outline) {
    let body = class.child_by_field_name("body").unwrap();
    let mut cursor = body.walk();
    for stmt in body.named_children(&mut cursor) {
        if stmt.kind() != "expression_statement" {
            continue;
        }
        let Some(assignment) = stmt.named_child(0) else {
            continue;
        };
        if assignment.kind() != "assignment" || assignment.child_by_field_name("type").is_none() {
            continue;
        }
        let left = assignment.child_by_field_name("left").unwrap();
        let name = text(&left, source).to_string();
        if assignment.child_by_field_name("right").is_some() {
            outline.defaulted.push(name.clone());
        }
        outline.value_fields.push(name);
    }
}

#[test]
fn orders_module_has_expected_outline() {
    let validated = validate(
        ModuleDescriptor::new("orders", "Order", "Store", "save_order")
            .with_field(FieldSpec::new("id", TypeTag::Integer))
            .with_field(FieldSpec::new("note", TypeTag::String).with_default()),
    )
    .unwrap();
    let rendered = render(&validated);

    let outline = outline(rendered.text());
    assert_eq!(outline.classes, vec!["Order", "Store"]);
    assert_eq!(outline.functions, vec!["save_order"]);
    assert_eq!(outline.value_fields, vec!["id", "note"]);
    assert_eq!(outline.defaulted, vec!["note"]);
}

#[test]
fn every_type_tag_renders_valid_python() {
    let validated = validate(
        ModuleDescriptor::new("asset_catalog", "Asset", "HTTPBlobStore", "publish_asset")
            .with_author(Some("Platform Team".to_string()))
            .with_field(FieldSpec::new("payload", TypeTag::Bytes))
            .with_field(FieldSpec::new("label", TypeTag::String).with_default())
            .with_field(FieldSpec::new("size", TypeTag::Integer))
            .with_field(FieldSpec::new("origin", TypeTag::Path).with_default())
            .with_field(FieldSpec::new("root", TypeTag::Path))
            .with_field(FieldSpec::new("retries", TypeTag::Integer).with_default()),
    )
    .unwrap();
    let rendered = render(&validated);

    let outline = outline(rendered.text());
    assert_eq!(outline.classes, vec!["Asset", "HTTPBlobStore"]);
    assert_eq!(outline.functions, vec!["publish_asset"]);
    assert_eq!(outline.value_fields, rendered.field_names());
    assert_eq!(outline.defaulted, vec!["label", "origin", "retries"]);
}

#[test]
fn all_defaulted_fields_render_valid_python() {
    let validated = validate(
        ModuleDescriptor::new("settings", "Settings", "Sink", "emit")
            .with_field(FieldSpec::new("name", TypeTag::String).with_default())
            .with_field(FieldSpec::new("level", TypeTag::Integer).with_default()),
    )
    .unwrap();
    let rendered = render(&validated);

    let outline = outline(rendered.text());
    assert_eq!(outline.value_fields, vec!["name", "level"]);
    assert!(rendered.text().contains("    value = Settings(\n    )\n"));
}

#[test]
fn field_count_and_order_match_descriptor() {
    let names = ["zulu", "alpha", "mike", "bravo", "x1", "y_2"];
    let mut descriptor = ModuleDescriptor::new("ordering", "Row", "Table", "insert_row");
    for (i, name) in names.iter().enumerate() {
        let tag = match i % 4 {
            0 => TypeTag::String,
            1 => TypeTag::Integer,
            2 => TypeTag::Path,
            _ => TypeTag::Bytes,
        };
        descriptor = descriptor.with_field(FieldSpec::new(*name, tag));
    }

    let validated = validate(descriptor).unwrap();
    let rendered = render(&validated);

    let outline = outline(rendered.text());
    assert_eq!(outline.value_fields, names);
}
