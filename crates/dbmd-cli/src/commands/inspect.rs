use anyhow::{Context, Result};
use comfy_table::{Cell, Table as ComfyTable};

use dbmd_core::error::DbmdError;
use dbmd_core::model::{EquationStyle, Field, ForeignKey, SchemaModel};
use dbmd_core::output::read_document;

use crate::args::InspectArgs;

pub async fn run(args: &InspectArgs) -> Result<()> {
    let model = read_document(&args.document, args.format.map(Into::into))
        .with_context(|| format!("Failed to read {}", args.document.display()))?;

    match &args.relation {
        Some(relation) => print_relation(&model, relation)?,
        None => print_summary(&model),
    }

    Ok(())
}

fn print_header(model: &SchemaModel) {
    let dbms = model.dbms();
    println!(
        "Database: {} {}  Schema: {}  Identifiers: {}",
        dbms.name.as_deref().unwrap_or("unknown"),
        dbms.version.as_deref().unwrap_or(""),
        model.requested_schema().unwrap_or("<any>"),
        model.case_sensitivity()
    );
    println!(
        "Relations: {}  Fields: {}  Foreign Keys: {}",
        model.relation_count(),
        model.field_count(),
        model.foreign_key_count()
    );
    println!();
}

fn print_summary(model: &SchemaModel) {
    print_header(model);

    let mut t = ComfyTable::new();
    t.set_header(vec!["Relation", "Type", "Fields", "Primary Key", "Parents", "Children"]);

    for rel in model.relation_metadatas() {
        let id = &rel.relation_id;
        t.add_row(vec![
            Cell::new(id),
            Cell::new(rel.relation_type),
            Cell::new(rel.fields.len()),
            Cell::new(rel.primary_key_field_names(None).join(", ")),
            Cell::new(model.foreign_keys_to_parents_from(id).len()),
            Cell::new(model.foreign_keys_from_children_to(id).len()),
        ]);
    }

    println!("{}", t);
}

fn print_relation(model: &SchemaModel, relation: &str) -> Result<()> {
    let id = model.relation_id_from_qualified(relation);
    let rel = model
        .relation_metadata(&id)
        .ok_or_else(|| DbmdError::RelationNotFound {
            relation: id.id_string(),
        })?;

    print_header(model);
    println!("━━━ {} ({}) ━━━", id, rel.relation_type);
    if let Some(comment) = &rel.comment {
        println!("{}", comment);
    }

    let mut t = ComfyTable::new();
    t.set_header(vec!["Field", "Type", "Database Type", "Size", "Nullable", "PK", "Comment"]);
    for field in &rel.fields {
        t.add_row(vec![
            Cell::new(&field.name),
            Cell::new(field.type_name()),
            Cell::new(&field.database_type),
            Cell::new(size_text(field)),
            Cell::new(match field.nullable {
                Some(true) => "YES",
                Some(false) => "NO",
                None => "?",
            }),
            Cell::new(
                field
                    .primary_key_part_number
                    .map(|n| n.to_string())
                    .unwrap_or_default(),
            ),
            Cell::new(field.comment.as_deref().unwrap_or("")),
        ]);
    }
    println!("{}", t);

    let parents = model.foreign_keys_to_parents_from(&id);
    if !parents.is_empty() {
        println!();
        println!("References:");
        for fk in parents {
            println!("  → {}  on {}", fk.target_relation_id, join_text(fk));
        }
    }

    let children = model.foreign_keys_from_children_to(&id);
    if !children.is_empty() {
        println!();
        println!("Referenced by:");
        for fk in children {
            println!("  ← {}  on {}", fk.source_relation_id, join_text(fk));
        }
    }

    let multi_parents = model.multiply_referenced_parent_tables_for_child(&id);
    let multi_children = model.multiply_referencing_child_tables_for_parent(&id);
    if !multi_parents.is_empty() || !multi_children.is_empty() {
        println!();
        println!("Joins need explicit key fields (multiple foreign keys):");
        for other in multi_parents.iter().chain(multi_children.iter()) {
            println!("  ⚠ {}", other);
        }
    }

    Ok(())
}

fn size_text(field: &Field) -> String {
    match (field.length, field.precision, field.fractional_digits) {
        (Some(len), _, _) => len.to_string(),
        (None, Some(p), Some(s)) if s != 0 => format!("{},{}", p, s),
        (None, Some(p), _) => p.to_string(),
        _ => String::new(),
    }
}

/// Join condition for a key, aliasing source `c` and target `p`.
fn join_text(fk: &ForeignKey) -> String {
    fk.as_equation(Some("c"), Some("p"), EquationStyle::SourceOnLeftHandSide)
}
