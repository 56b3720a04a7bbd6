use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::relation_id::RelationId;

/// A foreign key from a source (child) relation to a target (parent) relation.
///
/// Component order is the order the database reported: component N's source
/// field pairs with component N's target field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub source_relation_id: RelationId,
    pub target_relation_id: RelationId,
    pub components: Vec<ForeignKeyComponent>,
}

/// One column pair of a (possibly composite) foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyComponent {
    pub foreign_key_field_name: String,
    pub primary_key_field_name: String,
}

impl ForeignKeyComponent {
    pub fn new(foreign_key_field_name: impl Into<String>, primary_key_field_name: impl Into<String>) -> Self {
        Self {
            foreign_key_field_name: foreign_key_field_name.into(),
            primary_key_field_name: primary_key_field_name.into(),
        }
    }
}

/// Which side of each `=` clause the source relation's field is written on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EquationStyle {
    #[default]
    SourceOnLeftHandSide,
    TargetOnLeftHandSide,
}

impl ForeignKey {
    pub fn new(
        source_relation_id: RelationId,
        target_relation_id: RelationId,
        components: Vec<ForeignKeyComponent>,
    ) -> Self {
        Self {
            source_relation_id,
            target_relation_id,
            components,
        }
    }

    pub fn source_field_names(&self) -> Vec<&str> {
        self.components
            .iter()
            .map(|c| c.foreign_key_field_name.as_str())
            .collect()
    }

    pub fn target_field_names(&self) -> Vec<&str> {
        self.components
            .iter()
            .map(|c| c.primary_key_field_name.as_str())
            .collect()
    }

    /// True if the source field names, as a set, are exactly `names`.
    /// `names` must already be normalized.
    pub fn source_field_names_set_equals(&self, names: &BTreeSet<String>) -> bool {
        if self.components.len() != names.len() {
            return false;
        }
        let own: BTreeSet<&str> = self
            .components
            .iter()
            .map(|c| c.foreign_key_field_name.as_str())
            .collect();
        own.len() == names.len() && names.iter().all(|n| own.contains(n.as_str()))
    }

    /// Render the key as a join condition, e.g. `o.customer_id = c.id and ...`.
    ///
    /// An absent or empty alias writes the bare field name.
    pub fn as_equation(
        &self,
        source_alias: Option<&str>,
        target_alias: Option<&str>,
        style: EquationStyle,
    ) -> String {
        let source_first = style == EquationStyle::SourceOnLeftHandSide;

        self.components
            .iter()
            .map(|comp| {
                let source = qualify(source_alias, &comp.foreign_key_field_name);
                let target = qualify(target_alias, &comp.primary_key_field_name);
                if source_first {
                    format!("{} = {}", source, target)
                } else {
                    format!("{} = {}", target, source)
                }
            })
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

/// Prefix `name` with `alias.` when an alias is given.
pub(crate) fn qualify(alias: Option<&str>, name: &str) -> String {
    match alias {
        Some(alias) if !alias.is_empty() => format!("{}.{}", alias, name),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite_fk() -> ForeignKey {
        ForeignKey::new(
            RelationId::new(None, None, "order_lines"),
            RelationId::new(None, None, "orders"),
            vec![
                ForeignKeyComponent::new("order_region", "region"),
                ForeignKeyComponent::new("order_no", "no"),
            ],
        )
    }

    #[test]
    fn test_equation_source_first() {
        assert_eq!(
            composite_fk().as_equation(Some("ol"), Some("o"), EquationStyle::SourceOnLeftHandSide),
            "ol.order_region = o.region and ol.order_no = o.no"
        );
    }

    #[test]
    fn test_equation_target_first() {
        assert_eq!(
            composite_fk().as_equation(Some("ol"), Some("o"), EquationStyle::TargetOnLeftHandSide),
            "o.region = ol.order_region and o.no = ol.order_no"
        );
    }

    #[test]
    fn test_equation_without_aliases() {
        assert_eq!(
            composite_fk().as_equation(None, Some(""), EquationStyle::SourceOnLeftHandSide),
            "order_region = region and order_no = no"
        );
    }

    #[test]
    fn test_field_set_equality_is_exact() {
        let fk = composite_fk();
        let exact: BTreeSet<String> = ["order_no", "order_region"].iter().map(|s| s.to_string()).collect();
        let subset: BTreeSet<String> = ["order_no"].iter().map(|s| s.to_string()).collect();
        let superset: BTreeSet<String> = ["order_no", "order_region", "x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(fk.source_field_names_set_equals(&exact));
        assert!(!fk.source_field_names_set_equals(&subset));
        assert!(!fk.source_field_names_set_equals(&superset));
    }

    #[test]
    fn test_field_name_projections_keep_component_order() {
        let fk = composite_fk();
        assert_eq!(fk.source_field_names(), vec!["order_region", "order_no"]);
        assert_eq!(fk.target_field_names(), vec!["region", "no"]);
    }
}
