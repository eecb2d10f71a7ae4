//! Catalog validation: referential integrity and per-context uniqueness.

use crate::catalog::types::{CatalogConfig, ClauseConfig};
use crate::error::PlanError;
use crate::plan::Aggregate;
use std::collections::HashSet;

const CLAUSE_OPS: &[&str] = &["eq", "ne", "gt", "ge", "lt", "le", "in", "not_null"];

pub fn validate(config: &CatalogConfig) -> Result<(), PlanError> {
    let mut model_names = HashSet::new();
    for m in &config.models {
        if !model_names.insert(m.name.as_str()) {
            return Err(PlanError::Catalog(format!("duplicate model '{}'", m.name)));
        }
    }
    for m in &config.models {
        for assoc in &m.associations {
            if !model_names.contains(assoc.model.as_str()) {
                return Err(PlanError::Catalog(format!(
                    "model '{}': association references unknown model '{}'",
                    m.name, assoc.model
                )));
            }
            validate_clauses(&assoc.clauses, &m.name)?;
        }
    }

    let mut seen = HashSet::new();
    for f in &config.fields {
        if !model_names.contains(f.model.as_str()) {
            return Err(PlanError::Catalog(format!(
                "field '{}' references unknown model '{}'",
                f.name, f.model
            )));
        }
        if !seen.insert((f.model.as_str(), f.context, f.name.as_str())) {
            return Err(PlanError::Catalog(format!(
                "duplicate field '{}' for model '{}'",
                f.name, f.model
            )));
        }
        if f.table.is_empty() || f.column.is_empty() {
            return Err(PlanError::Catalog(format!(
                "field '{}' needs both table and column",
                f.name
            )));
        }
        if let Some(method) = &f.group_method {
            if Aggregate::parse(method).is_none() {
                return Err(PlanError::Catalog(format!(
                    "field '{}': unknown group method '{}'",
                    f.name, method
                )));
            }
        }
        if let Some(kind) = &f.data_type {
            if kind != "category" && kind != "numeric" {
                return Err(PlanError::Catalog(format!(
                    "field '{}': data type must be category or numeric, got '{}'",
                    f.name, kind
                )));
            }
        }
        if let Some(bin) = f.bin_size {
            if bin <= 0.0 {
                return Err(PlanError::Catalog(format!(
                    "field '{}': bin size must be positive",
                    f.name
                )));
            }
        }
        // A fallback needs all three parts to be usable.
        let fallback_parts = [&f.null_table, &f.null_column, &f.null_count_column];
        let present = fallback_parts.iter().filter(|p| p.is_some()).count();
        if present != 0 && present != 3 {
            return Err(PlanError::Catalog(format!(
                "field '{}': precomputed fallback needs null_table, null_column, and null_count_column",
                f.name
            )));
        }
        validate_clauses(&f.where_, &f.name)?;
        validate_clauses(&f.null_where, &f.name)?;
    }
    Ok(())
}

fn validate_clauses(clauses: &[ClauseConfig], owner: &str) -> Result<(), PlanError> {
    for c in clauses {
        if !CLAUSE_OPS.contains(&c.op.as_str()) {
            return Err(PlanError::Catalog(format!(
                "'{}': unknown clause op '{}'",
                owner, c.op
            )));
        }
        if c.op != "not_null" && c.value.is_none() {
            return Err(PlanError::Catalog(format!(
                "'{}': clause on '{}' needs a value",
                owner, c.column
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::*;

    fn minimal() -> CatalogConfig {
        CatalogConfig {
            models: vec![ModelConfig {
                name: "Target".into(),
                table: "protein".into(),
                key_column: None,
                default_sort: vec![],
                search: None,
                batch_columns: vec![],
                associations: vec![],
            }],
            fields: vec![FieldConfig {
                model: "Target".into(),
                context: ContextKind::Facet,
                name: "Family".into(),
                description: None,
                table: "target".into(),
                column: "fam".into(),
                alias: None,
                select: None,
                where_: vec![],
                group_method: None,
                needs_distinct: false,
                data_type: None,
                bin_size: None,
                log: false,
                values_delimited: false,
                null_table: None,
                null_column: None,
                null_count_column: None,
                null_where: vec![],
                order: 1,
                is_default: true,
            }],
        }
    }

    #[test]
    fn minimal_config_validates() {
        assert!(validate(&minimal()).is_ok());
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut c = minimal();
        c.fields.push(c.fields[0].clone());
        assert!(validate(&c).is_err());
    }

    #[test]
    fn unknown_model_rejected() {
        let mut c = minimal();
        c.fields[0].model = "Nope".into();
        assert!(validate(&c).is_err());
    }

    #[test]
    fn partial_fallback_rejected() {
        let mut c = minimal();
        c.fields[0].null_table = Some("ncats_facet_counts".into());
        assert!(validate(&c).is_err());
    }

    #[test]
    fn bad_group_method_rejected() {
        let mut c = minimal();
        c.fields[0].group_method = Some("median".into());
        assert!(validate(&c).is_err());
    }
}
