//! Build the resolved catalog from in-memory config or from a DB config table.

use crate::catalog::resolved::{FieldCatalog, ResolvedAssociation, ResolvedModel};
use crate::catalog::types::*;
use crate::catalog::validator::validate;
use crate::error::{EngineError, PlanError};
use crate::plan::{Aggregate, DataKind, Fallback, FieldRef};
use crate::sql::{CmpOp, Expr};
use sqlx::MySqlPool;
use std::collections::HashMap;

/// Build the resolved catalog from full config (validates first).
pub fn resolve(config: &CatalogConfig) -> Result<FieldCatalog, PlanError> {
    validate(config)?;

    let mut models = HashMap::new();
    for m in &config.models {
        let mut associations = HashMap::new();
        for a in &m.associations {
            associations.insert(
                a.model.clone(),
                ResolvedAssociation {
                    table: a.table.clone(),
                    match_column: a.match_column.clone(),
                    clause: clause_expr(&a.clauses)?,
                },
            );
        }
        models.insert(
            m.name.clone(),
            ResolvedModel {
                name: m.name.clone(),
                table: m.table.clone(),
                key_column: m.key_column.clone().unwrap_or_else(|| "id".into()),
                default_sort: m.default_sort.clone(),
                search: m.search.clone(),
                batch_columns: m.batch_columns.clone(),
                associations,
            },
        );
    }

    let mut fields: HashMap<(String, ContextKind), Vec<FieldRef>> = HashMap::new();
    for f in &config.fields {
        fields
            .entry((f.model.clone(), f.context))
            .or_default()
            .push(field_ref(f)?);
    }

    Ok(FieldCatalog { models, fields })
}

fn field_ref(f: &FieldConfig) -> Result<FieldRef, PlanError> {
    let aggregate = match &f.group_method {
        Some(m) => Some(Aggregate::parse(m).ok_or_else(|| {
            PlanError::Catalog(format!("field '{}': unknown group method '{}'", f.name, m))
        })?),
        None => None,
    };
    let data_kind = match f.data_type.as_deref() {
        Some("numeric") => DataKind::Numeric,
        _ => DataKind::Category,
    };
    let fallback = match (&f.null_table, &f.null_column, &f.null_count_column) {
        (Some(table), Some(value), Some(count)) => Some(Fallback {
            table: table.clone(),
            value_column: value.clone(),
            count_column: count.clone(),
            where_clause: clause_expr(&f.null_where)?,
        }),
        _ => None,
    };
    Ok(FieldRef {
        name: f.name.clone(),
        table: f.table.clone(),
        column: f.column.clone(),
        alias: f.alias.clone().unwrap_or_default(),
        select: f.select.clone().map(Expr::Template),
        join_clause: clause_expr(&f.where_)?,
        aggregate,
        needs_distinct: f.needs_distinct,
        data_kind,
        bin_size: f.bin_size.unwrap_or(1.0),
        log_scale: f.log,
        values_delimited: f.values_delimited,
        fallback,
        allowed_values: Vec::new(),
        from_filter_subquery: false,
        order: f.order,
        is_default: f.is_default,
    })
}

/// Structured clause config -> expression tree, composed before any alias
/// is assigned so re-aliased copies of a table stay correct.
pub fn clause_expr(clauses: &[ClauseConfig]) -> Result<Option<Expr>, PlanError> {
    if clauses.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::with_capacity(clauses.len());
    for c in clauses {
        parts.push(one_clause(c)?);
    }
    Ok(Some(if parts.len() == 1 {
        parts.remove(0)
    } else {
        Expr::And(parts)
    }))
}

fn one_clause(c: &ClauseConfig) -> Result<Expr, PlanError> {
    let col = Expr::col(c.column.clone());
    if c.op == "not_null" {
        return Ok(Expr::NotNull(Box::new(col)));
    }
    if c.op == "in" {
        let values = match &c.value {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => Ok(s.clone()),
                    other => Ok(other.to_string()),
                })
                .collect::<Result<Vec<_>, PlanError>>()?,
            _ => {
                return Err(PlanError::Catalog(format!(
                    "clause on '{}': op 'in' needs an array value",
                    c.column
                )))
            }
        };
        return Ok(Expr::InList {
            expr: Box::new(col),
            values,
        });
    }
    let op = match c.op.as_str() {
        "eq" => CmpOp::Eq,
        "ne" => CmpOp::Ne,
        "gt" => CmpOp::Gt,
        "ge" => CmpOp::Ge,
        "lt" => CmpOp::Lt,
        "le" => CmpOp::Le,
        other => {
            return Err(PlanError::Catalog(format!(
                "clause on '{}': unknown op '{}'",
                c.column, other
            )))
        }
    };
    let value = match &c.value {
        Some(serde_json::Value::String(s)) => Expr::Str(s.clone()),
        Some(serde_json::Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Expr::Int(i)
            } else {
                Expr::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Some(serde_json::Value::Bool(b)) => Expr::Int(*b as i64),
        _ => {
            return Err(PlanError::Catalog(format!(
                "clause on '{}' needs a scalar value",
                c.column
            )))
        }
    };
    Ok(Expr::cmp(col, op, value))
}

/// One row of the catalog config table.
#[derive(serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum CatalogRow {
    Model(ModelConfig),
    Field(FieldConfig),
}

/// Load catalog config from a table of JSON payloads
/// (`id, payload` — payload carries a `kind` discriminator).
pub async fn load_from_pool(pool: &MySqlPool, table: &str) -> Result<CatalogConfig, EngineError> {
    let sql = format!("SELECT payload FROM {} ORDER BY id", crate::sql::quoted(table));
    tracing::debug!(sql = %sql, "load catalog");
    let rows: Vec<serde_json::Value> = sqlx::query_scalar(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| EngineError::Config(e.to_string()))?;

    let mut config = CatalogConfig::default();
    for row in rows {
        match serde_json::from_value::<CatalogRow>(row).map_err(|e| EngineError::Config(e.to_string()))? {
            CatalogRow::Model(m) => config.models.push(m),
            CatalogRow::Field(f) => config.fields.push(f),
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clauses_become_structured_exprs() {
        let clauses = vec![
            ClauseConfig {
                column: "itype".into(),
                op: "eq".into(),
                value: Some(serde_json::json!("Ab Count")),
            },
            ClauseConfig {
                column: "integer_value".into(),
                op: "not_null".into(),
                value: None,
            },
        ];
        let expr = clause_expr(&clauses).unwrap().unwrap();
        let r = expr.render("tdl_info1");
        assert_eq!(
            r.sql,
            "`tdl_info1`.`itype` = ? AND `tdl_info1`.`integer_value` IS NOT NULL"
        );
    }

    #[test]
    fn field_config_resolves_to_descriptor() {
        let f = FieldConfig {
            model: "Target".into(),
            context: ContextKind::Facet,
            name: "Ab Count".into(),
            description: None,
            table: "tdl_info".into(),
            column: "integer_value".into(),
            alias: None,
            select: None,
            where_: vec![ClauseConfig {
                column: "itype".into(),
                op: "eq".into(),
                value: Some(serde_json::json!("Ab Count")),
            }],
            group_method: None,
            needs_distinct: false,
            data_type: Some("numeric".into()),
            bin_size: Some(10.0),
            log: false,
            values_delimited: false,
            null_table: None,
            null_column: None,
            null_count_column: None,
            null_where: vec![],
            order: 3,
            is_default: false,
        };
        let field = field_ref(&f).unwrap();
        assert_eq!(field.data_kind, DataKind::Numeric);
        assert_eq!(field.bin_size, 10.0);
        assert!(field.join_clause.is_some());
        assert_eq!(field.output_name(), "integer_value");
    }

    #[test]
    fn catalog_rows_deserialize_by_kind() {
        let model: CatalogRow = serde_json::from_value(serde_json::json!({
            "kind": "model",
            "name": "Target",
            "table": "protein",
            "batch_columns": ["uniprot", "sym"]
        }))
        .unwrap();
        assert!(matches!(model, CatalogRow::Model(_)));

        let field: CatalogRow = serde_json::from_value(serde_json::json!({
            "kind": "field",
            "model": "Target",
            "context": "facet",
            "name": "Family",
            "table": "target",
            "column": "fam"
        }))
        .unwrap();
        assert!(matches!(field, CatalogRow::Field(_)));
    }
}
