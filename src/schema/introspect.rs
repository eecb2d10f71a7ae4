//! One-shot schema introspection from INFORMATION_SCHEMA.

use crate::error::EngineError;
use crate::schema::links::{LinkOverrides, SchemaGraph};
use crate::schema::table::{TableInfo, TableLink};
use sqlx::MySqlPool;
use std::collections::HashMap;

/// Load every table's columns, primary key, and foreign-key edges for one
/// schema. Called once at startup; the result is immutable afterwards.
pub async fn load_schema(
    pool: &MySqlPool,
    dbname: &str,
    overrides: LinkOverrides,
) -> Result<SchemaGraph, EngineError> {
    let mut tables: HashMap<String, TableInfo> = HashMap::new();

    let column_sql = "SELECT table_name, column_name, data_type \
                      FROM INFORMATION_SCHEMA.COLUMNS WHERE table_schema = ?";
    tracing::debug!(sql = column_sql, "introspect columns");
    let columns: Vec<(String, String, String)> = sqlx::query_as(column_sql)
        .bind(dbname)
        .fetch_all(pool)
        .await?;
    for (table, column, data_type) in columns {
        tables
            .entry(table.clone())
            .or_insert_with(|| TableInfo::new(table))
            .column_types
            .insert(column, data_type);
    }

    let key_sql = "SELECT table_name, constraint_name, column_name, \
                   referenced_table_name, referenced_column_name \
                   FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE WHERE table_schema = ?";
    tracing::debug!(sql = key_sql, "introspect keys");
    let keys: Vec<(String, String, String, Option<String>, Option<String>)> =
        sqlx::query_as(key_sql).bind(dbname).fetch_all(pool).await?;
    for (table, constraint, column, ref_table, ref_column) in keys {
        let info = tables
            .entry(table.clone())
            .or_insert_with(|| TableInfo::new(table));
        if constraint == "PRIMARY" {
            // Composite keys keep the first column; list keys are single-column.
            if info.primary_key.is_none() {
                info.primary_key = Some(column);
            }
        } else if let (Some(other_table), Some(other_column)) = (ref_table, ref_column) {
            info.links.push(TableLink {
                column,
                other_table,
                other_column,
            });
        }
    }

    tracing::info!(tables = tables.len(), schema = dbname, "schema loaded");
    Ok(SchemaGraph::new(tables.into_values().collect(), overrides))
}
