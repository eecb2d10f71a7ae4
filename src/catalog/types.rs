//! Raw catalog config types matching the JSON payloads.

use serde::{Deserialize, Serialize};

/// Where a field is used: display list, facet breakdown, or bulk download.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    List,
    Facet,
    Download,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SortConfig {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Free-text search: a fulltext match over the configured columns, joined in
/// as a scored subquery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    pub table: String,
    pub columns: Vec<String>,
    /// Column of `table` that carries the root-entity key.
    pub key_column: String,
}

/// One structured boolean condition; a field's where-clause is the AND of
/// its conditions. Columns are resolved against the owning table-usage's
/// alias at render time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClauseConfig {
    pub column: String,
    #[serde(default = "default_op")]
    pub op: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

fn default_op() -> String {
    "eq".into()
}

/// Scope a list to entities associated with one value of another model,
/// e.g. "targets associated with disease D".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationConfig {
    /// The associated model's name (for request routing).
    pub model: String,
    /// Table holding the association rows.
    pub table: String,
    /// Column of `table` matched against the request's associated value.
    pub match_column: String,
    #[serde(default)]
    pub clauses: Vec<ClauseConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub table: String,
    /// Defaults to the introspected primary key (`id` when absent).
    #[serde(default)]
    pub key_column: Option<String>,
    #[serde(default)]
    pub default_sort: Vec<SortConfig>,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    /// Natural-key columns a batch request may match (any of them).
    #[serde(default)]
    pub batch_columns: Vec<String>,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub model: String,
    pub context: ContextKind,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub alias: Option<String>,
    /// Raw select template; `{t}` expands to the owning table alias.
    #[serde(default)]
    pub select: Option<String>,
    #[serde(default, rename = "where")]
    pub where_: Vec<ClauseConfig>,
    #[serde(default)]
    pub group_method: Option<String>,
    #[serde(default)]
    pub needs_distinct: bool,
    /// "category" (default) or "numeric".
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub bin_size: Option<f64>,
    #[serde(default)]
    pub log: bool,
    #[serde(default)]
    pub values_delimited: bool,
    /// Precomputed-count fallback, used only for unfiltered requests.
    #[serde(default)]
    pub null_table: Option<String>,
    #[serde(default)]
    pub null_column: Option<String>,
    #[serde(default)]
    pub null_count_column: Option<String>,
    #[serde(default)]
    pub null_where: Vec<ClauseConfig>,
    /// Display order; only fields with order > 0 appear by default.
    #[serde(default)]
    pub order: i32,
    #[serde(default, rename = "default")]
    pub is_default: bool,
}

/// Everything the catalog needs, in one struct for in-memory loading.
#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    pub models: Vec<ModelConfig>,
    pub fields: Vec<FieldConfig>,
}
