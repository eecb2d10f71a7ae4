//! Per-table metadata gathered once at startup.

use std::collections::HashMap;

/// One outgoing foreign-key edge: our column references other_table.other_column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableLink {
    pub column: String,
    pub other_table: String,
    pub other_column: String,
}

/// The column pair joining two tables, oriented from the left table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkInfo {
    pub from_column: String,
    pub to_column: String,
}

impl LinkInfo {
    pub fn new(from_column: impl Into<String>, to_column: impl Into<String>) -> Self {
        LinkInfo {
            from_column: from_column.into(),
            to_column: to_column.into(),
        }
    }

    pub fn reversed(&self) -> LinkInfo {
        LinkInfo {
            from_column: self.to_column.clone(),
            to_column: self.from_column.clone(),
        }
    }
}

/// Introspected table: primary key (not every table has one), column types
/// for numeric-vs-lexical decisions, outgoing foreign-key edges.
#[derive(Clone, Debug, Default)]
pub struct TableInfo {
    pub name: String,
    pub primary_key: Option<String>,
    pub column_types: HashMap<String, String>,
    pub links: Vec<TableLink>,
}

const NUMERIC_TYPES: &[&str] = &[
    "bigint", "int", "integer", "tinyint", "smallint", "mediumint", "decimal", "double", "float",
];

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        TableInfo {
            name: name.into(),
            ..Default::default()
        }
    }

    /// None when the column is unknown to this table.
    pub fn column_is_numeric(&self, column: &str) -> Option<bool> {
        self.column_types
            .get(column)
            .map(|t| NUMERIC_TYPES.contains(&t.to_lowercase().as_str()))
    }
}
