//! The link graph: how any two tables connect, with operator overrides.

use crate::error::PlanError;
use crate::schema::table::{LinkInfo, TableInfo};
use std::collections::HashMap;

/// A business-logic link between two tables that have no declared foreign key.
#[derive(Clone, Debug)]
pub struct LinkOverride {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// Operator-maintained link configuration: non-standard links, preferred
/// edges when a table pair has several foreign keys, and explicit ordered
/// intermediate-table chains for pairs with no direct edge.
#[derive(Clone, Debug, Default)]
pub struct LinkOverrides {
    pub links: Vec<LinkOverride>,
    /// (from, to) -> local column of the edge to prefer.
    pub preferred: HashMap<(String, String), String>,
    /// (from, to) -> ordered intermediate tables (excluding both endpoints).
    pub multi_hop: HashMap<(String, String), Vec<String>>,
}

/// Read-only view of the introspected schema plus link overrides. Built once
/// at startup; shared by every request afterwards.
#[derive(Clone, Debug, Default)]
pub struct SchemaGraph {
    tables: HashMap<String, TableInfo>,
    overrides: LinkOverrides,
}

impl SchemaGraph {
    pub fn new(tables: Vec<TableInfo>, overrides: LinkOverrides) -> Self {
        SchemaGraph {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
            overrides,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    /// Tables without an introspected PRIMARY constraint fall back to `id`.
    pub fn primary_key(&self, table: &str) -> String {
        self.tables
            .get(table)
            .and_then(|t| t.primary_key.clone())
            .unwrap_or_else(|| "id".to_string())
    }

    /// None when either the table or the column is unknown.
    pub fn column_is_numeric(&self, table: &str, column: &str) -> Option<bool> {
        self.tables.get(table)?.column_is_numeric(column)
    }

    /// Resolve the single-hop column pair joining `from` to `to`.
    ///
    /// Order: override map (exact, then reversed with columns swapped);
    /// self-join on the primary key; a forward foreign-key edge, with the
    /// preferred edge breaking ties; the reversed edge with columns swapped.
    /// Failure is a configuration error, never retried.
    pub fn resolve_link(&self, from: &str, to: &str) -> Result<LinkInfo, PlanError> {
        if let Some(link) = self.override_link(from, to) {
            return Ok(link);
        }
        if from == to {
            let pk = self.primary_key(from);
            return Ok(LinkInfo::new(pk.clone(), pk));
        }
        if let Some(link) = self.edge_link(from, to) {
            return Ok(link);
        }
        if let Some(link) = self.edge_link(to, from) {
            return Ok(link.reversed());
        }
        Err(PlanError::NoLink {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Explicit ordered intermediate tables for pairs with no direct edge.
    /// Empty when the pair joins directly. A chain registered for (a, b)
    /// answers (b, a) reversed.
    pub fn required_hops(&self, from: &str, to: &str) -> Vec<String> {
        let key = (from.to_string(), to.to_string());
        if let Some(hops) = self.overrides.multi_hop.get(&key) {
            return hops.clone();
        }
        let reversed = (to.to_string(), from.to_string());
        if let Some(hops) = self.overrides.multi_hop.get(&reversed) {
            let mut hops = hops.clone();
            hops.reverse();
            return hops;
        }
        Vec::new()
    }

    fn override_link(&self, from: &str, to: &str) -> Option<LinkInfo> {
        for ov in &self.overrides.links {
            if ov.from_table == from && ov.to_table == to {
                return Some(LinkInfo::new(ov.from_column.clone(), ov.to_column.clone()));
            }
            if ov.from_table == to && ov.to_table == from {
                return Some(LinkInfo::new(ov.to_column.clone(), ov.from_column.clone()));
            }
        }
        None
    }

    fn edge_link(&self, from: &str, to: &str) -> Option<LinkInfo> {
        let table = self.tables.get(from)?;
        let mut edges: Vec<_> = table.links.iter().filter(|l| l.other_table == to).collect();
        if edges.len() > 1 {
            let key = (from.to_string(), to.to_string());
            if let Some(preferred) = self.overrides.preferred.get(&key) {
                edges.retain(|l| &l.column == preferred);
            }
        }
        edges
            .first()
            .map(|l| LinkInfo::new(l.column.clone(), l.other_column.clone()))
    }
}
