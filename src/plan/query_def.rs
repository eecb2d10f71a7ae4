//! Query definition builder: which tables to join, exactly once each, unless
//! a field demands a differently-constrained copy of the same table.

use crate::error::PlanError;
use crate::plan::field::{DataKind, FieldRef};
use crate::schema::SchemaGraph;
use crate::sql::{qualified, quoted, JoinKind, Rendered, SelectBuilder};
use std::collections::HashSet;

/// One occurrence of a table within a composed query, identified by its
/// join-qualifying clause. Aliases are unique within a definition.
#[derive(Clone, Debug)]
pub struct TableUsage {
    pub table: String,
    pub alias: String,
    pub join_clause: Option<crate::sql::Expr>,
    pub fields: Vec<FieldRef>,
}

/// Ordered set of table-usages, built by repeated `add_field` calls. The root
/// usage is synthesized up front so joins always have an anchor.
pub struct QueryDef<'a> {
    graph: &'a SchemaGraph,
    root_table: String,
    usages: Vec<TableUsage>,
}

impl<'a> QueryDef<'a> {
    pub fn new(graph: &'a SchemaGraph, root_table: impl Into<String>) -> Self {
        let root_table = root_table.into();
        QueryDef {
            graph,
            usages: vec![TableUsage {
                table: root_table.clone(),
                alias: root_table.clone(),
                join_clause: None,
                fields: Vec::new(),
            }],
            root_table,
        }
    }

    pub fn from_fields(
        graph: &'a SchemaGraph,
        root_table: impl Into<String>,
        fields: Vec<FieldRef>,
    ) -> Self {
        let mut def = QueryDef::new(graph, root_table);
        for field in fields {
            def.add_field(field);
        }
        def
    }

    pub fn root_table(&self) -> &str {
        &self.root_table
    }

    pub fn root_key(&self) -> String {
        self.graph.primary_key(&self.root_table)
    }

    pub fn usages(&self) -> &[TableUsage] {
        &self.usages
    }

    /// Locate a usage matching (table, clause) and append; otherwise open a
    /// new usage. A second copy of a table under a different clause gets a
    /// counter-suffixed alias; its expressions re-bind to that alias at
    /// render time, so no text rewriting happens here.
    pub fn add_field(&mut self, field: FieldRef) {
        if let Some(usage) = self
            .usages
            .iter_mut()
            .find(|u| u.table == field.table && u.join_clause == field.join_clause)
        {
            usage.fields.push(field);
            return;
        }
        let copies = self
            .usages
            .iter()
            .filter(|u| u.table == field.table)
            .count();
        let alias = if copies > 0 {
            format!("{}{}", field.table, copies)
        } else {
            field.table.clone()
        };
        self.usages.push(TableUsage {
            table: field.table.clone(),
            alias,
            join_clause: field.join_clause.clone(),
            fields: vec![field],
        });
    }

    /// Alias assigned to the usage matching (table, clause), if present.
    pub fn alias_of(&self, table: &str, clause: &Option<crate::sql::Expr>) -> Option<&str> {
        self.usages
            .iter()
            .find(|u| u.table == table && &u.join_clause == clause)
            .map(|u| u.alias.as_str())
    }

    pub fn has_grouped_fields(&self) -> bool {
        self.usages
            .iter()
            .any(|u| u.fields.iter().any(|f| f.aggregate.is_some()))
    }

    /// Aggregates are per-entity: group by the root table's primary key.
    pub fn apply_default_grouping(&self, builder: &mut SelectBuilder) {
        if self.has_grouped_fields() {
            builder.group_by(qualified(&self.root_table, &self.root_key()));
        }
    }

    fn is_root_usage(&self, usage: &TableUsage) -> bool {
        usage.table == self.root_table && usage.alias == self.root_table
    }

    /// Emit select list and join chain. INNER joins when building a
    /// facet-constraint query (rows lacking a match must vanish from counts),
    /// LEFT otherwise (extra columns must not prune rows).
    pub fn build(&self, for_facet_join: bool) -> Result<SelectBuilder, PlanError> {
        let mut builder = SelectBuilder::new(quoted(&self.root_table));

        for usage in &self.usages {
            for field in &usage.fields {
                builder.select(self.render_select(usage, field));
            }
        }

        // Joined tables tracked by alias so each appears exactly once.
        let mut joined: HashSet<String> = HashSet::new();
        joined.insert(self.root_table.clone());

        for usage in &self.usages {
            if self.is_root_usage(usage) {
                continue;
            }
            if usage.fields.iter().all(|f| f.from_filter_subquery) && !usage.fields.is_empty() {
                // Resolved against the joined filter subquery, never joined here.
                continue;
            }
            let kind = if for_facet_join {
                JoinKind::Inner
            } else {
                JoinKind::Left
            };

            // Intermediate tables first, each linked to the previous one.
            let mut left = self.root_table.clone();
            for hop in self.graph.required_hops(&self.root_table, &usage.table) {
                if !joined.contains(&hop) {
                    let link = self.graph.resolve_link(&left, &hop)?;
                    builder.join(
                        kind,
                        Rendered::raw(quoted(&hop)),
                        Rendered::raw(format!(
                            "{} = {}",
                            qualified(&left, &link.from_column),
                            qualified(&hop, &link.to_column)
                        )),
                    );
                    joined.insert(hop.clone());
                }
                left = hop;
            }

            if joined.contains(&usage.alias) {
                continue;
            }
            let link = self.graph.resolve_link(&left, &usage.table)?;
            let mut on = Rendered::default();
            // A same-table copy that only differs by clause joins on the
            // clause alone; everything else joins on the resolved link.
            if left != usage.table || usage.join_clause.is_none() {
                on.push(&format!(
                    "{} = {}",
                    qualified(&left, &link.from_column),
                    qualified(&usage.alias, &link.to_column)
                ));
            }
            if let Some(clause) = &usage.join_clause {
                if !on.sql.is_empty() {
                    on.push(" AND ");
                }
                on.append(clause.render(&usage.alias));
            }
            let table_ref = if usage.alias == usage.table {
                quoted(&usage.table)
            } else {
                format!("{} AS {}", quoted(&usage.table), quoted(&usage.alias))
            };
            builder.join(kind, Rendered::raw(table_ref), on);
            joined.insert(usage.alias.clone());
        }

        Ok(builder)
    }

    fn render_select(&self, usage: &TableUsage, field: &FieldRef) -> Rendered {
        let alias = if field.from_filter_subquery {
            "filterQuery"
        } else {
            usage.alias.as_str()
        };
        let inner = field.select_expr().render(alias);
        let sql = match field.aggregate {
            // The original engine's rule: category aggregates deduplicate,
            // numeric aggregates keep every row.
            Some(agg) if field.data_kind == DataKind::Numeric => {
                format!("{}({})", agg.sql(), inner.sql)
            }
            Some(agg) => format!("{}(distinct {})", agg.sql(), inner.sql),
            None if field.needs_distinct => format!("distinct {}", inner.sql),
            None => inner.sql.clone(),
        };
        Rendered {
            sql: format!("{} AS {}", sql, quoted(field.output_name())),
            params: inner.params,
        }
    }
}
