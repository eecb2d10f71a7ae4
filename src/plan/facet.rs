//! Facet queries: value → count breakdowns, and the constraint subqueries
//! that implement cross-filtering.

use crate::error::PlanError;
use crate::plan::field::{Aggregate, DataKind, FieldRef};
use crate::plan::query_def::QueryDef;
use crate::schema::SchemaGraph;
use crate::sql::{qualified, quoted, Expr, Rendered, SelectBuilder, SqlParam, SqlQuery};

/// Everything a facet builder needs from the owning list request, passed
/// explicitly instead of reaching back through an owner pointer.
#[derive(Clone, Copy, Debug)]
pub struct FilterContext<'a> {
    pub root_table: &'a str,
    pub key_column: &'a str,
    /// Facets currently filtering the list.
    pub filtering_facets: &'a [FieldRef],
    /// True when the request carries no term, batch, association, or filter.
    pub is_null: bool,
    /// Model-level narrowing (term match, association scope) as root-key
    /// IN-subqueries.
    pub extra_constraints: &'a [SqlQuery],
    /// Model-level narrowing rendered against the root alias (batch
    /// membership).
    pub extra_where: &'a [Rendered],
}

impl<'a> FilterContext<'a> {
    pub fn new(
        root_table: &'a str,
        key_column: &'a str,
        filtering_facets: &'a [FieldRef],
        is_null: bool,
    ) -> Self {
        FilterContext {
            root_table,
            key_column,
            filtering_facets,
            is_null,
            extra_constraints: &[],
            extra_where: &[],
        }
    }
}

/// A planned facet query plus what the executor needs to interpret its rows.
#[derive(Clone, Debug)]
pub struct FacetQueryPlan {
    pub facet: String,
    pub query: SqlQuery,
    pub data_kind: DataKind,
    pub values_delimited: bool,
    pub used_fallback: bool,
}

/// Count-distinct of the root key, aliased `value`.
fn count_field(ctx: &FilterContext) -> FieldRef {
    FieldRef {
        aggregate: Some(Aggregate::Count),
        alias: "value".into(),
        ..FieldRef::column_ref(ctx.root_table, ctx.key_column)
    }
}

/// Build the "value → count" query for one facet. Every *other* active facet
/// narrows the counts; the facet's own filter is left out by the caller
/// passing it in `filtering_facets` and naming it via `facet.name` (the
/// ignore-self rule lives in `apply_facet_constraints`).
pub fn facet_query(
    graph: &SchemaGraph,
    facet: &FieldRef,
    ctx: &FilterContext,
) -> Result<FacetQueryPlan, PlanError> {
    if facet.table.is_empty() {
        return Err(PlanError::Catalog(format!(
            "facet '{}' has no source table",
            facet.name
        )));
    }
    if ctx.is_null && facet.fallback.is_some() {
        return precomputed_facet_query(facet);
    }
    match facet.data_kind {
        DataKind::Numeric => numeric_facet_query(graph, facet, ctx),
        DataKind::Category => standard_facet_query(graph, facet, ctx),
    }
}

fn standard_facet_query(
    graph: &SchemaGraph,
    facet: &FieldRef,
    ctx: &FilterContext,
) -> Result<FacetQueryPlan, PlanError> {
    let name_field = FieldRef {
        alias: "name".into(),
        aggregate: None,
        ..facet.clone()
    };
    let def = QueryDef::from_fields(
        graph,
        ctx.root_table,
        vec![name_field, count_field(ctx)],
    );
    let mut builder = def.build(true)?;
    apply_facet_constraints(graph, &mut builder, ctx, Some(&facet.name))?;
    builder.group_by(quoted("name"));
    builder.order_by(format!("{} DESC", quoted("value")));
    Ok(FacetQueryPlan {
        facet: facet.name.clone(),
        query: builder.build(),
        data_kind: DataKind::Category,
        values_delimited: facet.values_delimited,
        used_fallback: false,
    })
}

fn numeric_facet_query(
    graph: &SchemaGraph,
    facet: &FieldRef,
    ctx: &FilterContext,
) -> Result<FacetQueryPlan, PlanError> {
    let bin_field = FieldRef {
        select: Some(facet.bin_expr()),
        alias: "bin".into(),
        aggregate: None,
        log_scale: false, // the transform is already inside the bin expression
        ..facet.clone()
    };
    let def = QueryDef::from_fields(graph, ctx.root_table, vec![bin_field, count_field(ctx)]);
    let mut builder = def.build(true)?;
    apply_facet_constraints(graph, &mut builder, ctx, Some(&facet.name))?;

    // Exclude rows with no source value before grouping; under a log
    // transform only strictly-positive values are meaningful.
    let alias = def
        .alias_of(&facet.table, &facet.join_clause)
        .unwrap_or(&facet.table)
        .to_string();
    let source = Expr::col(facet.column.clone());
    if facet.log_scale {
        let mut r = source.render(&alias);
        r.push(" > ");
        r.push_param(SqlParam::Int(0));
        builder.and_where(r);
    } else {
        builder.and_where(Expr::NotNull(Box::new(source)).render(&alias));
    }
    builder.group_by(quoted("bin"));
    Ok(FacetQueryPlan {
        facet: facet.name.clone(),
        query: builder.build(),
        data_kind: DataKind::Numeric,
        values_delimited: false,
        used_fallback: false,
    })
}

/// Unfiltered browse: read the offline-materialized counts instead of the
/// live join, trading correctness-under-filter (there is no filter) for
/// latency.
fn precomputed_facet_query(facet: &FieldRef) -> Result<FacetQueryPlan, PlanError> {
    let fb = facet.fallback.as_ref().ok_or_else(|| {
        PlanError::Catalog(format!("facet '{}' has no precomputed table", facet.name))
    })?;
    let mut builder = SelectBuilder::new(quoted(&fb.table));
    builder.select(Rendered::raw(format!(
        "{} AS {}",
        qualified(&fb.table, &fb.value_column),
        quoted("name")
    )));
    builder.select(Rendered::raw(format!(
        "{} AS {}",
        qualified(&fb.table, &fb.count_column),
        quoted("value")
    )));
    if let Some(clause) = &fb.where_clause {
        builder.and_where(clause.render(&fb.table));
    }
    builder.order_by(format!("{} DESC", quoted("value")));
    Ok(FacetQueryPlan {
        facet: facet.name.clone(),
        query: builder.build(),
        data_kind: facet.data_kind,
        values_delimited: facet.values_delimited,
        used_fallback: true,
    })
}

/// The set of root-entity keys matching one facet's active filter. Rooted at
/// the facet's own table so the join path runs facet → root.
pub fn constraint_query(
    graph: &SchemaGraph,
    facet: &FieldRef,
    root_table: &str,
    key_column: &str,
) -> Result<SqlQuery, PlanError> {
    let mut def = QueryDef::new(graph, &facet.table);
    def.add_field(FieldRef {
        needs_distinct: true,
        ..FieldRef::column_ref(root_table, key_column)
    });
    let mut builder = def.build(true)?;

    let alias = facet.table.as_str(); // the facet table roots this definition
    if facet.data_kind == DataKind::Numeric {
        if let Some(bounds) = facet.numeric_bounds() {
            if let Some(min) = bounds.min {
                let mut r = facet.select_expr().render(alias);
                r.push(if bounds.include_lower { " >= " } else { " > " });
                r.push_param(SqlParam::Float(min));
                builder.and_where(r);
            }
            if let Some(max) = bounds.max {
                let mut r = facet.select_expr().render(alias);
                r.push(if bounds.include_upper { " <= " } else { " < " });
                r.push_param(SqlParam::Float(max));
                builder.and_where(r);
            }
        }
    } else if facet.values_delimited {
        // Values are stored comma-joined; an alternation match finds a
        // selected value anywhere in the list.
        builder.and_where(
            Expr::Regexp {
                expr: Box::new(facet.select_expr()),
                pattern: facet
                    .allowed_values
                    .iter()
                    .map(|v| regex_escape(v))
                    .collect::<Vec<_>>()
                    .join("|"),
            }
            .render(alias),
        );
    } else {
        builder.and_where(
            Expr::InList {
                expr: Box::new(facet.select_expr()),
                values: facet.allowed_values.clone(),
            }
            .render(alias),
        );
    }
    if let Some(clause) = &facet.join_clause {
        builder.and_where(clause.render(alias));
    }
    builder.and_where(Rendered::raw(format!(
        "{} IS NOT NULL",
        qualified(root_table, key_column)
    )));
    Ok(builder.build())
}

/// Narrow a query by every active facet except `ignore`: AND-across-facets
/// for list/count queries, ignore-self for a facet's own counts. Model-level
/// narrowing from the context (term, batch, association) always applies.
pub fn apply_facet_constraints(
    graph: &SchemaGraph,
    builder: &mut SelectBuilder,
    ctx: &FilterContext,
    ignore: Option<&str>,
) -> Result<(), PlanError> {
    for filtering in ctx.filtering_facets {
        if ignore == Some(filtering.name.as_str()) {
            continue;
        }
        let sub = constraint_query(graph, filtering, ctx.root_table, ctx.key_column)?;
        builder.and_where_in_subquery(&qualified(ctx.root_table, ctx.key_column), sub);
    }
    for sub in ctx.extra_constraints {
        builder.and_where_in_subquery(&qualified(ctx.root_table, ctx.key_column), sub.clone());
    }
    for clause in ctx.extra_where {
        builder.and_where(clause.clone());
    }
    Ok(())
}

/// Escape MySQL REGEXP metacharacters in a literal facet value.
fn regex_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
