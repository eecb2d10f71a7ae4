//! List orchestration: one request becomes the count, page, and facet
//! queries that serve it.

use crate::catalog::{ContextKind, FieldCatalog, ResolvedModel, SortDirection};
use crate::error::PlanError;
use crate::plan::facet::{
    apply_facet_constraints, constraint_query, facet_query, FacetQueryPlan, FilterContext,
};
use crate::plan::field::{Aggregate, DataKind, FieldRef};
use crate::plan::query_def::QueryDef;
use crate::schema::SchemaGraph;
use crate::sql::{qualified, quoted, JoinKind, Rendered, SelectBuilder, SqlParam, SqlQuery};
use serde::Deserialize;

/// One active facet filter: the facet's name and the selected values
/// (for numeric facets, a single "min, max" range string).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FacetSelection {
    pub facet: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Scope the list to entities associated with one value of another model.
#[derive(Clone, Debug, Deserialize)]
pub struct AssociatedEntity {
    pub model: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    pub model: String,
    pub skip: Option<u64>,
    pub top: Option<u64>,
    pub term: String,
    /// Natural-key values matched against any of the model's batch columns.
    pub batch: Vec<String>,
    pub sort: Option<SortSpec>,
    pub associated: Option<AssociatedEntity>,
    pub facets: Vec<FacetSelection>,
    /// Display fields by name; empty means the model's defaults.
    pub fields: Vec<String>,
    /// Facets to break down; empty means the model's defaults.
    pub requested_facets: Vec<String>,
}

impl ListRequest {
    /// No narrowing at all: the whole-table browse that precomputed facet
    /// counts may answer.
    pub fn is_null(&self) -> bool {
        self.term.is_empty()
            && self.batch.is_empty()
            && self.associated.is_none()
            && self.facets.iter().all(|f| f.values.is_empty())
    }
}

/// Plans every query a list request needs. Construction resolves the active
/// facet filters once; unknown or valueless selections are dropped with a
/// warning rather than failing the request.
pub struct ListPlanner<'a> {
    graph: &'a SchemaGraph,
    catalog: &'a FieldCatalog,
    model: &'a ResolvedModel,
    request: &'a ListRequest,
    filtering_facets: Vec<FieldRef>,
}

impl<'a> ListPlanner<'a> {
    pub fn new(
        graph: &'a SchemaGraph,
        catalog: &'a FieldCatalog,
        request: &'a ListRequest,
    ) -> Result<Self, PlanError> {
        let model = catalog
            .model(&request.model)
            .ok_or_else(|| PlanError::UnknownModel(request.model.clone()))?;

        let mut filtering_facets = Vec::new();
        for sel in &request.facets {
            if sel.values.is_empty() {
                continue;
            }
            match catalog.facet(&model.name, &sel.facet) {
                Some(facet) => {
                    let mut facet = facet.clone();
                    facet.allowed_values = sel.values.clone();
                    filtering_facets.push(facet);
                }
                None => {
                    tracing::warn!(model = %model.name, facet = %sel.facet,
                        "dropping filter on unknown facet");
                }
            }
        }

        Ok(ListPlanner {
            graph,
            catalog,
            model,
            request,
            filtering_facets,
        })
    }

    pub fn model(&self) -> &ResolvedModel {
        self.model
    }

    pub fn filtering_facets(&self) -> &[FieldRef] {
        &self.filtering_facets
    }

    /// Unlike `ListRequest::is_null`, this reflects the filters that actually
    /// survived resolution.
    pub fn is_null(&self) -> bool {
        self.request.term.is_empty()
            && self.request.batch.is_empty()
            && self.request.associated.is_none()
            && self.filtering_facets.is_empty()
    }

    /// Count of distinct root entities under every active filter.
    pub fn count_query(&self) -> Result<SqlQuery, PlanError> {
        let mut def = QueryDef::new(self.graph, &self.model.table);
        def.add_field(FieldRef {
            aggregate: Some(Aggregate::Count),
            alias: "count".into(),
            ..FieldRef::column_ref(&self.model.table, &self.model.key_column)
        });
        let mut builder = def.build(false)?;
        let extras = self.extra_constraints(true)?;
        let batch = self.batch_where();
        let ctx = self.filter_context(&extras, &batch);
        apply_facet_constraints(self.graph, &mut builder, &ctx, None)?;
        Ok(builder.build())
    }

    /// One page of the list: display fields, filters, sort, pagination.
    pub fn list_query(&self) -> Result<SqlQuery, PlanError> {
        let mut fields = self.display_fields()?;

        let searching = !self.request.term.is_empty() && self.model.search.is_some();
        if searching {
            // Selected off the joined search subquery, not a schema table.
            fields.push(FieldRef {
                name: "Search Score".into(),
                alias: "search_score".into(),
                from_filter_subquery: true,
                ..FieldRef::column_ref(&self.model.table, "min_score")
            });
        }

        let sort = self.resolve_sort();
        if let Some((field, _)) = &sort {
            if !fields.iter().any(|f| f.output_name() == field.output_name()) {
                // Appended only for ordering; max() keeps one row per entity
                // when the sort column lives across a to-many join.
                fields.push(FieldRef {
                    aggregate: Some(Aggregate::Max),
                    ..field.clone()
                });
            }
        }

        let def = QueryDef::from_fields(self.graph, &self.model.table, fields);
        let mut builder = def.build(false)?;
        def.apply_default_grouping(&mut builder);

        // The scored search join replaces the term IN-subquery here so the
        // page can select and sort by the match score.
        let extras = self.extra_constraints(false)?;
        let batch = self.batch_where();
        let ctx = self.filter_context(&extras, &batch);
        apply_facet_constraints(self.graph, &mut builder, &ctx, None)?;
        if searching {
            self.join_scored_search(&mut builder)?;
        }

        match sort {
            Some((field, direction)) => {
                let alias = quoted(field.output_name());
                let numeric = field.data_kind == DataKind::Numeric
                    || self
                        .graph
                        .column_is_numeric(&field.table, &field.column)
                        .unwrap_or(false);
                match (numeric, direction) {
                    // Negating flips NULLs to the end of an ascending sort.
                    (true, SortDirection::Asc) => builder.order_by(format!("-{} DESC", alias)),
                    (_, SortDirection::Asc) => builder.order_by(format!("{} ASC", alias)),
                    (_, SortDirection::Desc) => builder.order_by(format!("{} DESC", alias)),
                }
            }
            None if searching => builder.order_by(format!("{} ASC", quoted("search_score"))),
            None => {
                for s in &self.model.default_sort {
                    let dir = match s.direction {
                        SortDirection::Asc => "ASC",
                        SortDirection::Desc => "DESC",
                    };
                    builder.order_by(format!(
                        "{} {}",
                        qualified(&self.model.table, &s.column),
                        dir
                    ));
                }
            }
        }

        if let Some(top) = self.request.top {
            builder.limit(top);
        }
        if let Some(skip) = self.request.skip {
            builder.offset(skip);
        }
        Ok(builder.build())
    }

    /// One plan per requested facet (or the model's defaults), each counting
    /// under every active filter but its own. A facet that fails to plan is
    /// skipped so one bad config entry cannot take down the whole breakdown.
    pub fn facet_queries(&self) -> Result<Vec<FacetQueryPlan>, PlanError> {
        let extras = self.extra_constraints(true)?;
        let batch = self.batch_where();
        let ctx = self.filter_context(&extras, &batch);

        let mut plans = Vec::new();
        for facet in self.requested_facets() {
            match facet_query(self.graph, &facet, &ctx) {
                Ok(plan) => plans.push(plan),
                Err(err) => {
                    tracing::warn!(facet = %facet.name, error = %err, "skipping facet");
                }
            }
        }
        Ok(plans)
    }

    /// The root-key subquery for one active facet, on its own.
    pub fn facet_constraint_query(&self, name: &str) -> Result<SqlQuery, PlanError> {
        let facet = self
            .filtering_facets
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| PlanError::UnknownField {
                model: self.model.name.clone(),
                name: name.to_string(),
            })?;
        constraint_query(self.graph, facet, &self.model.table, &self.model.key_column)
    }

    fn filter_context<'b>(
        &'b self,
        extras: &'b [SqlQuery],
        batch: &'b [Rendered],
    ) -> FilterContext<'b> {
        FilterContext {
            root_table: &self.model.table,
            key_column: &self.model.key_column,
            filtering_facets: &self.filtering_facets,
            is_null: self.is_null(),
            extra_constraints: extras,
            extra_where: batch,
        }
    }

    fn display_fields(&self) -> Result<Vec<FieldRef>, PlanError> {
        if self.request.fields.is_empty() {
            let mut fields = self.catalog.default_fields(&self.model.name, ContextKind::List);
            if fields.is_empty() {
                fields.push(self.key_field());
            }
            return Ok(fields);
        }
        // Explicit field lists always carry the key so rows stay addressable.
        let mut fields = vec![self.key_field()];
        for name in &self.request.fields {
            let field = self
                .catalog
                .field(&self.model.name, ContextKind::List, name)
                .ok_or_else(|| PlanError::UnknownField {
                    model: self.model.name.clone(),
                    name: name.clone(),
                })?;
            fields.push(field.clone());
        }
        Ok(fields)
    }

    fn key_field(&self) -> FieldRef {
        FieldRef {
            alias: "id".into(),
            ..FieldRef::column_ref(&self.model.table, &self.model.key_column)
        }
    }

    fn resolve_sort(&self) -> Option<(FieldRef, SortDirection)> {
        let spec = self.request.sort.as_ref()?;
        match self
            .catalog
            .field(&self.model.name, ContextKind::List, &spec.field)
        {
            Some(field) => Some((field.clone(), spec.direction)),
            None => {
                tracing::warn!(model = %self.model.name, field = %spec.field,
                    "ignoring sort on unknown field");
                None
            }
        }
    }

    fn requested_facets(&self) -> Vec<FieldRef> {
        let mut facets = if self.request.requested_facets.is_empty() {
            self.catalog.default_facets(&self.model.name)
        } else {
            let mut named = Vec::new();
            for name in &self.request.requested_facets {
                match self.catalog.facet(&self.model.name, name) {
                    Some(facet) => named.push(facet.clone()),
                    None => {
                        tracing::warn!(model = %self.model.name, facet = %name,
                            "skipping unknown facet");
                    }
                }
            }
            named
        };
        // An actively filtering facet always gets a breakdown, even when the
        // request does not name it.
        for filtering in &self.filtering_facets {
            if !facets.iter().any(|f| f.name == filtering.name) {
                facets.push(filtering.clone());
            }
        }
        facets
    }

    /// Model-level narrowing as root-key IN-subqueries. The term subquery is
    /// included only when the caller does not join the scored version.
    fn extra_constraints(&self, include_term: bool) -> Result<Vec<SqlQuery>, PlanError> {
        let mut extras = Vec::new();
        if include_term && !self.request.term.is_empty() {
            extras.push(self.term_key_subquery()?);
        }
        if self.request.associated.is_some() {
            extras.push(self.association_constraint()?);
        }
        Ok(extras)
    }

    fn search_match(&self) -> Result<(String, Rendered), PlanError> {
        let search = self
            .model
            .search
            .as_ref()
            .ok_or_else(|| PlanError::NoSearchConfig(self.model.name.clone()))?;
        let columns = search
            .columns
            .iter()
            .map(|c| qualified(&search.table, c))
            .collect::<Vec<_>>()
            .join(", ");
        Ok((
            search.table.clone(),
            Rendered {
                sql: format!("MATCH({}) AGAINST (? IN BOOLEAN MODE)", columns),
                params: vec![SqlParam::Str(self.request.term.clone())],
            },
        ))
    }

    /// Keys of root entities whose fulltext document matches the term.
    fn term_key_subquery(&self) -> Result<SqlQuery, PlanError> {
        let search = self
            .model
            .search
            .as_ref()
            .ok_or_else(|| PlanError::NoSearchConfig(self.model.name.clone()))?;
        let (table, matcher) = self.search_match()?;
        let mut builder = SelectBuilder::new(quoted(&table));
        builder.select(Rendered::raw(qualified(&table, &search.key_column)));
        builder.and_where(matcher);
        Ok(builder.build())
    }

    /// Join the fulltext match as a scored subquery so the page can select
    /// and order by `search_score`.
    fn join_scored_search(&self, builder: &mut SelectBuilder) -> Result<(), PlanError> {
        let search = self
            .model
            .search
            .as_ref()
            .ok_or_else(|| PlanError::NoSearchConfig(self.model.name.clone()))?;
        let (table, matcher) = self.search_match()?;
        let mut table_ref = Rendered::raw(format!(
            "(SELECT {} AS {}, ",
            qualified(&table, &search.key_column),
            quoted("match_id")
        ));
        table_ref.append(matcher.clone());
        table_ref.push(&format!(" AS {} FROM {} WHERE ", quoted("min_score"), quoted(&table)));
        table_ref.append(matcher);
        table_ref.push(&format!(") AS {}", quoted("filterQuery")));
        builder.join(
            JoinKind::Inner,
            table_ref,
            Rendered::raw(format!(
                "{} = {}",
                qualified("filterQuery", "match_id"),
                qualified(&self.model.table, &self.model.key_column)
            )),
        );
        Ok(())
    }

    /// Keys of root entities associated with the requested value.
    fn association_constraint(&self) -> Result<SqlQuery, PlanError> {
        let requested = match &self.request.associated {
            Some(a) => a,
            None => return Err(PlanError::Catalog("no association requested".into())),
        };
        let assoc = self.model.associations.get(&requested.model).ok_or_else(|| {
            PlanError::UnknownAssociation {
                model: self.model.name.clone(),
                association: requested.model.clone(),
            }
        })?;
        let filter = FieldRef {
            allowed_values: vec![requested.value.clone()],
            join_clause: assoc.clause.clone(),
            ..FieldRef::column_ref(&assoc.table, &assoc.match_column)
        };
        constraint_query(self.graph, &filter, &self.model.table, &self.model.key_column)
    }

    /// Batch requests match any of the model's natural-key columns.
    fn batch_where(&self) -> Vec<Rendered> {
        if self.request.batch.is_empty() || self.model.batch_columns.is_empty() {
            return Vec::new();
        }
        let placeholders = vec!["?"; self.request.batch.len()].join(", ");
        let mut parts = Vec::new();
        let mut params = Vec::new();
        for column in &self.model.batch_columns {
            parts.push(format!(
                "{} IN ({})",
                qualified(&self.model.table, column),
                placeholders
            ));
            params.extend(self.request.batch.iter().map(|v| SqlParam::Str(v.clone())));
        }
        vec![Rendered {
            sql: format!("({})", parts.join(" OR ")),
            params,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, CatalogConfig, ClauseConfig, ContextKind, FieldConfig,
        ModelConfig, SearchConfig, SortConfig};
    use crate::schema::{LinkOverrides, TableInfo, TableLink};

    fn graph() -> SchemaGraph {
        let mut protein = TableInfo::new("protein");
        protein.primary_key = Some("id".into());
        protein
            .column_types
            .insert("sym".into(), "varchar".into());

        let mut target = TableInfo::new("target");
        target.primary_key = Some("id".into());
        target.column_types.insert("fam".into(), "varchar".into());
        target
            .column_types
            .insert("novelty".into(), "double".into());

        let mut t2tc = TableInfo::new("t2tc");
        t2tc.links = vec![
            TableLink {
                column: "target_id".into(),
                other_table: "target".into(),
                other_column: "id".into(),
            },
            TableLink {
                column: "protein_id".into(),
                other_table: "protein".into(),
                other_column: "id".into(),
            },
        ];

        let mut disease = TableInfo::new("disease");
        disease.links = vec![TableLink {
            column: "protein_id".into(),
            other_table: "protein".into(),
            other_column: "id".into(),
        }];

        let mut overrides = LinkOverrides::default();
        overrides
            .multi_hop
            .insert(("protein".into(), "target".into()), vec!["t2tc".into()]);
        SchemaGraph::new(vec![protein, target, t2tc, disease], overrides)
    }

    fn field(name: &str, context: ContextKind, table: &str, column: &str) -> FieldConfig {
        FieldConfig {
            model: "Target".into(),
            context,
            name: name.into(),
            description: None,
            table: table.into(),
            column: column.into(),
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
        }
    }

    fn catalog() -> FieldCatalog {
        let mut sym = field("Symbol", ContextKind::List, "protein", "sym");
        sym.alias = Some("id".into());
        sym.column = "id".into();
        sym.name = "Id".into();
        let config = CatalogConfig {
            models: vec![
                ModelConfig {
                    name: "Target".into(),
                    table: "protein".into(),
                    key_column: None,
                    default_sort: vec![SortConfig {
                        column: "sym".into(),
                        direction: crate::catalog::SortDirection::Asc,
                    }],
                    search: Some(SearchConfig {
                        table: "protein".into(),
                        columns: vec!["sym".into(), "description".into()],
                        key_column: "id".into(),
                    }),
                    batch_columns: vec!["uniprot".into(), "sym".into()],
                    associations: vec![crate::catalog::AssociationConfig {
                        model: "Disease".into(),
                        table: "disease".into(),
                        match_column: "name".into(),
                        clauses: vec![ClauseConfig {
                            column: "dtype".into(),
                            op: "eq".into(),
                            value: Some(serde_json::json!("DisGeNET")),
                        }],
                    }],
                },
                ModelConfig {
                    name: "Disease".into(),
                    table: "disease".into(),
                    key_column: Some("name".into()),
                    default_sort: vec![],
                    search: None,
                    batch_columns: vec![],
                    associations: vec![],
                },
            ],
            fields: vec![
                sym,
                field("Symbol", ContextKind::List, "protein", "sym"),
                field("Family", ContextKind::Facet, "target", "fam"),
                {
                    let mut f = field("Novelty", ContextKind::Facet, "target", "novelty");
                    f.data_type = Some("numeric".into());
                    f
                },
                {
                    let mut f = field("GWAS", ContextKind::Facet, "target", "gwas");
                    f.is_default = false;
                    f.order = 0;
                    f
                },
            ],
        };
        catalog::resolve(&config).unwrap()
    }

    fn request(facets: Vec<FacetSelection>) -> ListRequest {
        ListRequest {
            model: "Target".into(),
            facets,
            ..Default::default()
        }
    }

    fn selection(facet: &str, values: Vec<&str>) -> FacetSelection {
        FacetSelection {
            facet: facet.into(),
            values: values.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn count_query_counts_distinct_keys_under_filters() {
        let g = graph();
        let c = catalog();
        let req = request(vec![selection("Family", vec!["Kinase"])]);
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let q = planner.count_query().unwrap();
        assert!(q.sql.starts_with("SELECT count(distinct `protein`.`id`) AS `count` FROM `protein`"));
        assert!(q.sql.contains("`protein`.`id` IN (SELECT distinct `protein`.`id`"));
        assert_eq!(q.params, vec![SqlParam::Str("Kinase".into())]);
    }

    #[test]
    fn list_query_pages_and_applies_default_sort() {
        let g = graph();
        let c = catalog();
        let req = ListRequest {
            top: Some(10),
            skip: Some(20),
            ..request(vec![])
        };
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let q = planner.list_query().unwrap();
        assert!(q.sql.contains("`protein`.`id` AS `id`"));
        assert!(q.sql.contains("`protein`.`sym` AS `sym`"));
        assert!(q.sql.ends_with("ORDER BY `protein`.`sym` ASC LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn unknown_display_field_is_an_error() {
        let g = graph();
        let c = catalog();
        let req = ListRequest {
            fields: vec!["Nope".into()],
            ..request(vec![])
        };
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        assert!(matches!(
            planner.list_query(),
            Err(PlanError::UnknownField { .. })
        ));
    }

    #[test]
    fn numeric_ascending_sort_pushes_nulls_last() {
        let g = graph();
        let c = catalog();
        let req = ListRequest {
            sort: Some(SortSpec {
                field: "Novelty".into(),
                direction: SortDirection::Asc,
            }),
            ..request(vec![])
        };
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let q = planner.list_query().unwrap();
        assert!(q.sql.contains("ORDER BY -`novelty` DESC"));
        // The sort column is appended with max() so grouping collapses the
        // to-many join back to one row per entity.
        assert!(q.sql.contains("max(`target`.`novelty`) AS `novelty`"));
        assert!(q.sql.contains("GROUP BY `protein`.`id`"));
    }

    #[test]
    fn term_search_joins_scored_subquery() {
        let g = graph();
        let c = catalog();
        let req = ListRequest {
            term: "kinase".into(),
            ..request(vec![])
        };
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let q = planner.list_query().unwrap();
        assert!(q.sql.contains("`filterQuery`.`min_score` AS `search_score`"));
        assert!(q.sql.contains(
            "INNER JOIN (SELECT `protein`.`id` AS `match_id`, \
             MATCH(`protein`.`sym`, `protein`.`description`) AGAINST (? IN BOOLEAN MODE) \
             AS `min_score` FROM `protein` WHERE \
             MATCH(`protein`.`sym`, `protein`.`description`) AGAINST (? IN BOOLEAN MODE)) \
             AS `filterQuery` ON `filterQuery`.`match_id` = `protein`.`id`"
        ));
        assert!(q.sql.contains("ORDER BY `search_score` ASC"));
        assert_eq!(
            q.params,
            vec![
                SqlParam::Str("kinase".into()),
                SqlParam::Str("kinase".into())
            ]
        );
    }

    #[test]
    fn term_narrows_facet_counts_via_key_subquery() {
        let g = graph();
        let c = catalog();
        let req = ListRequest {
            term: "kinase".into(),
            ..request(vec![])
        };
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let plans = planner.facet_queries().unwrap();
        assert_eq!(plans.len(), 2); // both default facets
        for plan in &plans {
            assert!(plan.query.sql.contains(
                "`protein`.`id` IN (SELECT `protein`.`id` FROM `protein` WHERE \
                 MATCH(`protein`.`sym`, `protein`.`description`) AGAINST (? IN BOOLEAN MODE))"
            ));
        }
    }

    #[test]
    fn batch_matches_any_natural_key_column() {
        let g = graph();
        let c = catalog();
        let req = ListRequest {
            batch: vec!["P00533".into(), "EGFR".into()],
            ..request(vec![])
        };
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let q = planner.count_query().unwrap();
        assert!(q.sql.contains(
            "(`protein`.`uniprot` IN (?, ?) OR `protein`.`sym` IN (?, ?))"
        ));
        assert_eq!(q.params.len(), 4);
    }

    #[test]
    fn association_scopes_through_its_clause() {
        let g = graph();
        let c = catalog();
        let req = ListRequest {
            associated: Some(AssociatedEntity {
                model: "Disease".into(),
                value: "asthma".into(),
            }),
            ..request(vec![])
        };
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let q = planner.count_query().unwrap();
        assert!(q.sql.contains("`protein`.`id` IN (SELECT distinct `protein`.`id` AS `id` FROM `disease`"));
        assert!(q.sql.contains("`disease`.`name` IN (?)"));
        assert!(q.sql.contains("`disease`.`dtype` = ?"));
        assert_eq!(
            q.params,
            vec![
                SqlParam::Str("asthma".into()),
                SqlParam::Str("DisGeNET".into())
            ]
        );
    }

    #[test]
    fn unknown_association_is_an_error() {
        let g = graph();
        let c = catalog();
        let req = ListRequest {
            associated: Some(AssociatedEntity {
                model: "Ligand".into(),
                value: "aspirin".into(),
            }),
            ..request(vec![])
        };
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        assert!(matches!(
            planner.count_query(),
            Err(PlanError::UnknownAssociation { .. })
        ));
    }

    #[test]
    fn filtering_facets_always_get_a_breakdown() {
        let g = graph();
        let c = catalog();
        // GWAS is neither a default facet nor requested, but it filters.
        let req = request(vec![selection("GWAS", vec!["1"])]);
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let plans = planner.facet_queries().unwrap();
        let names: Vec<&str> = plans.iter().map(|p| p.facet.as_str()).collect();
        assert!(names.contains(&"GWAS"));
        assert!(names.contains(&"Family"));

        // Its own counts still ignore its own filter.
        let gwas = plans.iter().find(|p| p.facet == "GWAS").unwrap();
        assert!(gwas.query.params.is_empty());

        // Naming an already-filtering facet does not duplicate it.
        let req = ListRequest {
            requested_facets: vec!["Family".into()],
            ..request(vec![selection("Family", vec!["Kinase"])])
        };
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let plans = planner.facet_queries().unwrap();
        assert_eq!(plans.iter().filter(|p| p.facet == "Family").count(), 1);
    }

    #[test]
    fn dropped_facet_selection_leaves_request_null() {
        let g = graph();
        let c = catalog();
        let req = request(vec![selection("Imaginary", vec!["x"])]);
        assert!(!req.is_null());
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        assert!(planner.filtering_facets().is_empty());
        assert!(planner.is_null());
    }

    #[test]
    fn facet_constraint_query_exposes_one_filter() {
        let g = graph();
        let c = catalog();
        let req = request(vec![selection("Family", vec!["Kinase", "GPCR"])]);
        let planner = ListPlanner::new(&g, &c, &req).unwrap();
        let q = planner.facet_constraint_query("Family").unwrap();
        assert!(q.sql.contains("`target`.`fam` IN (?, ?)"));
        assert!(planner.facet_constraint_query("Novelty").is_err());
    }

    #[test]
    fn unknown_model_fails_fast() {
        let g = graph();
        let c = catalog();
        let req = ListRequest {
            model: "Nope".into(),
            ..Default::default()
        };
        assert!(matches!(
            ListPlanner::new(&g, &c, &req),
            Err(PlanError::UnknownModel(_))
        ));
    }
}
