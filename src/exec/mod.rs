//! Query execution: pooled connections, lazy startup loading, and the
//! concurrent fan-out that serves one list request.

use crate::catalog::{self, CatalogConfig, FieldCatalog};
use crate::error::EngineError;
use crate::plan::{DataKind, FacetQueryPlan, ListPlanner, ListRequest};
use crate::schema::{load_schema, LinkOverrides, SchemaGraph};
use crate::settings::Settings;
use crate::sql::{SqlParam, SqlQuery};
use futures::future::try_join_all;
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, MySql, Row};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// Where the field catalog comes from: provided by the host application, or
/// read from a config table in the same database.
pub enum CatalogSource {
    Inline(CatalogConfig),
    Table(String),
}

/// Schema graph and catalog, loaded once on first use.
struct Runtime {
    schema: SchemaGraph,
    catalog: FieldCatalog,
}

/// Wall-clock cost of one executed query, for request-level diagnostics.
#[derive(Clone, Debug)]
pub struct QueryTiming {
    pub label: String,
    pub elapsed: Duration,
}

#[derive(Clone, Debug)]
pub struct FacetCount {
    pub name: Value,
    pub value: i64,
}

#[derive(Clone, Debug)]
pub struct FacetResult {
    pub facet: String,
    pub data_kind: DataKind,
    pub used_fallback: bool,
    pub values: Vec<FacetCount>,
}

#[derive(Debug, Default)]
pub struct ListResponse {
    pub count: i64,
    pub rows: Vec<Value>,
    pub facets: Vec<FacetResult>,
    pub timings: Vec<QueryTiming>,
}

impl ListResponse {
    /// Elapsed time of one labeled query ("count", "list", or a facet name).
    pub fn elapsed(&self, label: &str) -> Option<Duration> {
        self.timings
            .iter()
            .find(|t| t.label == label)
            .map(|t| t.elapsed)
    }
}

/// The engine owns the pool and the lazily-loaded runtime state. Cheap to
/// share behind an Arc; every request plans against the same immutable
/// schema graph and catalog.
pub struct Engine {
    pool: MySqlPool,
    database_name: String,
    overrides: LinkOverrides,
    catalog_source: CatalogSource,
    runtime: OnceCell<Runtime>,
}

impl Engine {
    pub async fn connect(
        settings: &Settings,
        overrides: LinkOverrides,
        catalog_source: CatalogSource,
    ) -> Result<Self, EngineError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .connect(&settings.database_url)
            .await?;
        Ok(Engine::with_pool(
            pool,
            settings.database_name.clone(),
            overrides,
            catalog_source,
        ))
    }

    pub fn with_pool(
        pool: MySqlPool,
        database_name: String,
        overrides: LinkOverrides,
        catalog_source: CatalogSource,
    ) -> Self {
        Engine {
            pool,
            database_name,
            overrides,
            catalog_source,
            runtime: OnceCell::new(),
        }
    }

    async fn runtime(&self) -> Result<&Runtime, EngineError> {
        self.runtime
            .get_or_try_init(|| async {
                let schema =
                    load_schema(&self.pool, &self.database_name, self.overrides.clone()).await?;
                let config = match &self.catalog_source {
                    CatalogSource::Inline(config) => config.clone(),
                    CatalogSource::Table(table) => {
                        catalog::load_from_pool(&self.pool, table).await?
                    }
                };
                let catalog = catalog::resolve(&config)?;
                tracing::info!(schema = %self.database_name, "engine ready");
                Ok(Runtime { schema, catalog })
            })
            .await
    }

    /// Plan a request against the loaded schema and catalog without running
    /// anything.
    pub async fn planner<'a>(
        &'a self,
        request: &'a ListRequest,
    ) -> Result<ListPlanner<'a>, EngineError> {
        let rt = self.runtime().await?;
        Ok(ListPlanner::new(&rt.schema, &rt.catalog, request)?)
    }

    /// Serve one list request: total count, one page of rows, and every
    /// requested facet breakdown, all fetched concurrently.
    pub async fn list(&self, request: &ListRequest) -> Result<ListResponse, EngineError> {
        let planner = self.planner(request).await?;
        let count_query = planner.count_query()?;
        let list_query = planner.list_query()?;
        let facet_plans = planner.facet_queries()?;

        let facet_futures = try_join_all(
            facet_plans
                .iter()
                .map(|plan| self.timed_fetch(&plan.facet, &plan.query)),
        );
        let (count_fetch, page_fetch, facet_fetches) = tokio::try_join!(
            self.timed_fetch("count", &count_query),
            self.timed_fetch("list", &list_query),
            facet_futures
        )?;

        let (count_rows, count_timing) = count_fetch;
        let (page_rows, page_timing) = page_fetch;
        let count = match count_rows.first() {
            Some(row) => row.try_get("count")?,
            None => 0,
        };
        let rows = page_rows.iter().map(row_to_json).collect();

        let mut timings = vec![count_timing, page_timing];
        let mut facets = Vec::with_capacity(facet_plans.len());
        for (plan, (facet_rows, timing)) in facet_plans.iter().zip(facet_fetches) {
            timings.push(timing);
            facets.push(facet_result(plan, facet_rows)?);
        }

        Ok(ListResponse {
            count,
            rows,
            facets,
            timings,
        })
    }

    async fn timed_fetch(
        &self,
        label: &str,
        query: &SqlQuery,
    ) -> Result<(Vec<MySqlRow>, QueryTiming), EngineError> {
        tracing::debug!(query = label, sql = %query.sql, "execute");
        let started = Instant::now();
        let mut prepared = sqlx::query(&query.sql);
        for param in &query.params {
            prepared = bind_param(prepared, param);
        }
        let rows = prepared.fetch_all(&self.pool).await?;
        let timing = QueryTiming {
            label: label.to_string(),
            elapsed: started.elapsed(),
        };
        tracing::debug!(query = label, rows = rows.len(),
            ms = timing.elapsed.as_millis() as u64, "fetched");
        Ok((rows, timing))
    }
}

fn bind_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(b) => query.bind(*b),
        SqlParam::Int(i) => query.bind(*i),
        SqlParam::Float(f) => query.bind(*f),
        SqlParam::Str(s) => query.bind(s.as_str()),
    }
}

/// Decode one column into JSON without knowing its type up front: integer,
/// then float, then text. DECIMAL arrives as text on the wire.
fn decode_column(row: &MySqlRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    Value::Null
}

fn row_to_json(row: &MySqlRow) -> Value {
    let mut out = serde_json::Map::with_capacity(row.columns().len());
    for column in row.columns() {
        out.insert(
            column.name().to_string(),
            decode_column(row, column.ordinal()),
        );
    }
    Value::Object(out)
}

fn facet_result(plan: &FacetQueryPlan, rows: Vec<MySqlRow>) -> Result<FacetResult, EngineError> {
    let name_column = if !plan.used_fallback && plan.data_kind == DataKind::Numeric {
        "bin"
    } else {
        "name"
    };
    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let name = row
            .columns()
            .iter()
            .find(|c| c.name() == name_column)
            .map(|c| decode_column(&row, c.ordinal()))
            .unwrap_or(Value::Null);
        let value: i64 = row.try_get("value")?;
        values.push(FacetCount { name, value });
    }
    if plan.values_delimited {
        values = resplit_delimited(values);
    }
    Ok(FacetResult {
        facet: plan.facet.clone(),
        data_kind: plan.data_kind,
        used_fallback: plan.used_fallback,
        values,
    })
}

/// A delimited facet stores several comma-joined values per row, so the
/// grouped counts come back per combination. Re-split each combination and
/// re-aggregate per individual value.
fn resplit_delimited(values: Vec<FacetCount>) -> Vec<FacetCount> {
    let mut merged: HashMap<String, i64> = HashMap::new();
    for entry in values {
        let combined = match &entry.name {
            Value::String(s) => s.clone(),
            Value::Null => continue,
            other => other.to_string(),
        };
        for piece in combined.split(',') {
            let piece = piece.trim();
            if !piece.is_empty() {
                *merged.entry(piece.to_string()).or_insert(0) += entry.value;
            }
        }
    }
    let mut out: Vec<FacetCount> = merged
        .into_iter()
        .map(|(name, value)| FacetCount {
            name: Value::String(name),
            value,
        })
        .collect();
    out.sort_by(|a, b| {
        b.value
            .cmp(&a.value)
            .then_with(|| a.name.to_string().cmp(&b.name.to_string()))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(name: &str, value: i64) -> FacetCount {
        FacetCount {
            name: Value::String(name.into()),
            value,
        }
    }

    #[test]
    fn delimited_counts_resplit_and_merge() {
        let values = vec![
            count("Enzyme, Kinase", 5),
            count("Kinase", 3),
            count("Enzyme", 2),
            count("  ", 9),
        ];
        let out = resplit_delimited(values);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, Value::String("Kinase".into()));
        assert_eq!(out[0].value, 8);
        assert_eq!(out[1].name, Value::String("Enzyme".into()));
        assert_eq!(out[1].value, 7);
    }

    #[test]
    fn resplit_orders_ties_by_name() {
        let out = resplit_delimited(vec![count("B", 1), count("A", 1)]);
        assert_eq!(out[0].name, Value::String("A".into()));
        assert_eq!(out[1].name, Value::String("B".into()));
    }
}
