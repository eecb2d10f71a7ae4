//! Field and facet descriptors: one reportable value and how to count it.

use crate::sql::Expr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DataKind {
    #[default]
    Category,
    Numeric,
}

/// Aggregate method applied to a field's select expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Max,
    Min,
    Sum,
    Avg,
}

impl Aggregate {
    pub fn sql(self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
        }
    }

    pub fn parse(s: &str) -> Option<Aggregate> {
        match s.to_lowercase().as_str() {
            "count" => Some(Aggregate::Count),
            "max" => Some(Aggregate::Max),
            "min" => Some(Aggregate::Min),
            "sum" => Some(Aggregate::Sum),
            "avg" => Some(Aggregate::Avg),
            _ => None,
        }
    }
}

/// Materialized summary table used instead of a live aggregate when the
/// request carries no filter at all.
#[derive(Clone, Debug, PartialEq)]
pub struct Fallback {
    pub table: String,
    pub value_column: String,
    pub count_column: String,
    pub where_clause: Option<Expr>,
}

/// One reportable value: source table/column, optional computed select,
/// optional join-qualifying clause, and facet behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRef {
    pub name: String,
    pub table: String,
    pub column: String,
    /// Output column name; empty means "use the column name".
    pub alias: String,
    /// Computed select expression; None means `table.column`.
    pub select: Option<Expr>,
    /// Boolean fragment ANDed into the join condition, selecting a specific
    /// kind of row (e.g. itype = 'Ab Count'). Part of the dedup identity.
    pub join_clause: Option<Expr>,
    pub aggregate: Option<Aggregate>,
    pub needs_distinct: bool,
    pub data_kind: DataKind,
    pub bin_size: f64,
    pub log_scale: bool,
    /// The column stores several comma-joined values; counts need client-side
    /// re-splitting and filters use a delimiter-aware pattern match.
    pub values_delimited: bool,
    pub fallback: Option<Fallback>,
    /// Active filter values; empty means the facet is not filtering.
    pub allowed_values: Vec<String>,
    /// Selected from the list-level filter subquery, never joined.
    pub from_filter_subquery: bool,
    pub order: i32,
    pub is_default: bool,
}

impl Default for FieldRef {
    fn default() -> Self {
        FieldRef {
            name: String::new(),
            table: String::new(),
            column: String::new(),
            alias: String::new(),
            select: None,
            join_clause: None,
            aggregate: None,
            needs_distinct: false,
            data_kind: DataKind::Category,
            bin_size: 1.0,
            log_scale: false,
            values_delimited: false,
            fallback: None,
            allowed_values: Vec::new(),
            from_filter_subquery: false,
            order: 0,
            is_default: false,
        }
    }
}

impl FieldRef {
    /// Plain column reference on `table`.
    pub fn column_ref(table: impl Into<String>, column: impl Into<String>) -> Self {
        let column = column.into();
        FieldRef {
            name: column.clone(),
            table: table.into(),
            column,
            ..Default::default()
        }
    }

    pub fn output_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.column
        } else {
            &self.alias
        }
    }

    /// The select expression, with the log transform applied when configured.
    pub fn select_expr(&self) -> Expr {
        if self.log_scale {
            return Expr::func("log", vec![Expr::col(self.column.clone())]);
        }
        self.select
            .clone()
            .unwrap_or_else(|| Expr::col(self.column.clone()))
    }

    /// Bin expression for numeric facets: floor(value / bin_size) * bin_size.
    pub fn bin_expr(&self) -> Expr {
        Expr::mul(
            Expr::func(
                "floor",
                vec![Expr::div(self.select_expr(), Expr::Float(self.bin_size))],
            ),
            Expr::Float(self.bin_size),
        )
    }

    /// Parse the active `"min, max"` range string for a numeric facet.
    /// Returns None for category facets or when no filter is active.
    pub fn numeric_bounds(&self) -> Option<NumericBounds> {
        if self.data_kind != DataKind::Numeric || self.allowed_values.is_empty() {
            return None;
        }
        let raw = &self.allowed_values[0];
        let mut pieces = raw.splitn(2, ',');
        let lower = pieces.next().unwrap_or("");
        let upper = pieces.next().unwrap_or("");
        Some(NumericBounds {
            min: scrub_number(lower),
            max: scrub_number(upper),
            // Histogram semantics: lower bound included, upper excluded,
            // unless the text carries an explicit bracket override.
            include_lower: !lower.contains('('),
            include_upper: upper.contains(']'),
        })
    }
}

/// Inclusive/exclusive numeric range parsed from a filter string. A missing
/// bound leaves that side unconstrained.
#[derive(Clone, Debug, PartialEq)]
pub struct NumericBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub include_lower: bool,
    pub include_upper: bool,
}

/// Strip everything but digits, sign, and decimal point; a garbled bound
/// degrades to "no bound on that side" rather than failing the request.
fn scrub_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}
