//! Parameterized SELECT assembly with positional `?` binding for MySQL.

/// A value bound to a query parameter. Never spliced into SQL text.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A fully assembled query: SQL text plus its bind parameters, in order.
#[derive(Clone, Debug)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Quote identifier for MySQL (identifiers come from config, never user input).
pub fn quoted(s: &str) -> String {
    format!("`{}`", s.replace('`', "``"))
}

/// Alias-qualified column reference.
pub fn qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", quoted(alias), quoted(column))
}

/// A rendered SQL fragment with the parameters it consumes.
#[derive(Clone, Debug, Default)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Rendered {
    pub fn raw(sql: impl Into<String>) -> Self {
        Rendered {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Append a `?` placeholder and its value.
    pub fn push_param(&mut self, p: SqlParam) {
        self.sql.push('?');
        self.params.push(p);
    }

    pub fn append(&mut self, other: Rendered) {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// Incrementally assembled SELECT. Sections keep their own parameter lists so
/// the final bind order matches placeholder order regardless of the order the
/// caller filled them in.
#[derive(Debug)]
pub struct SelectBuilder {
    select: Vec<String>,
    select_params: Vec<SqlParam>,
    from: String,
    joins: Vec<String>,
    join_params: Vec<SqlParam>,
    wheres: Vec<String>,
    where_params: Vec<SqlParam>,
    group: Vec<String>,
    order: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    pub fn new(from: impl Into<String>) -> Self {
        SelectBuilder {
            select: Vec::new(),
            select_params: Vec::new(),
            from: from.into(),
            joins: Vec::new(),
            join_params: Vec::new(),
            wheres: Vec::new(),
            where_params: Vec::new(),
            group: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn select(&mut self, r: Rendered) {
        self.select.push(r.sql);
        self.select_params.extend(r.params);
    }

    /// `table_ref` may itself carry parameters (a joined subquery).
    pub fn join(&mut self, kind: JoinKind, table_ref: Rendered, on: Rendered) {
        let clause = if on.sql.is_empty() {
            format!("{} {}", kind.sql(), table_ref.sql)
        } else {
            format!("{} {} ON {}", kind.sql(), table_ref.sql, on.sql)
        };
        self.joins.push(clause);
        self.join_params.extend(table_ref.params);
        self.join_params.extend(on.params);
    }

    pub fn and_where(&mut self, r: Rendered) {
        self.wheres.push(r.sql);
        self.where_params.extend(r.params);
    }

    /// `lhs IN (subquery)` — the narrowing idiom used for facet constraints.
    pub fn and_where_in_subquery(&mut self, lhs: &str, sub: SqlQuery) {
        self.wheres.push(format!("{} IN ({})", lhs, sub.sql));
        self.where_params.extend(sub.params);
    }

    pub fn group_by(&mut self, expr: impl Into<String>) {
        self.group.push(expr.into());
    }

    pub fn order_by(&mut self, expr: impl Into<String>) {
        self.order.push(expr.into());
    }

    pub fn limit(&mut self, n: u64) {
        self.limit = Some(n);
    }

    pub fn offset(&mut self, n: u64) {
        self.offset = Some(n);
    }

    pub fn build(self) -> SqlQuery {
        let mut sql = String::from("SELECT ");
        sql.push_str(&self.select.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(&self.from);
        for j in &self.joins {
            sql.push(' ');
            sql.push_str(j);
        }
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.wheres.join(" AND "));
        }
        if !self.group.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group.join(", "));
        }
        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order.join(", "));
        }
        // MySQL requires LIMIT before OFFSET, and OFFSET only with LIMIT.
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        } else if let Some(offset) = self.offset {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", u64::MAX, offset));
        }

        let mut params = self.select_params;
        params.extend(self.join_params);
        params.extend(self.where_params);
        SqlQuery { sql, params }
    }
}
