//! Expression tree for select expressions and join-qualifying clauses.
//!
//! Column references are rendered against the owning table-usage's alias at
//! build time, after aliases are assigned. Clauses are composed structurally,
//! never by rewriting already-rendered SQL text, so a table name that is a
//! substring of another identifier can never be corrupted.

use crate::sql::{qualified, quoted, Rendered, SqlParam};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    pub fn sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Div,
    Mul,
}

impl ArithOp {
    fn sql(self) -> &'static str {
        match self {
            ArithOp::Div => "/",
            ArithOp::Mul => "*",
        }
    }
}

/// A select expression or boolean clause fragment. Equality is structural,
/// which is what table-usage deduplication compares.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Column on the owning table-usage; the alias is supplied at render time.
    Col(String),
    /// Column on a specific alias (e.g. the root table from a joined table's clause).
    TableCol { table: String, column: String },
    Int(i64),
    Float(f64),
    Str(String),
    /// Raw select template from config; `{t}` expands to the owning alias.
    Template(String),
    Func { name: String, args: Vec<Expr> },
    Arith { op: ArithOp, left: Box<Expr>, right: Box<Expr> },
    Cmp { op: CmpOp, left: Box<Expr>, right: Box<Expr> },
    InList { expr: Box<Expr>, values: Vec<String> },
    /// MySQL REGEXP match, used for delimiter-stored facet values.
    Regexp { expr: Box<Expr>, pattern: String },
    NotNull(Box<Expr>),
    And(Vec<Expr>),
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Col(name.into())
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Func {
            name: name.into(),
            args,
        }
    }

    pub fn cmp(left: Expr, op: CmpOp, right: Expr) -> Self {
        Expr::Cmp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn div(left: Expr, right: Expr) -> Self {
        Expr::Arith {
            op: ArithOp::Div,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Expr::Arith {
            op: ArithOp::Mul,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Render against the owning usage's alias.
    pub fn render(&self, alias: &str) -> Rendered {
        let mut out = Rendered::default();
        self.render_into(alias, &mut out);
        out
    }

    fn render_into(&self, alias: &str, out: &mut Rendered) {
        match self {
            Expr::Col(column) => out.push(&qualified(alias, column)),
            Expr::TableCol { table, column } => out.push(&qualified(table, column)),
            Expr::Int(n) => out.push_param(SqlParam::Int(*n)),
            Expr::Float(n) => out.push_param(SqlParam::Float(*n)),
            Expr::Str(s) => out.push_param(SqlParam::Str(s.clone())),
            Expr::Template(t) => out.push(&t.replace("{t}", &quoted(alias))),
            Expr::Func { name, args } => {
                out.push(name);
                out.push("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(", ");
                    }
                    arg.render_into(alias, out);
                }
                out.push(")");
            }
            Expr::Arith { op, left, right } => {
                out.push("(");
                left.render_into(alias, out);
                out.push(" ");
                out.push(op.sql());
                out.push(" ");
                right.render_into(alias, out);
                out.push(")");
            }
            Expr::Cmp { op, left, right } => {
                left.render_into(alias, out);
                out.push(" ");
                out.push(op.sql());
                out.push(" ");
                right.render_into(alias, out);
            }
            Expr::InList { expr, values } => {
                if values.is_empty() {
                    // An empty allowed-values list matches nothing.
                    out.push("1 = 0");
                    return;
                }
                expr.render_into(alias, out);
                out.push(" IN (");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(", ");
                    }
                    out.push_param(SqlParam::Str(v.clone()));
                }
                out.push(")");
            }
            Expr::Regexp { expr, pattern } => {
                expr.render_into(alias, out);
                out.push(" REGEXP ");
                out.push_param(SqlParam::Str(pattern.clone()));
            }
            Expr::NotNull(expr) => {
                expr.render_into(alias, out);
                out.push(" IS NOT NULL");
            }
            Expr::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push(" AND ");
                    }
                    part.render_into(alias, out);
                }
            }
        }
    }
}
