//! A small Cypher AST and its renderer.
//!
//! Compilation builds clauses as data; text only appears at the very end via
//! `Display`. Every identifier is backtick-quoted and every string literal is
//! escaped, so arbitrary query-graph ids and values cannot break the query.

use serde_json::Value;
use std::fmt::{self, Display, Formatter, Write as _};

use crate::error::{Result, TranspileError};

// ============================================================================
// Literals and identifiers
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    pub fn str(value: impl Into<String>) -> Self {
        Literal::Str(value.into())
    }

    /// Convert a JSON scalar. `Ok(None)` for null; lists and maps are rejected.
    pub fn from_json(value: &Value) -> Result<Option<Self>> {
        Ok(Some(match value {
            Value::Null => return Ok(None),
            Value::Bool(b) => Literal::Bool(*b),
            Value::String(s) => Literal::Str(s.clone()),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Literal::Int(i),
                (None, Some(f)) if f.is_finite() => Literal::Float(f),
                _ => {
                    return Err(TranspileError::unsupported(format!(
                        "Unsupported numeric property value: {n}"
                    )))
                }
            },
            Value::Array(_) => return Err(TranspileError::unsupported("Unsupported property type: list")),
            Value::Object(_) => return Err(TranspileError::unsupported("Unsupported property type: map")),
        }))
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            // Debug keeps the fractional part (`2.0`, not `2`).
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Str(s) => write_string(f, s),
        }
    }
}

fn write_string(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

/// Backtick-quoted identifier (variable, label, relationship type, property key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'a>(pub &'a str);

impl Display for Ident<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_char('`')?;
        f.write_str(&self.0.replace('`', "``"))?;
        f.write_char('`')
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(String),
    Lit(Literal),
    /// `<expr>.<key>`
    Prop(Box<Expr>, String),
    List(Vec<Expr>),
    /// Built-in function call: `labels(n)`, `type(e)`, `startNode(e)` ...
    Func(&'static str, Vec<Expr>),
    /// `<expr>[i]`
    Index(Box<Expr>, usize),
    Eq(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    In(Box<Expr>, Box<Expr>),
    IsNotNull(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Xor(Vec<Expr>),
    Not(Box<Expr>),
    /// `COUNT { (v)-[]-() } < max + 1`
    DegreeAtMost { var: String, max: u32 },
    /// `EXISTS { <clauses> }`
    Exists(Vec<Clause>),
    /// `count(*)`
    CountAll,
    Collect(Box<Expr>),
    Case {
        when: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `v {.*, key: expr, ...}`
    MapProjection {
        var: String,
        entries: Vec<(String, Expr)>,
    },
    /// `[v IN source | map]`
    ListComprehension {
        var: String,
        source: Box<Expr>,
        map: Box<Expr>,
    },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Lit(Literal::Str(value.into()))
    }

    pub fn prop(self, key: impl Into<String>) -> Self {
        Expr::Prop(Box::new(self), key.into())
    }

    pub fn func(name: &'static str, arg: Expr) -> Self {
        Expr::Func(name, vec![arg])
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::Eq(Box::new(self), Box::new(other))
    }

    pub fn is_in(self, list: Expr) -> Self {
        Expr::In(Box::new(self), Box::new(list))
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNotNull(Box::new(self))
    }

    pub fn negate(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::List(values.into_iter().map(Expr::string).collect())
    }

    /// Conjunction, collapsing empty and singleton lists. `None` when empty.
    pub fn all(mut terms: Vec<Expr>) -> Option<Self> {
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(Expr::And(terms)),
        }
    }

    /// Disjunction, collapsing empty and singleton lists. `None` when empty.
    pub fn any(mut terms: Vec<Expr>) -> Option<Self> {
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(Expr::Or(terms)),
        }
    }

    fn is_compound(&self) -> bool {
        match self {
            Expr::And(t) | Expr::Or(t) | Expr::Xor(t) => match t.as_slice() {
                [] => false,
                [only] => only.is_compound(),
                _ => true,
            },
            Expr::Eq(..) | Expr::Gt(..) | Expr::In(..) | Expr::IsNotNull(_) | Expr::Not(_) => true,
            Expr::DegreeAtMost { .. } => true,
            _ => false,
        }
    }

    fn write_operand(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_compound() {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }

    fn write_joined(f: &mut Formatter<'_>, terms: &[Expr], op: &str, empty: &str) -> fmt::Result {
        match terms {
            [] => f.write_str(empty),
            [only] => write!(f, "{only}"),
            _ => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {op} ")?;
                    }
                    term.write_operand(f)?;
                }
                Ok(())
            }
        }
    }
}

fn write_key(f: &mut Formatter<'_>, key: &str) -> fmt::Result {
    let plain = key.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        f.write_str(key)
    } else {
        write!(f, "{}", Ident(key))
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{}", Ident(name)),
            Expr::Lit(lit) => write!(f, "{lit}"),
            Expr::Prop(base, key) => {
                base.write_operand(f)?;
                f.write_char('.')?;
                write_key(f, key)
            }
            Expr::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
            Expr::Func(name, args) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_char(')')
            }
            Expr::Index(base, i) => {
                base.write_operand(f)?;
                write!(f, "[{i}]")
            }
            Expr::Eq(a, b) => {
                a.write_operand(f)?;
                f.write_str(" = ")?;
                b.write_operand(f)
            }
            Expr::Gt(a, b) => {
                a.write_operand(f)?;
                f.write_str(" > ")?;
                b.write_operand(f)
            }
            Expr::In(a, b) => {
                a.write_operand(f)?;
                f.write_str(" IN ")?;
                b.write_operand(f)
            }
            Expr::IsNotNull(a) => {
                a.write_operand(f)?;
                f.write_str(" IS NOT NULL")
            }
            Expr::And(terms) => Expr::write_joined(f, terms, "AND", "true"),
            Expr::Or(terms) => Expr::write_joined(f, terms, "OR", "false"),
            Expr::Xor(terms) => Expr::write_joined(f, terms, "XOR", "false"),
            Expr::Not(inner) => write!(f, "NOT ({inner})"),
            Expr::DegreeAtMost { var, max } => {
                write!(f, "COUNT {{ ({})-[]-() }} < {}", Ident(var), u64::from(*max) + 1)
            }
            Expr::Exists(clauses) => write!(f, "EXISTS {{ {} }}", render(clauses)),
            Expr::CountAll => f.write_str("count(*)"),
            Expr::Collect(inner) => write!(f, "collect({inner})"),
            Expr::Case { when, then, otherwise } => {
                write!(f, "CASE WHEN {when} THEN {then} ELSE {otherwise} END")
            }
            Expr::MapProjection { var, entries } => {
                write!(f, "{} {{.*", Ident(var))?;
                for (key, value) in entries {
                    f.write_str(", ")?;
                    write_key(f, key)?;
                    write!(f, ": {value}")?;
                }
                f.write_char('}')
            }
            Expr::ListComprehension { var, source, map } => {
                write!(f, "[{} IN {source} | {map}]", Ident(var))
            }
        }
    }
}

// ============================================================================
// Patterns
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePattern {
    pub var: Option<String>,
    pub labels: Vec<String>,
    pub props: Vec<(String, Literal)>,
}

impl NodePattern {
    pub fn bare(var: impl Into<String>) -> Self {
        Self {
            var: Some(var.into()),
            ..Self::default()
        }
    }
}

fn write_props(f: &mut Formatter<'_>, props: &[(String, Literal)]) -> fmt::Result {
    if props.is_empty() {
        return Ok(());
    }
    f.write_str(" {")?;
    for (i, (key, value)) in props.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {value}", Ident(key))?;
    }
    f.write_char('}')
}

impl Display for NodePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_char('(')?;
        if let Some(var) = &self.var {
            write!(f, "{}", Ident(var))?;
        }
        for label in &self.labels {
            write!(f, ":{}", Ident(label))?;
        }
        write_props(f, &self.props)?;
        f.write_char(')')
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelPattern {
    pub var: Option<String>,
    /// Alternative relationship types (`:a|b`). Empty means any type.
    pub types: Vec<String>,
    pub length: Option<(u32, u32)>,
    pub props: Vec<(String, Literal)>,
    pub directed: bool,
}

impl Display for RelPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("-[")?;
        if let Some(var) = &self.var {
            write!(f, "{}", Ident(var))?;
        }
        for (i, t) in self.types.iter().enumerate() {
            f.write_char(if i == 0 { ':' } else { '|' })?;
            write!(f, "{}", Ident(t))?;
        }
        if let Some((min, max)) = self.length {
            write!(f, "*{min}..{max}")?;
        }
        write_props(f, &self.props)?;
        f.write_str(if self.directed { "]->" } else { "]-" })
    }
}

/// `(a)-[r]->(b)-[s]-(c)`
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub start: NodePattern,
    pub steps: Vec<(RelPattern, NodePattern)>,
}

impl PathPattern {
    pub fn node(start: NodePattern) -> Self {
        Self { start, steps: Vec::new() }
    }

    pub fn then(mut self, rel: RelPattern, node: NodePattern) -> Self {
        self.steps.push((rel, node));
        self
    }
}

impl Display for PathPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)?;
        for (rel, node) in &self.steps {
            write!(f, "{rel}{node}")?;
        }
        Ok(())
    }
}

/// `USING INDEX v:Label(property)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHint {
    pub var: String,
    pub label: String,
    pub property: String,
}

impl Display for IndexHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "USING INDEX {}:{}({})",
            Ident(&self.var),
            Ident(&self.label),
            Ident(&self.property)
        )
    }
}

// ============================================================================
// Clauses
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl Projection {
    /// Project a variable under its own name.
    pub fn var(name: impl Into<String>) -> Self {
        Self {
            expr: Expr::Var(name.into()),
            alias: None,
        }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }
}

impl Display for Projection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", Ident(alias))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match {
        optional: bool,
        patterns: Vec<PathPattern>,
        hints: Vec<IndexHint>,
        filter: Option<Expr>,
    },
    With {
        items: Vec<Projection>,
        filter: Option<Expr>,
    },
    Unwind {
        expr: Expr,
        alias: String,
    },
    /// `CALL { WITH imports <branch> UNION WITH imports <branch> }`
    Call {
        imports: Vec<String>,
        branches: Vec<Vec<Clause>>,
    },
    Return {
        items: Vec<Projection>,
        skip: Option<u64>,
        limit: Option<u64>,
    },
}

impl Clause {
    pub fn with_vars<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Clause::With {
            items: vars.into_iter().map(Projection::var).collect(),
            filter: None,
        }
    }

    pub fn return_vars<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Clause::Return {
            items: vars.into_iter().map(Projection::var).collect(),
            skip: None,
            limit: None,
        }
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Match {
                optional,
                patterns,
                hints,
                filter,
            } => {
                if *optional {
                    f.write_str("OPTIONAL ")?;
                }
                f.write_str("MATCH ")?;
                write_list(f, patterns, ", ")?;
                for hint in hints {
                    write!(f, " {hint}")?;
                }
                if let Some(filter) = filter {
                    write!(f, " WHERE {filter}")?;
                }
                Ok(())
            }
            Clause::With { items, filter } => {
                f.write_str("WITH ")?;
                write_list(f, items, ", ")?;
                if let Some(filter) = filter {
                    write!(f, " WHERE {filter}")?;
                }
                Ok(())
            }
            Clause::Unwind { expr, alias } => write!(f, "UNWIND {expr} AS {}", Ident(alias)),
            Clause::Call { imports, branches } => {
                f.write_str("CALL { ")?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" UNION ")?;
                    }
                    if !imports.is_empty() {
                        write!(f, "{} ", Clause::with_vars(imports.iter().cloned()))?;
                    }
                    write_list(f, branch, " ")?;
                }
                f.write_str(" }")
            }
            Clause::Return { items, skip, limit } => {
                f.write_str("RETURN ")?;
                write_list(f, items, ", ")?;
                if let Some(skip) = skip {
                    write!(f, " SKIP {skip}")?;
                }
                if let Some(limit) = limit {
                    write!(f, " LIMIT {limit}")?;
                }
                Ok(())
            }
        }
    }
}

/// Render a clause sequence as a single query string.
pub fn render(clauses: &[Clause]) -> String {
    let mut out = String::new();
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        // Writing into a String cannot fail.
        let _ = write!(out, "{clause}");
    }
    out
}
