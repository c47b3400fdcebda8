//! Boolean query algebra: lowering `AND` / `OR` / `XOR` / `NOT` over leaf
//! query graphs into one Cypher statement.
//!
//! # Strategy
//!
//! - `AND` emits its children in order; each child sees the variables bound
//!   by the ones before it.
//! - `NOT`, `OR` and `XOR` emit their operands *optionally*, so a failed
//!   operand leaves its variables null instead of dropping the row. Emitting
//!   an operand yields its match condition; a final `WITH ... WHERE <logic>`
//!   keeps exactly the rows satisfying the boolean formula over them.
//! - An optional leaf matched when every variable it binds is non-null. A
//!   leaf that binds nothing new is not emitted at all; its condition is an
//!   `EXISTS { ... }` test over the variables already in scope.
//! - An optional leaf with a single MATCH becomes `OPTIONAL MATCH`. Anything
//!   bigger is wrapped in a `CALL {}` subquery that returns either every match
//!   or one all-null row.
//! - `OR` / `XOR` operands sharing variables are emitted twice, once per
//!   order, inside a `CALL { ... UNION ... }`, so neither operand can shadow
//!   the other's bindings. Each branch returns the two operand conditions as
//!   flag columns for the final filter.
//!
//! Operands of a `NOT` stay in scope and may be bound in surviving rows when
//! the negated formula is false for another reason.

use std::collections::BTreeSet;

use crate::cypher::{Clause, Expr, Literal, Projection};
use crate::error::Result;
use crate::pattern::{compile_leaf, CompileContext, Leaf};
use crate::qgraph::{QueryExpr, QueryGraph};

/// Leaves with this many referenced variables are always wrapped in a
/// subquery when optional.
const SUBQUERY_REFERENCE_THRESHOLD: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Plan {
    Leaf(Leaf),
    And(Vec<Plan>),
    Or(Pair),
    Xor(Pair),
    Not(Box<Plan>),
}

/// Operands of a binary connective.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pair {
    pub a: Box<Plan>,
    pub b: Box<Plan>,
    /// Pre-order position among all pairs; names the flags of a union.
    pub id: usize,
}

impl Pair {
    fn build(a: &QueryExpr, b: &QueryExpr, ctx: &CompileContext<'_>, pairs: &mut usize) -> Result<Self> {
        let id = *pairs;
        *pairs += 1;
        Ok(Self {
            a: Box::new(Plan::build_from(a, ctx, pairs)?),
            b: Box::new(Plan::build_from(b, ctx, pairs)?),
            id,
        })
    }

    fn flags(&self) -> (String, String) {
        (format!("_matched{}a", self.id), format!("_matched{}b", self.id))
    }
}

/// Emission state: variables already bound, and whether failure must be
/// tolerated.
#[derive(Debug, Clone, Default)]
struct Scope {
    bound: BTreeSet<String>,
    optional: bool,
}

impl Scope {
    fn optional(&self) -> Self {
        Self {
            bound: self.bound.clone(),
            optional: true,
        }
    }

    fn after(&self, plan: &Plan) -> Self {
        let mut next = self.clone();
        next.bound.extend(plan.qids());
        next
    }

    fn new_in(&self, plan: &Plan) -> BTreeSet<String> {
        plan.qids().difference(&self.bound).cloned().collect()
    }
}

/// Clauses of a lowered plan plus the row filter they need.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Emission {
    pub clauses: Vec<Clause>,
    /// `None` when every emitted row already satisfies the plan.
    pub filter: Option<Expr>,
    /// Flag columns bound by union subqueries and read by `filter`.
    pub flags: BTreeSet<String>,
}

impl Plan {
    pub fn build(expr: &QueryExpr, ctx: &CompileContext<'_>) -> Result<Self> {
        let mut pairs = 0;
        Self::build_from(expr, ctx, &mut pairs)
    }

    fn build_from(expr: &QueryExpr, ctx: &CompileContext<'_>, pairs: &mut usize) -> Result<Self> {
        Ok(match expr {
            QueryExpr::Graph(graph) => Plan::Leaf(compile_leaf(graph, ctx)?),
            QueryExpr::And(children) => {
                let mut plans = Vec::with_capacity(children.len());
                for child in children {
                    match Plan::build_from(child, ctx, pairs)? {
                        Plan::And(inner) => plans.extend(inner),
                        other => plans.push(other),
                    }
                }
                Plan::And(plans)
            }
            QueryExpr::Or(a, b) => Plan::Or(Pair::build(a, b, ctx, pairs)?),
            QueryExpr::Xor(a, b) => Plan::Xor(Pair::build(a, b, ctx, pairs)?),
            QueryExpr::Not(a) => Plan::Not(Box::new(Plan::build_from(a, ctx, pairs)?)),
        })
    }

    pub fn is_compound(&self) -> bool {
        !matches!(self, Plan::Leaf(_))
    }

    fn children(&self) -> Vec<&Plan> {
        match self {
            Plan::Leaf(_) => Vec::new(),
            Plan::And(children) => children.iter().collect(),
            Plan::Or(pair) | Plan::Xor(pair) => vec![pair.a.as_ref(), pair.b.as_ref()],
            Plan::Not(a) => vec![a.as_ref()],
        }
    }

    /// Variables defined by this plan.
    pub fn qids(&self) -> BTreeSet<String> {
        match self {
            Plan::Leaf(leaf) => leaf.qids.clone(),
            _ => self.children().into_iter().flat_map(Plan::qids).collect(),
        }
    }

    /// Variables defined or referenced by this plan. Always ⊇ `qids`.
    pub fn references(&self) -> BTreeSet<String> {
        match self {
            Plan::Leaf(leaf) => leaf.references.clone(),
            _ => self.children().into_iter().flat_map(Plan::references).collect(),
        }
    }

    /// Union of the (expanded) leaf graphs.
    pub fn graph(&self) -> QueryGraph {
        match self {
            Plan::Leaf(leaf) => leaf.graph.clone(),
            _ => {
                let mut merged = QueryGraph::new();
                for child in self.children() {
                    merged.merge(child.graph());
                }
                merged
            }
        }
    }

    pub fn emit(&self) -> Emission {
        let mut emitter = Emitter::default();
        let filter = emitter.plan(self, &Scope::default());
        Emission {
            clauses: emitter.clauses,
            filter,
            flags: emitter.flags,
        }
    }
}

// ============================================================================
// Emission
// ============================================================================

/// Lowers plans into clauses. Each step returns the condition under which
/// the lowered plan matched, or `None` when no row can survive without it.
#[derive(Debug, Default)]
struct Emitter {
    clauses: Vec<Clause>,
    flags: BTreeSet<String>,
}

impl Emitter {
    fn plan(&mut self, plan: &Plan, scope: &Scope) -> Option<Expr> {
        match plan {
            Plan::Leaf(leaf) => self.leaf(leaf, scope),
            Plan::And(children) => self.sequence(children.iter(), scope),
            Plan::Not(a) => Some(matched(self.plan(a, &scope.optional())).negate()),
            Plan::Or(pair) => {
                let (a, b) = self.pair(pair, &scope.optional());
                Some(Expr::Or(vec![a, b]))
            }
            Plan::Xor(pair) => {
                let (a, b) = self.pair(pair, &scope.optional());
                Some(Expr::Xor(vec![a, b]))
            }
        }
    }

    fn sequence<'a>(&mut self, plans: impl Iterator<Item = &'a Plan>, scope: &Scope) -> Option<Expr> {
        let mut scope = scope.clone();
        let mut conditions = Vec::new();
        for plan in plans {
            conditions.extend(self.plan(plan, &scope));
            scope = scope.after(plan);
        }
        Expr::all(conditions)
    }

    fn pair(&mut self, pair: &Pair, scope: &Scope) -> (Expr, Expr) {
        let (a, b) = (pair.a.as_ref(), pair.b.as_ref());
        let independent = scope.new_in(a).is_disjoint(&b.references())
            && scope.new_in(b).is_disjoint(&a.references());
        if !independent {
            return self.union(pair, scope);
        }
        let first = matched(self.plan(a, scope));
        let second = matched(self.plan(b, &scope.after(a)));
        (first, second)
    }

    /// `CALL { a; b RETURN ... UNION b; a RETURN ... }`
    fn union(&mut self, pair: &Pair, scope: &Scope) -> (Expr, Expr) {
        let (a, b) = (pair.a.as_ref(), pair.b.as_ref());
        let mut references = a.references();
        references.extend(b.references());
        let mut defined = a.qids();
        defined.extend(b.qids());

        let imports: BTreeSet<String> = references.intersection(&scope.bound).cloned().collect();
        let exports: Vec<String> = defined.difference(&scope.bound).cloned().collect();
        let (flag_a, flag_b) = pair.flags();

        let inner = Scope {
            bound: imports.clone(),
            optional: true,
        };
        let branch = |first: &Plan, second: &Plan, a_first: bool| {
            let mut emitter = Emitter::default();
            let first_matched = matched(emitter.plan(first, &inner));
            let second_matched = matched(emitter.plan(second, &inner.after(first)));
            let (cond_a, cond_b) = if a_first {
                (first_matched, second_matched)
            } else {
                (second_matched, first_matched)
            };

            let mut items: Vec<Projection> = exports.iter().cloned().map(Projection::var).collect();
            items.push(Projection::aliased(cond_a, flag_a.clone()));
            items.push(Projection::aliased(cond_b, flag_b.clone()));
            let mut clauses = emitter.clauses;
            clauses.push(Clause::Return {
                items,
                skip: None,
                limit: None,
            });
            clauses
        };

        self.clauses.push(Clause::Call {
            imports: imports.iter().cloned().collect(),
            branches: vec![branch(a, b, true), branch(b, a, false)],
        });
        self.flags.insert(flag_a.clone());
        self.flags.insert(flag_b.clone());
        (Expr::var(flag_a), Expr::var(flag_b))
    }

    fn leaf(&mut self, leaf: &Leaf, scope: &Scope) -> Option<Expr> {
        if !scope.optional {
            self.clauses.extend(leaf.clauses.iter().cloned());
            return None;
        }

        let exports: Vec<String> = leaf.qids.difference(&scope.bound).cloned().collect();
        if exports.is_empty() {
            // Nothing new to bind: test the pattern against the current row.
            return Some(if leaf.clauses.is_empty() {
                Expr::Lit(Literal::Bool(true))
            } else {
                Expr::Exists(leaf.clauses.clone())
            });
        }
        let condition = Expr::And(exports.iter().map(|q| Expr::var(q.clone()).is_not_null()).collect());

        let single_match = leaf.clauses.len() == 1 && leaf.references.len() < SUBQUERY_REFERENCE_THRESHOLD;
        if single_match {
            self.clauses.extend(leaf.clauses.iter().cloned().map(|clause| match clause {
                Clause::Match {
                    patterns,
                    hints,
                    filter,
                    ..
                } => Clause::Match {
                    optional: true,
                    patterns,
                    hints,
                    filter,
                },
                other => other,
            }));
            return Some(condition);
        }

        // collect-or-null: keep every match, or one row of nulls when there is none.
        let mut body = leaf.clauses.clone();
        body.push(Clause::With {
            items: vec![Projection::aliased(
                Expr::Case {
                    when: Box::new(Expr::Gt(Box::new(Expr::CountAll), Box::new(Expr::Lit(Literal::Int(0))))),
                    then: Box::new(Expr::Collect(Box::new(Expr::List(
                        exports.iter().map(|q| Expr::var(q.clone())).collect(),
                    )))),
                    otherwise: Box::new(Expr::List(vec![Expr::List(Vec::new())])),
                },
                "results",
            )],
            filter: None,
        });
        body.push(Clause::Unwind {
            expr: Expr::var("results"),
            alias: "result".to_string(),
        });
        body.push(Clause::Return {
            items: exports
                .iter()
                .enumerate()
                .map(|(i, q)| Projection::aliased(Expr::Index(Box::new(Expr::var("result")), i), q.clone()))
                .collect(),
            skip: None,
            limit: None,
        });

        self.clauses.push(Clause::Call {
            imports: leaf.references.intersection(&scope.bound).cloned().collect(),
            branches: vec![body],
        });
        Some(condition)
    }
}

/// A missing condition means the operand cannot fail.
fn matched(condition: Option<Expr>) -> Expr {
    condition.unwrap_or(Expr::Lit(Literal::Bool(true)))
}
