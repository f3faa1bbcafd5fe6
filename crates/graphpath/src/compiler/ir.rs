use crate::model::QName;
pub use crate::parser::ast::{Axis, NodeTest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathStart {
    Context,
    Root,
    Filter(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    pub start: PathStart,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    String(String),
    Number(f64),
    Variable(QName),
    Call { name: QName, args: Vec<Expr> },
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare { op: CompareOp, left: Box<Expr>, right: Box<Expr> },
    Arithmetic { op: ArithOp, left: Box<Expr>, right: Box<Expr> },
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    /// Primary expression narrowed by predicates.
    Filter { primary: Box<Expr>, predicates: Vec<Expr> },
    Path(LocationPath),
}

/// Where a simple path starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Context,
    Root,
    Variable(QName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleStep {
    pub name: QName,
    pub attribute: bool,
}

/// Path made only of named `child`/`attribute` steps without predicates.
/// Evaluated by following first matches, it can also address locations
/// that do not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplePath {
    pub origin: Origin,
    pub steps: Vec<SimpleStep>,
}

/// An immutable compiled query, shared between contexts and threads.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    pub(crate) source: String,
    pub(crate) expr: Expr,
    pub(crate) simple: Option<SimplePath>,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Whether the expression denotes locations rather than computing a
    /// value: a location path, or a path starting from a filter expression.
    pub fn is_path(&self) -> bool {
        matches!(self.expr, Expr::Path(_) | Expr::Filter { .. })
    }

    /// Whether the expression may be materialized by `create_path`.
    pub fn is_simple_path(&self) -> bool {
        self.simple.is_some()
    }

    pub fn simple_path(&self) -> Option<&SimplePath> {
        self.simple.as_ref()
    }
}
