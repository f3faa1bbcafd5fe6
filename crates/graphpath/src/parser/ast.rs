//! Surface syntax tree produced by the parser. Abbreviations (`//`, `.`,
//! `..`, `@`) are kept as written; the compiler normalizes them.
use crate::model::QName;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Union,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Attribute,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Descendant,
    DescendantOrSelf,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "child" => Axis::Child,
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return None,
        })
    }

    /// Axes that walk towards the root or backwards, where `position()`
    /// counts in reverse document order.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf | Axis::PrecedingSibling
        )
    }
}

/// Node test with the prefix still unresolved; prefixes are resolved per
/// evaluation since compiled expressions are shared between contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(QName),
    AnyName,
    Prefix(String),
    Node,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Axis { axis: Axis, test: NodeTest, predicates: Vec<Expr> },
    /// `..`
    Parent,
    /// `.`
    SelfNode,
    /// The implicit step of a `//` separator.
    DescendantOrSelf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathStart {
    Relative,
    Root,
    Filter(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub start: PathStart,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    VarRef(QName),
    FunctionCall {
        name: QName,
        args: Vec<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
    },
    Path(PathExpr),
}
