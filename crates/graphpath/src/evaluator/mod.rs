//! Evaluation of compiled expressions against a bound graph.
//!
//! Results come in three shapes ([`Computed`]): a plain value, a node set
//! in document order, or a single pointer. Simple paths produce a pointer
//! (possibly to a location that does not exist yet); every other location
//! path produces a node set.
use std::collections::HashSet;

use crate::compiler::CompiledExpression;
use crate::compiler::ir::{ArithOp, Axis, Expr, LocationPath, NodeTest as TestIR, PathStart, Step};
use crate::context::Context;
use crate::error::EvalError;
use crate::functions::CallCtx;
use crate::model::{NodeKind, NodeTest, Pointer, QName};
use crate::registry;
use crate::value::Value;

mod compare;
mod simple_path;

/// Outcome of evaluating an expression.
#[derive(Debug, Clone)]
pub enum Computed {
    Value(Value),
    /// Node set, sorted in document order without duplicates.
    Nodes(Vec<Pointer>),
    /// A single location, which need not exist.
    Pointer(Pointer),
}

impl Computed {
    /// Members when the result is a node set; a pointer contributes its
    /// items.
    pub fn nodes(&self) -> Option<Vec<Pointer>> {
        match self {
            Computed::Value(_) => None,
            Computed::Nodes(nodes) => Some(nodes.clone()),
            Computed::Pointer(pointer) => Some(pointer.items()),
        }
    }

    pub fn into_nodes(self) -> Option<Vec<Pointer>> {
        match self {
            Computed::Value(_) => None,
            Computed::Nodes(nodes) => Some(nodes),
            Computed::Pointer(pointer) => Some(pointer.items()),
        }
    }

    pub fn is_node_set(&self) -> bool {
        !matches!(self, Computed::Value(_))
    }

    pub fn string_value(&self) -> String {
        match self {
            Computed::Value(value) => value.string_value(),
            Computed::Nodes(nodes) => nodes.first().map(|n| n.value().string_value()).unwrap_or_default(),
            Computed::Pointer(pointer) => pointer.value().string_value(),
        }
    }

    pub fn number_value(&self) -> f64 {
        match self {
            Computed::Value(value) => value.number_value(),
            Computed::Nodes(nodes) => nodes.first().map_or(f64::NAN, |n| n.value().number_value()),
            Computed::Pointer(pointer) => pointer.value().number_value(),
        }
    }

    pub fn boolean_value(&self) -> bool {
        match self {
            Computed::Value(value) => value.boolean_value(),
            Computed::Nodes(nodes) => !nodes.is_empty(),
            Computed::Pointer(pointer) if pointer.is_collection() => !pointer.items().is_empty(),
            Computed::Pointer(pointer) => pointer.value().boolean_value(),
        }
    }

    /// Plain value: the first node's value for node sets, `Null` when
    /// empty.
    pub fn into_value(self) -> Value {
        match self {
            Computed::Value(value) => value,
            Computed::Nodes(nodes) => nodes.first().map(Pointer::value).unwrap_or_default(),
            Computed::Pointer(pointer) => pointer.value(),
        }
    }
}

impl From<Value> for Computed {
    fn from(value: Value) -> Self {
        Computed::Value(value)
    }
}

/// A context together with the pointer evaluation starts from.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    context: &'a Context<'a>,
    pointer: Pointer,
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(context: &'a Context<'a>, pointer: Pointer) -> Self {
        EvalContext { context, pointer }
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub fn context(&self) -> &'a Context<'a> {
        self.context
    }

    /// Value computation used by pointer-oriented operations: simple paths
    /// resolve to a single, possibly non-actual, pointer.
    pub fn compute(&self, compiled: &CompiledExpression) -> Result<Computed, EvalError> {
        match compiled.simple_path() {
            Some(path) => Ok(Computed::Pointer(simple_path::interpret(self, path))),
            None => self.evaluate(compiled),
        }
    }

    /// General evaluation; location paths always yield node sets.
    pub fn evaluate(&self, compiled: &CompiledExpression) -> Result<Computed, EvalError> {
        let focus = Focus { node: self.pointer.clone(), position: 1, size: 1 };
        Evaluator { context: self.context }.eval(compiled.expr(), &focus)
    }
}

struct Focus {
    node: Pointer,
    position: usize,
    size: usize,
}

struct Evaluator<'a> {
    context: &'a Context<'a>,
}

#[allow(clippy::cast_precision_loss)]
fn position_number(position: usize) -> f64 {
    position as f64
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr, focus: &Focus) -> Result<Computed, EvalError> {
        match expr {
            Expr::String(s) => Ok(Computed::Value(Value::String(s.clone()))),
            Expr::Number(n) => Ok(Computed::Value(Value::Number(*n))),
            Expr::Variable(name) => {
                let pointer = self.context.variable_pointer(name);
                pointer.try_value()?;
                Ok(Computed::Pointer(pointer))
            }
            Expr::Call { name, args } => {
                let values = args.iter().map(|arg| self.eval(arg, focus)).collect::<Result<Vec<_>, _>>()?;
                let function = self.context.function(name, values.len())?;
                let call = CallCtx {
                    context: self.context,
                    node: &focus.node,
                    position: focus.position,
                    size: focus.size,
                };
                function(&call, &values)
            }
            Expr::Or(left, right) => {
                let result = self.eval(left, focus)?.boolean_value() || self.eval(right, focus)?.boolean_value();
                Ok(Computed::Value(Value::Bool(result)))
            }
            Expr::And(left, right) => {
                let result = self.eval(left, focus)?.boolean_value() && self.eval(right, focus)?.boolean_value();
                Ok(Computed::Value(Value::Bool(result)))
            }
            Expr::Compare { op, left, right } => {
                let (left, right) = (self.eval(left, focus)?, self.eval(right, focus)?);
                Ok(Computed::Value(Value::Bool(compare::compare(*op, &left, &right))))
            }
            Expr::Arithmetic { op, left, right } => {
                let a = self.eval(left, focus)?.number_value();
                let b = self.eval(right, focus)?.number_value();
                let result = match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                    ArithOp::Mod => a % b,
                };
                Ok(Computed::Value(Value::Number(result)))
            }
            Expr::Negate(inner) => Ok(Computed::Value(Value::Number(-self.eval(inner, focus)?.number_value()))),
            Expr::Union(left, right) => {
                let mut nodes = self.node_set(left, focus, "|")?;
                nodes.extend(self.node_set(right, focus, "|")?);
                nodes.sort();
                nodes.dedup();
                Ok(Computed::Nodes(nodes))
            }
            Expr::Filter { primary, predicates } => {
                let computed = self.eval(primary, focus)?;
                if predicates.is_empty() {
                    return Ok(computed);
                }
                let nodes = self.expand(computed);
                Ok(Computed::Nodes(self.apply_predicates(nodes, predicates)?))
            }
            Expr::Path(path) => self.eval_path(path, focus).map(Computed::Nodes),
        }
    }

    fn node_set(&self, expr: &Expr, focus: &Focus, operator: &str) -> Result<Vec<Pointer>, EvalError> {
        self.eval(expr, focus)?
            .into_nodes()
            .ok_or_else(|| EvalError::Type(format!("operands of '{operator}' must be node-sets")))
    }

    /// Nodes a computed result contributes as a path start; plain values
    /// are wrapped in a pointer of their own.
    fn expand(&self, computed: Computed) -> Vec<Pointer> {
        match computed {
            Computed::Value(Value::Null) => Vec::new(),
            Computed::Value(value) => registry::new_pointer(None, value, &self.context.locale()).items(),
            other => other.into_nodes().unwrap_or_default(),
        }
    }

    fn eval_path(&self, path: &LocationPath, focus: &Focus) -> Result<Vec<Pointer>, EvalError> {
        let mut current = match &path.start {
            PathStart::Context => vec![focus.node.clone()],
            PathStart::Root => vec![self.context.root_pointer().clone()],
            PathStart::Filter(primary) => {
                let computed = self.eval(primary, focus)?;
                self.expand(computed)
            }
        };
        for step in &path.steps {
            if current.is_empty() {
                break;
            }
            current = self.eval_step(step, &current)?;
        }
        Ok(current)
    }

    fn eval_step(&self, step: &Step, input: &[Pointer]) -> Result<Vec<Pointer>, EvalError> {
        let test = self.resolve_test(&step.test);
        let mut out = Vec::new();
        for node in input {
            let candidates: Vec<Pointer> =
                axis_nodes(node, step.axis).into_iter().filter(|c| test.matches(c)).collect();
            out.extend(self.apply_predicates(candidates, &step.predicates)?);
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    /// Filter `nodes` (in axis order) by each predicate in turn; positions
    /// restart for every predicate.
    fn apply_predicates(&self, mut nodes: Vec<Pointer>, predicates: &[Expr]) -> Result<Vec<Pointer>, EvalError> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(size);
            for (i, node) in nodes.into_iter().enumerate() {
                let focus = Focus { node, position: i + 1, size };
                if predicate_holds(&self.eval(predicate, &focus)?, focus.position) {
                    kept.push(focus.node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    fn resolve_test(&self, test: &TestIR) -> NodeTest {
        match test {
            TestIR::Name(name) => NodeTest::Name(resolve_name(self.context, name)),
            TestIR::AnyName => NodeTest::AnyName,
            TestIR::Prefix(prefix) => NodeTest::Prefix {
                prefix: prefix.as_str().into(),
                ns_uri: self.context.namespace_uri(prefix).map(Into::into),
            },
            TestIR::Node => NodeTest::Node,
            TestIR::Text => NodeTest::Text,
        }
    }
}

/// Numbers select by position, anything else by its boolean value.
fn predicate_holds(result: &Computed, position: usize) -> bool {
    match result {
        Computed::Value(Value::Number(n)) => *n == position_number(position),
        Computed::Pointer(pointer) if !pointer.is_collection() => match pointer.value() {
            Value::Number(n) => n == position_number(position),
            other => other.boolean_value(),
        },
        other => other.boolean_value(),
    }
}

/// `name` with its prefix resolved against the context's namespaces.
pub(crate) fn resolve_name(context: &Context<'_>, name: &QName) -> QName {
    match &name.prefix {
        Some(prefix) => name.clone().with_ns_uri(context.namespace_uri(prefix).as_deref()),
        None => name.clone(),
    }
}

/// Nodes along `axis` from `node`, in axis order (reverse document order
/// for reverse axes).
fn axis_nodes(node: &Pointer, axis: Axis) -> Vec<Pointer> {
    match axis {
        Axis::Child => node.children(),
        Axis::Attribute => node.attributes(),
        Axis::SelfAxis => vec![node.clone()],
        Axis::Parent => node.structural_parent().into_iter().collect(),
        Axis::Ancestor | Axis::AncestorOrSelf => {
            let mut out = Vec::new();
            if axis == Axis::AncestorOrSelf {
                out.push(node.clone());
            }
            let mut current = node.structural_parent();
            while let Some(parent) = current {
                current = parent.structural_parent();
                out.push(parent);
            }
            out
        }
        Axis::Descendant | Axis::DescendantOrSelf => {
            let mut out = Vec::new();
            if axis == Axis::DescendantOrSelf {
                out.push(node.clone());
            }
            let mut visiting = HashSet::new();
            collect_descendants(node, &mut visiting, &mut out);
            out
        }
        Axis::FollowingSibling | Axis::PrecedingSibling => {
            if node.kind() == NodeKind::Attribute {
                return Vec::new();
            }
            let Some(parent) = node.structural_parent() else {
                return Vec::new();
            };
            let this = node.structural();
            let siblings = parent.children().into_iter();
            if axis == Axis::FollowingSibling {
                siblings.filter(|sibling| *sibling > this).collect()
            } else {
                let mut preceding: Vec<Pointer> = siblings.filter(|sibling| *sibling < this).collect();
                preceding.reverse();
                preceding
            }
        }
    }
}

/// Pre-order walk of the children of `node`. Graph objects already on the
/// current path are not entered again.
fn collect_descendants(node: &Pointer, visiting: &mut HashSet<usize>, out: &mut Vec<Pointer>) {
    let identity = node.node().identity();
    if identity != 0 && !visiting.insert(identity) {
        return;
    }
    for child in node.children() {
        out.push(child.clone());
        collect_descendants(&child, visiting, out);
    }
    if identity != 0 {
        visiting.remove(&identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;

    fn context(json: serde_json::Value) -> Context<'static> {
        ContextBuilder::new(Value::from_json(&json)).build()
    }

    fn eval(context: &Context<'_>, query: &str) -> Computed {
        let compiled = context.compile(query).expect("compile");
        context.eval_context().evaluate(&compiled).expect("evaluate")
    }

    #[test]
    fn simple_paths_compute_to_pointers() {
        let ctx = context(serde_json::json!({ "a": { "b": 1 } }));
        let compiled = ctx.compile("a/b").expect("compile");
        let computed = ctx.eval_context().compute(&compiled).expect("compute");
        assert!(matches!(computed, Computed::Pointer(_)));
        assert!(matches!(ctx.eval_context().evaluate(&compiled).expect("eval"), Computed::Nodes(_)));
    }

    #[test]
    fn arithmetic_and_logic() {
        let ctx = context(serde_json::json!({ "n": 7 }));
        assert_eq!(eval(&ctx, "n mod 4 + 1").number_value(), 4.0);
        assert_eq!(eval(&ctx, "-n div 2").number_value(), -3.5);
        assert!(eval(&ctx, "n > 5 and not(n = 8)").boolean_value());
        assert!(!eval(&ctx, "missing or false()").boolean_value());
    }

    #[test]
    fn self_referencing_graphs_terminate() {
        let root = Value::map([("name", Value::from("root"))]);
        if let Value::Map(map) = &root {
            map.write().insert("me".into(), root.clone());
        }
        let ctx = ContextBuilder::new(root).build();
        let names = eval(&ctx, "//name").nodes().expect("node set");
        assert!(!names.is_empty());
    }
}
