//! Lowering of the surface syntax tree into [`ir::CompiledExpression`].
use crate::error::Error;
use crate::model::QName;
use crate::parser::{ast, parse_path};

pub mod ir;

pub use ir::CompiledExpression;

/// Parse and lower `source`.
pub fn compile(source: &str) -> Result<CompiledExpression, Error> {
    let ast = parse_path(source).map_err(|err| Error::Compile {
        query: source.to_string(),
        position: err.position,
        message: err.message,
    })?;
    let expr = lower_expr(&ast);
    let simple = simple_path(&expr);
    Ok(CompiledExpression { source: source.to_string(), expr, simple })
}

fn lower_expr(expr: &ast::Expr) -> ir::Expr {
    use ast::Expr as E;
    match expr {
        E::Literal(ast::Literal::String(s)) => ir::Expr::String(s.clone()),
        E::Literal(ast::Literal::Number(n)) => ir::Expr::Number(*n),
        E::VarRef(name) => ir::Expr::Variable(name.clone()),
        E::FunctionCall { name, args } => {
            ir::Expr::Call { name: name.clone(), args: args.iter().map(lower_expr).collect() }
        }
        E::Binary { left, op, right } => lower_binary(*op, lower_expr(left), lower_expr(right)),
        E::Negate(inner) => ir::Expr::Negate(Box::new(lower_expr(inner))),
        E::Filter { primary, predicates } => ir::Expr::Filter {
            primary: Box::new(lower_expr(primary)),
            predicates: predicates.iter().map(lower_expr).collect(),
        },
        E::Path(path) => {
            let start = match &path.start {
                ast::PathStart::Relative => ir::PathStart::Context,
                ast::PathStart::Root => ir::PathStart::Root,
                ast::PathStart::Filter(primary) => ir::PathStart::Filter(Box::new(lower_expr(primary))),
            };
            ir::Expr::Path(ir::LocationPath { start, steps: path.steps.iter().map(lower_step).collect() })
        }
    }
}

fn lower_binary(op: ast::BinaryOp, left: ir::Expr, right: ir::Expr) -> ir::Expr {
    use ast::BinaryOp as B;
    let (left, right) = (Box::new(left), Box::new(right));
    let compare = match op {
        B::Or => return ir::Expr::Or(left, right),
        B::And => return ir::Expr::And(left, right),
        B::Union => return ir::Expr::Union(left, right),
        B::Add => return ir::Expr::Arithmetic { op: ir::ArithOp::Add, left, right },
        B::Sub => return ir::Expr::Arithmetic { op: ir::ArithOp::Sub, left, right },
        B::Mul => return ir::Expr::Arithmetic { op: ir::ArithOp::Mul, left, right },
        B::Div => return ir::Expr::Arithmetic { op: ir::ArithOp::Div, left, right },
        B::Mod => return ir::Expr::Arithmetic { op: ir::ArithOp::Mod, left, right },
        B::Eq => ir::CompareOp::Eq,
        B::Ne => ir::CompareOp::Ne,
        B::Lt => ir::CompareOp::Lt,
        B::Le => ir::CompareOp::Le,
        B::Gt => ir::CompareOp::Gt,
        B::Ge => ir::CompareOp::Ge,
    };
    ir::Expr::Compare { op: compare, left, right }
}

fn lower_step(step: &ast::Step) -> ir::Step {
    match step {
        ast::Step::Axis { axis, test, predicates } => ir::Step {
            axis: *axis,
            test: test.clone(),
            predicates: predicates.iter().map(lower_expr).collect(),
        },
        ast::Step::Parent => bare(ast::Axis::Parent),
        ast::Step::SelfNode => bare(ast::Axis::SelfAxis),
        ast::Step::DescendantOrSelf => bare(ast::Axis::DescendantOrSelf),
    }
}

fn bare(axis: ast::Axis) -> ir::Step {
    ir::Step { axis, test: ast::NodeTest::Node, predicates: Vec::new() }
}

/// The simple-path form of `expr`, if it has one: a location path (or a
/// variable reference followed by a path) whose steps are all named
/// `child`/`attribute` steps without predicates.
fn simple_path(expr: &ir::Expr) -> Option<ir::SimplePath> {
    let (origin, steps) = match expr {
        ir::Expr::Variable(name) => (ir::Origin::Variable(name.clone()), &[][..]),
        ir::Expr::Path(path) => {
            let origin = match &path.start {
                ir::PathStart::Context => ir::Origin::Context,
                ir::PathStart::Root => ir::Origin::Root,
                ir::PathStart::Filter(primary) => match primary.as_ref() {
                    ir::Expr::Variable(name) => ir::Origin::Variable(name.clone()),
                    _ => return None,
                },
            };
            (origin, path.steps.as_slice())
        }
        _ => return None,
    };
    let steps = steps
        .iter()
        .map(|step| match (&step.axis, &step.test) {
            (ast::Axis::Child | ast::Axis::Attribute, ast::NodeTest::Name(name))
                if step.predicates.is_empty() =>
            {
                Some(ir::SimpleStep { name: name.clone(), attribute: step.axis == ast::Axis::Attribute })
            }
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(ir::SimplePath { origin, steps })
}

/// Names of all variables an expression reads, in first-use order.
pub fn used_variables(compiled: &CompiledExpression) -> Vec<QName> {
    fn walk(expr: &ir::Expr, out: &mut Vec<QName>) {
        match expr {
            ir::Expr::Variable(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            ir::Expr::String(_) | ir::Expr::Number(_) => {}
            ir::Expr::Call { args, .. } => args.iter().for_each(|arg| walk(arg, out)),
            ir::Expr::Or(left, right) | ir::Expr::And(left, right) | ir::Expr::Union(left, right) => {
                walk(left, out);
                walk(right, out);
            }
            ir::Expr::Compare { left, right, .. } | ir::Expr::Arithmetic { left, right, .. } => {
                walk(left, out);
                walk(right, out);
            }
            ir::Expr::Negate(inner) => walk(inner, out),
            ir::Expr::Filter { primary, predicates } => {
                walk(primary, out);
                predicates.iter().for_each(|p| walk(p, out));
            }
            ir::Expr::Path(path) => {
                if let ir::PathStart::Filter(primary) = &path.start {
                    walk(primary, out);
                }
                for step in &path.steps {
                    step.predicates.iter().for_each(|p| walk(p, out));
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(&compiled.expr, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_are_normalized() {
        let compiled = compile("a//b/..").expect("compile");
        let ir::Expr::Path(path) = compiled.expr() else { panic!("path expected") };
        let axes: Vec<ast::Axis> = path.steps.iter().map(|s| s.axis).collect();
        assert_eq!(
            axes,
            vec![ast::Axis::Child, ast::Axis::DescendantOrSelf, ast::Axis::Child, ast::Axis::Parent]
        );
        assert!(compiled.is_path());
        assert!(!compiled.is_simple_path());
    }

    #[test]
    fn simple_path_detection() {
        assert!(compile("a/b/@c").expect("compile").is_simple_path());
        assert!(compile("/a").expect("compile").is_simple_path());
        assert!(compile("$v/a").expect("compile").is_simple_path());
        assert!(!compile("a[1]/b").expect("compile").is_simple_path());
        assert!(!compile("a[@x='1']").expect("compile").is_simple_path());
        assert!(!compile("a/*").expect("compile").is_simple_path());
        assert!(!compile("1 + 2").expect("compile").is_simple_path());
        assert!(!compile("1 + 2").expect("compile").is_path());
    }

    #[test]
    fn compile_errors_name_the_query() {
        let err = compile("a[").expect_err("must fail");
        assert_eq!(err.query(), "a[");
        assert!(matches!(err, Error::Compile { position: 3, .. }));
    }

    #[test]
    fn variables_are_collected_once() {
        let compiled = compile("$a + $b[$a > 1]").expect("compile");
        assert_eq!(used_variables(&compiled), vec![QName::local("a"), QName::local("b")]);
    }
}
