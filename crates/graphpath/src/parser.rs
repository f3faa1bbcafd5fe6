use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;

use crate::model::QName;

pub mod ast;

#[derive(pest_derive::Parser)]
#[grammar = "path.pest"]
pub struct PathParser;

/// Syntax error with the 1-based character position it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    fn at(input: &str, byte_offset: usize, message: impl Into<String>) -> Self {
        let position = input[..byte_offset.min(input.len())].chars().count() + 1;
        ParseError { position, message: message.into() }
    }

    fn unexpected(pair: &Pair<Rule>) -> Self {
        let (line, column) = pair.line_col();
        ParseError {
            position: column,
            message: format!("unexpected {:?} on line {line}", pair.as_rule()),
        }
    }
}

/// Parse `input` into the surface syntax tree.
pub fn parse_path(input: &str) -> Result<ast::Expr, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError { position: 1, message: "empty expression".into() });
    }
    let mut pairs = PathParser::parse(Rule::query, input).map_err(|err| {
        let offset = match err.location {
            InputLocation::Pos(pos) => pos,
            InputLocation::Span((start, _)) => start,
        };
        ParseError::at(input, offset, describe(&err.variant))
    })?;
    let query = pairs.next().ok_or_else(|| ParseError::at(input, 0, "empty parse"))?;
    let expr = query
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::at(input, 0, "missing expression"))?;
    build_expr(expr)
}

fn describe(variant: &pest::error::ErrorVariant<Rule>) -> String {
    match variant {
        pest::error::ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let expected: Vec<String> = positives.iter().map(|rule| format!("{rule:?}")).collect();
            format!("expected {}", expected.join(" or "))
        }
        pest::error::ErrorVariant::ParsingError { .. } => "unexpected input".into(),
        pest::error::ErrorVariant::CustomError { message } => message.clone(),
    }
}

fn build_expr(pair: Pair<Rule>) -> Result<ast::Expr, ParseError> {
    match pair.as_rule() {
        Rule::expr => first_inner(pair).and_then(build_expr),
        Rule::or_expr
        | Rule::and_expr
        | Rule::equality_expr
        | Rule::relational_expr
        | Rule::additive_expr
        | Rule::multiplicative_expr => fold_binary(pair),
        Rule::unary_expr => {
            let mut negations = 0usize;
            let mut operand = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::minus => negations += 1,
                    _ => operand = Some(build_expr(inner)?),
                }
            }
            let mut expr = operand.ok_or_else(|| ParseError { position: 1, message: "missing operand".into() })?;
            for _ in 0..negations {
                expr = ast::Expr::Negate(Box::new(expr));
            }
            Ok(expr)
        }
        Rule::union_expr => {
            let mut inners = pair.into_inner();
            let first = inners.next().ok_or_else(|| ParseError { position: 1, message: "missing path".into() })?;
            let mut expr = build_expr(first)?;
            for right in inners {
                expr = ast::Expr::Binary {
                    left: Box::new(expr),
                    op: ast::BinaryOp::Union,
                    right: Box::new(build_expr(right)?),
                };
            }
            Ok(expr)
        }
        Rule::path_expr => first_inner(pair).and_then(build_expr),
        Rule::filter_path => build_filter_path(pair),
        Rule::location_path => first_inner(pair).and_then(build_location_path),
        Rule::primary_expr => first_inner(pair).and_then(build_primary),
        _ => Err(ParseError::unexpected(&pair)),
    }
}

fn first_inner(pair: Pair<Rule>) -> Result<Pair<Rule>, ParseError> {
    let fallback = ParseError::unexpected(&pair);
    pair.into_inner().next().ok_or(fallback)
}

/// Left-associative chain `operand (op operand)*`.
fn fold_binary(pair: Pair<Rule>) -> Result<ast::Expr, ParseError> {
    let mut inners = pair.into_inner();
    let first = inners.next().ok_or_else(|| ParseError { position: 1, message: "missing operand".into() })?;
    let mut expr = build_expr(first)?;
    while let Some(op_pair) = inners.next() {
        let op = binary_op(&op_pair)?;
        let right = inners.next().ok_or_else(|| ParseError::unexpected(&op_pair))?;
        expr = ast::Expr::Binary { left: Box::new(expr), op, right: Box::new(build_expr(right)?) };
    }
    Ok(expr)
}

fn binary_op(pair: &Pair<Rule>) -> Result<ast::BinaryOp, ParseError> {
    use ast::BinaryOp as Op;
    Ok(match (pair.as_rule(), pair.as_str().trim()) {
        (Rule::K_OR, _) => Op::Or,
        (Rule::K_AND, _) => Op::And,
        (Rule::equality_op, "=") => Op::Eq,
        (Rule::equality_op, _) => Op::Ne,
        (Rule::relational_op, "<") => Op::Lt,
        (Rule::relational_op, "<=") => Op::Le,
        (Rule::relational_op, ">") => Op::Gt,
        (Rule::relational_op, _) => Op::Ge,
        (Rule::additive_op, "+") => Op::Add,
        (Rule::additive_op, _) => Op::Sub,
        (Rule::multiplicative_op, "*") => Op::Mul,
        (Rule::multiplicative_op, text) if text.starts_with("div") => Op::Div,
        (Rule::multiplicative_op, _) => Op::Mod,
        _ => return Err(ParseError::unexpected(pair)),
    })
}

fn build_filter_path(pair: Pair<Rule>) -> Result<ast::Expr, ParseError> {
    let mut inners = pair.into_inner();
    let filter = inners.next().ok_or_else(|| ParseError { position: 1, message: "missing primary".into() })?;
    let mut filter_inners = filter.into_inner();
    let primary_pair =
        filter_inners.next().ok_or_else(|| ParseError { position: 1, message: "missing primary".into() })?;
    let primary = build_expr(primary_pair)?;
    let predicates = filter_inners.map(build_predicate).collect::<Result<Vec<_>, _>>()?;
    let filtered = if predicates.is_empty() {
        primary
    } else {
        ast::Expr::Filter { primary: Box::new(primary), predicates }
    };

    let Some(separator) = inners.next() else {
        return Ok(filtered);
    };
    let mut steps = Vec::new();
    if separator.as_str() == "//" {
        steps.push(ast::Step::DescendantOrSelf);
    }
    let relative = inners.next().ok_or_else(|| ParseError::unexpected(&separator))?;
    collect_steps(relative, &mut steps)?;
    Ok(ast::Expr::Path(ast::PathExpr { start: ast::PathStart::Filter(Box::new(filtered)), steps }))
}

fn build_location_path(pair: Pair<Rule>) -> Result<ast::Expr, ParseError> {
    let mut steps = Vec::new();
    let start = match pair.as_rule() {
        Rule::absolute_path => {
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::root => {}
                    Rule::root_descendant => steps.push(ast::Step::DescendantOrSelf),
                    _ => collect_steps(inner, &mut steps)?,
                }
            }
            ast::PathStart::Root
        }
        Rule::relative_path => {
            collect_steps(pair, &mut steps)?;
            ast::PathStart::Relative
        }
        _ => return Err(ParseError::unexpected(&pair)),
    };
    Ok(ast::Expr::Path(ast::PathExpr { start, steps }))
}

fn collect_steps(relative: Pair<Rule>, steps: &mut Vec<ast::Step>) -> Result<(), ParseError> {
    for inner in relative.into_inner() {
        match inner.as_rule() {
            Rule::path_sep if inner.as_str() == "//" => steps.push(ast::Step::DescendantOrSelf),
            Rule::path_sep => {}
            Rule::step => steps.push(build_step(inner)?),
            _ => return Err(ParseError::unexpected(&inner)),
        }
    }
    Ok(())
}

fn build_step(pair: Pair<Rule>) -> Result<ast::Step, ParseError> {
    let inner = first_inner(pair)?;
    match inner.as_rule() {
        Rule::abbrev_parent => Ok(ast::Step::Parent),
        Rule::abbrev_self => Ok(ast::Step::SelfNode),
        Rule::axis_step => {
            let mut axis = ast::Axis::Child;
            let mut test = None;
            let mut predicates = Vec::new();
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::axis_spec => axis = build_axis(part)?,
                    Rule::node_test => test = Some(build_node_test(part)?),
                    Rule::predicate => predicates.push(build_predicate(part)?),
                    _ => return Err(ParseError::unexpected(&part)),
                }
            }
            let test = test.ok_or_else(|| ParseError { position: 1, message: "missing node test".into() })?;
            Ok(ast::Step::Axis { axis, test, predicates })
        }
        _ => Err(ParseError::unexpected(&inner)),
    }
}

fn build_axis(pair: Pair<Rule>) -> Result<ast::Axis, ParseError> {
    let inner = first_inner(pair)?;
    match inner.as_rule() {
        Rule::abbrev_attribute => Ok(ast::Axis::Attribute),
        Rule::axis_name => ast::Axis::from_name(inner.as_str()).ok_or_else(|| ParseError::unexpected(&inner)),
        _ => Err(ParseError::unexpected(&inner)),
    }
}

fn build_node_test(pair: Pair<Rule>) -> Result<ast::NodeTest, ParseError> {
    let inner = first_inner(pair)?;
    match inner.as_rule() {
        Rule::node_type_test => {
            let kind = first_inner(inner)?;
            Ok(if kind.as_str() == "text" { ast::NodeTest::Text } else { ast::NodeTest::Node })
        }
        Rule::wildcard => Ok(ast::NodeTest::AnyName),
        Rule::prefix_wildcard => {
            let prefix = inner.as_str().trim_end_matches('*').trim_end_matches(':');
            Ok(ast::NodeTest::Prefix(prefix.to_string()))
        }
        Rule::qname => Ok(ast::NodeTest::Name(QName::parse(inner.as_str()))),
        _ => Err(ParseError::unexpected(&inner)),
    }
}

fn build_predicate(pair: Pair<Rule>) -> Result<ast::Expr, ParseError> {
    first_inner(pair).and_then(build_expr)
}

fn build_primary(pair: Pair<Rule>) -> Result<ast::Expr, ParseError> {
    match pair.as_rule() {
        Rule::expr => build_expr(pair),
        Rule::var_ref => {
            let name = first_inner(pair)?;
            Ok(ast::Expr::VarRef(QName::parse(name.as_str())))
        }
        Rule::literal => {
            let content = pair.into_inner().next().map(|inner| inner.as_str().to_string());
            Ok(ast::Expr::Literal(ast::Literal::String(content.unwrap_or_default())))
        }
        Rule::number => {
            let value: f64 = pair.as_str().parse().map_err(|_| ParseError::unexpected(&pair))?;
            Ok(ast::Expr::Literal(ast::Literal::Number(value)))
        }
        Rule::function_call => {
            let mut inners = pair.into_inner();
            let name = inners.next().ok_or_else(|| ParseError { position: 1, message: "missing function name".into() })?;
            let name = QName::parse(name.as_str());
            let args = inners.map(build_expr).collect::<Result<Vec<_>, _>>()?;
            Ok(ast::Expr::FunctionCall { name, args })
        }
        _ => Err(ParseError::unexpected(&pair)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast::{Axis, BinaryOp, Expr, Literal, NodeTest, PathStart, Step};

    fn steps(expr: &Expr) -> &[Step] {
        match expr {
            Expr::Path(path) => &path.steps,
            other => panic!("not a path: {other:?}"),
        }
    }

    #[test]
    fn abbreviated_steps_are_kept() {
        let expr = parse_path("//a/../@b").expect("parse");
        let Expr::Path(path) = &expr else { panic!("path expected") };
        assert_eq!(path.start, PathStart::Root);
        assert_eq!(path.steps.len(), 4);
        assert_eq!(path.steps[0], Step::DescendantOrSelf);
        assert_eq!(path.steps[2], Step::Parent);
        assert!(matches!(
            &path.steps[3],
            Step::Axis { axis: Axis::Attribute, test: NodeTest::Name(name), .. } if name.local == "b"
        ));
    }

    #[test]
    fn element_names_may_look_like_axes_and_keywords() {
        let expr = parse_path("child/div/text").expect("parse");
        assert_eq!(steps(&expr).len(), 3);
        let expr = parse_path("a div 2").expect("parse");
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Div, .. }));
    }

    #[test]
    fn operators_bind_per_xpath_precedence() {
        let expr = parse_path("1 + 2 * 3 = 7 or false()").expect("parse");
        let Expr::Binary { op: BinaryOp::Or, left, .. } = expr else { panic!("or expected") };
        let Expr::Binary { op: BinaryOp::Eq, left, .. } = *left else { panic!("= expected") };
        let Expr::Binary { op: BinaryOp::Add, right, .. } = *left else { panic!("+ expected") };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn filter_paths_keep_the_primary() {
        let expr = parse_path("$orders[2]/item").expect("parse");
        let Expr::Path(path) = expr else { panic!("path expected") };
        let PathStart::Filter(primary) = path.start else { panic!("filter expected") };
        assert!(matches!(*primary, Expr::Filter { .. }));
        assert_eq!(path.steps.len(), 1);
    }

    #[test]
    fn literals_and_numbers() {
        assert_eq!(parse_path("'it''s'").ok(), None);
        assert_eq!(parse_path("\"x\"").expect("parse"), Expr::Literal(Literal::String("x".into())));
        assert_eq!(parse_path(".5").expect("parse"), Expr::Literal(Literal::Number(0.5)));
    }

    #[test]
    fn errors_carry_a_position() {
        let err = parse_path("a/[").expect_err("must fail");
        assert_eq!(err.position, 3);
        let err = parse_path("   ").expect_err("must fail");
        assert_eq!(err.position, 1);
    }
}
