//! XPath 1.0 comparison rules, including existential node-set semantics.
use super::Computed;
use crate::compiler::ir::CompareOp;
use crate::value::Value;

pub(super) fn compare(op: CompareOp, left: &Computed, right: &Computed) -> bool {
    match (left.nodes(), right.nodes()) {
        (Some(left), Some(right)) => left
            .iter()
            .any(|l| {
                let l = l.value();
                right.iter().any(|r| compare_values(op, &l, &r.value()))
            }),
        (Some(nodes), None) => compare_with_atom(op, &nodes, left, right, false),
        (None, Some(nodes)) => compare_with_atom(op, &nodes, right, left, true),
        (None, None) => compare_values(op, &atom(left), &atom(right)),
    }
}

fn atom(computed: &Computed) -> Value {
    match computed {
        Computed::Value(value) => value.clone(),
        other => other.clone().into_value(),
    }
}

/// Node set against a plain value. A boolean is compared with the
/// boolean value of the whole set; other values with each member.
fn compare_with_atom(
    op: CompareOp,
    nodes: &[crate::model::Pointer],
    set: &Computed,
    other: &Computed,
    set_on_right: bool,
) -> bool {
    let value = atom(other);
    let ordered = |a: &Value, b: &Value| {
        if set_on_right { compare_values(op, b, a) } else { compare_values(op, a, b) }
    };
    if let Value::Bool(_) = value {
        return ordered(&Value::Bool(set.boolean_value()), &value);
    }
    nodes.iter().any(|node| ordered(&node.value(), &value))
}

fn compare_values(op: CompareOp, a: &Value, b: &Value) -> bool {
    match op {
        CompareOp::Eq => equal(a, b),
        CompareOp::Ne => !equal(a, b),
        CompareOp::Lt => a.number_value() < b.number_value(),
        CompareOp::Le => a.number_value() <= b.number_value(),
        CompareOp::Gt => a.number_value() > b.number_value(),
        CompareOp::Ge => a.number_value() >= b.number_value(),
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    if matches!(a, Value::Bool(_)) || matches!(b, Value::Bool(_)) {
        a.boolean_value() == b.boolean_value()
    } else if matches!(a, Value::Number(_)) || matches!(b, Value::Number(_)) {
        a.number_value() == b.number_value()
    } else {
        a.string_value() == b.string_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(value: impl Into<Value>) -> Computed {
        Computed::Value(value.into())
    }

    #[test]
    fn atom_equality_prefers_booleans_then_numbers() {
        assert!(compare(CompareOp::Eq, &v(true), &v("x")));
        assert!(compare(CompareOp::Eq, &v(1.0), &v("1")));
        assert!(!compare(CompareOp::Eq, &v("1.0"), &v("1")));
        assert!(compare(CompareOp::Lt, &v("2"), &v(10.0)));
    }

    #[test]
    fn empty_node_sets_compare_false_except_against_false() {
        let empty = Computed::Nodes(Vec::new());
        assert!(!compare(CompareOp::Eq, &empty, &v("")));
        assert!(!compare(CompareOp::Ne, &empty, &v("")));
        assert!(compare(CompareOp::Eq, &empty, &v(false)));
    }
}
