use std::sync::Arc;

use graphpath::{
    BasicVariables, Computed, Context, ContextBuilder, Error, ErrorKind, EvalError, Functions, QName, Value,
    Variables,
};
use rstest::{fixture, rstest};

#[fixture]
fn orders() -> Value {
    Value::from_json(&serde_json::json!({
        "orders": [{ "id": 1, "total": 20 }, { "id": 2, "total": 5 }]
    }))
}

fn twice() -> Functions {
    Functions::new().with("twice", 1, |_call, args| {
        Ok(Computed::Value(Value::Number(args[0].number_value() * 2.0)))
    })
}

#[rstest]
fn inner_declarations_shadow_outer_ones() {
    let a = ContextBuilder::new(Value::Null).with_variable("x", 1).with_variable("only_a", "a").build();
    let b = ContextBuilder::new(Value::Null).build_child(&a);
    b.variables().declare(QName::local("x"), Value::from(2));
    let c = ContextBuilder::new(Value::Null).build_child(&b);

    assert_eq!(c.read("$x").unwrap(), Value::from(2));
    assert_eq!(c.read("$only_a").unwrap(), Value::from("a"));
    assert_eq!(a.read("$x").unwrap(), Value::from(1));
}

#[rstest]
fn writing_a_visible_variable_updates_its_declaring_level() {
    let a = ContextBuilder::new(Value::Null).with_variable("x", 1).build();
    let b = a.child(Value::Null);
    b.write("$x", 10).unwrap();
    assert_eq!(a.read("$x").unwrap(), Value::from(10));
}

#[rstest]
fn writing_an_undeclared_variable_declares_it_locally() {
    let vars = Arc::new(BasicVariables::new());
    let a = ContextBuilder::new(Value::Null).build();
    let b = ContextBuilder::new(Value::Null).with_variables(vars.clone()).build_child(&a);
    b.write("$fresh", "value").unwrap();
    assert!(vars.is_declared(&QName::local("fresh")));
    assert_eq!(b.read("$fresh").unwrap(), Value::from("value"));
    assert!(a.read("$fresh").is_err());
}

#[rstest]
#[case(false)]
#[case(true)]
fn undefined_variables_fail_in_both_modes(#[case] lenient: bool) {
    let context = ContextBuilder::new(Value::Null).lenient(lenient).build();
    let err = context.read("$nope").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert!(matches!(err, Error::Evaluation { source: EvalError::UndefinedVariable(_), .. }));
}

#[rstest]
fn functions_resolve_through_the_parent_chain(orders: Value) {
    let outer = ContextBuilder::new(Value::Null).with_functions(Arc::new(twice())).build();
    let inner = outer.child(orders);
    assert_eq!(inner.read("twice(21)").unwrap(), Value::from(42));
    assert_eq!(inner.read("twice(count(orders))").unwrap(), Value::from(4));
}

#[rstest]
fn user_functions_shadow_the_generic_library() {
    let custom = Functions::new().with("count", 1, |_call, _args| Ok(Computed::Value(Value::from(-1))));
    let context = ContextBuilder::new(Value::Null).with_functions(Arc::new(custom)).build();
    assert_eq!(context.read("count(.)").unwrap(), Value::from(-1));
}

#[rstest]
fn unknown_functions_are_reported_by_name(orders: Value) {
    let context = ContextBuilder::new(orders).build();
    let err = context.read("frobnicate(orders)").unwrap_err();
    match err {
        Error::UndefinedFunction { name, query } => {
            assert_eq!(name, QName::local("frobnicate"));
            assert_eq!(query, "frobnicate(orders)");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn generic_wrong_arity_is_an_evaluation_error() {
    let context = ContextBuilder::new(Value::Null).build();
    let err = context.read("substring('abc')").unwrap_err();
    assert!(matches!(err, Error::Evaluation { source: EvalError::WrongArity { .. }, .. }));
}

#[rstest]
fn prefixed_functions_need_a_prefixed_registration() {
    let library = Functions::new().with("str:upper", 1, |_call, args| {
        Ok(Computed::Value(Value::from(args[0].string_value().to_uppercase())))
    });
    let context = ContextBuilder::new(Value::Null)
        .with_namespace("str", "urn:strings")
        .with_functions(Arc::new(library))
        .build();
    assert_eq!(context.read("str:upper('abc')").unwrap(), Value::from("ABC"));
    assert_eq!(context.read("upper('abc')").unwrap_err().kind(), ErrorKind::UndefinedFunction);
}

#[rstest]
fn lenient_mode_is_inherited_until_set() {
    let outer = ContextBuilder::new(Value::empty_map()).lenient(true).build();
    let inner = outer.child(Value::empty_map());
    assert_eq!(inner.read("missing/path").unwrap(), Value::Null);

    let strict = ContextBuilder::new(Value::empty_map()).lenient(false).build_child(&outer);
    assert_eq!(strict.read("missing/path").unwrap_err().kind(), ErrorKind::NoValue);
}

#[rstest]
fn sealed_namespace_resolvers_are_copied_on_registration() {
    let mut context: Context<'static> =
        ContextBuilder::new(Value::Null).with_namespace("p", "urn:one").build();
    let handed_out = context.namespace_resolver();
    assert!(handed_out.is_sealed());

    context.register_namespace("p", "urn:two");
    context.register_namespace("q", "urn:three");

    assert_eq!(handed_out.uri_for("p").as_deref(), Some("urn:one"));
    assert_eq!(handed_out.uri_for("q"), None);
    assert_eq!(context.namespace_uri("p").as_deref(), Some("urn:two"));
    assert!(context.namespace_resolver().uri_for("q").is_some());
}

#[rstest]
fn namespaces_fall_back_to_enclosing_contexts() {
    let outer = ContextBuilder::new(Value::Null).with_namespace("p", "urn:outer").build();
    let inner = outer.child(Value::Null);
    assert_eq!(inner.namespace_uri("p").as_deref(), Some("urn:outer"));
    assert_eq!(inner.namespace_uri("xml").as_deref(), Some("http://www.w3.org/XML/1998/namespace"));
}

#[rstest]
fn relative_contexts_start_at_the_pointer(orders: Value) {
    let context = ContextBuilder::new(orders).build();
    let second = context.read_pointer("orders[2]").unwrap();
    let relative = context.relative_context(&second).unwrap();

    assert_eq!(relative.read("id").unwrap(), Value::from(2));
    assert_eq!(relative.read("/orders[1]/id").unwrap(), Value::from(1));
    assert_eq!(relative.read("count(../orders)").unwrap(), Value::from(2));
}

#[rstest]
fn relative_contexts_need_an_existing_node(orders: Value) {
    let context = ContextBuilder::new(orders).lenient(true).build();
    let missing = context.read_pointer("nothing").unwrap();
    let err = context.relative_context(&missing).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert_eq!(err.query(), "/nothing");
}

#[rstest]
fn single_bindings_survive_a_later_variable_set(orders: Value) {
    let shared = Arc::new(BasicVariables::new().with("threshold", 10));
    let context = ContextBuilder::new(orders)
        .with_variable("limit", 1)
        .with_variables(shared.clone())
        .build();
    assert_eq!(context.read("orders[$limit]/id").unwrap(), Value::from(1));
    assert_eq!(context.read("count(orders[total > $threshold])").unwrap(), Value::from(1));
    assert_eq!(shared.get(&QName::local("limit")), Some(Value::from(1)));
}
