use std::sync::Arc;

use graphpath::{Computed, Context, ContextBuilder, EvalError, Functions, Locale, Value};
use rstest::{fixture, rstest};

#[fixture]
fn context() -> Context<'static> {
    ContextBuilder::new(Value::from_json(&serde_json::json!({
        "title": "  The   quick fox ",
        "prices": [1.5, 2.5, 3],
        "code": "A-17"
    })))
    .build()
}

#[rstest]
#[case("concat('a', 'b', 1)", Value::from("ab1"))]
#[case("contains(code, '-1')", Value::from(true))]
#[case("starts-with(code, 'B')", Value::from(false))]
#[case("ends-with(code, '17')", Value::from(true))]
#[case("substring('12345', 2, 3)", Value::from("234"))]
#[case("substring('12345', 1.5, 2.6)", Value::from("234"))]
#[case("substring-before(code, '-')", Value::from("A"))]
#[case("substring-after(code, '-')", Value::from("17"))]
#[case("string-length(code)", Value::from(4))]
#[case("normalize-space(title)", Value::from("The quick fox"))]
#[case("translate(code, 'A-', 'a')", Value::from("a17"))]
#[case("string(3.0)", Value::from("3"))]
#[case("string(1 div 0)", Value::from("Infinity"))]
fn string_functions(context: Context<'static>, #[case] query: &str, #[case] expected: Value) {
    assert_eq!(context.read(query).unwrap(), expected, "{query}");
}

#[rstest]
#[case("sum(prices)", 7.0)]
#[case("count(prices)", 3.0)]
#[case("floor(2.7)", 2.0)]
#[case("ceiling(2.1)", 3.0)]
#[case("round(2.5)", 3.0)]
#[case("round(-2.5)", -2.0)]
#[case("number('12')", 12.0)]
#[case("prices[last()]", 3.0)]
#[case("prices[position() = 2] * 2", 5.0)]
fn number_functions(context: Context<'static>, #[case] query: &str, #[case] expected: f64) {
    assert_eq!(context.read(query).unwrap(), Value::Number(expected), "{query}");
}

#[rstest]
fn not_a_number_propagates(context: Context<'static>) {
    assert!(context.read("number(code)").unwrap().number_value().is_nan());
    assert_eq!(context.read("string(number(code))").unwrap(), Value::from("NaN"));
}

#[rstest]
#[case("true() and not(false())", true)]
#[case("boolean(prices)", true)]
#[case("boolean(missing)", false)]
#[case("boolean('')", false)]
#[case("prices = 2.5", true)]
#[case("prices != 2.5", true)]
#[case("prices > 10", false)]
#[case("missing = missing", false)]
fn boolean_functions(context: Context<'static>, #[case] query: &str, #[case] expected: bool) {
    assert_eq!(context.read(query).unwrap(), Value::from(expected), "{query}");
}

#[rstest]
#[case("en", true)]
#[case("EN", true)]
#[case("en-US", true)]
#[case("de", false)]
fn lang_uses_the_context_locale(#[case] wanted: &str, #[case] expected: bool) {
    let context = ContextBuilder::new(Value::empty_map()).with_locale(Locale::new("en-US")).build();
    assert_eq!(context.read(&format!("lang('{wanted}')")).unwrap(), Value::from(expected));
}

#[rstest]
fn custom_functions_see_the_call_context(context: Context<'static>) {
    let mut library = Functions::new();
    library.register("describe", 0, |call, _args| {
        Ok(Computed::Value(Value::from(format!("{}/{}", call.position, call.size))))
    });
    library.register_variadic("max", 1, |_call, args| {
        let max = args
            .iter()
            .flat_map(|arg| match arg.nodes() {
                Some(nodes) => nodes.iter().map(|n| n.value().number_value()).collect(),
                None => vec![arg.number_value()],
            })
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(Computed::Value(Value::Number(max)))
    });
    library.register("fail", 0, |_call, _args| Err(EvalError::custom("deliberate")));

    let scoped = ContextBuilder::new(Value::Null).with_functions(Arc::new(library)).build_child(&context);
    let inner = scoped.child(context.context_pointer().value());
    assert_eq!(inner.read("max(prices, 10)").unwrap(), Value::from(10));
    assert_eq!(inner.read("max(prices)").unwrap(), Value::from(3));
    assert_eq!(
        inner.iterate("prices[describe() = '2/3']").unwrap().collect::<Vec<_>>(),
        [Value::from(2.5)]
    );
    let err = inner.read("fail()").unwrap_err();
    assert!(err.to_string().contains("deliberate"));
}
