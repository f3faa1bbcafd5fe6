use graphpath::{Error, ErrorKind, compile};
use rstest::rstest;

#[rstest]
#[case("a/[", 3)]
#[case("orders[", 8)]
#[case("count(a", 8)]
#[case("", 1)]
#[case("   ", 1)]
#[case("@", 2)]
fn invalid_queries_report_where_they_fail(#[case] query: &str, #[case] position: usize) {
    match compile(query) {
        Err(Error::Compile { query: reported, position: at, message }) => {
            assert_eq!(reported, query);
            assert_eq!(at, position, "{query}: {message}");
            assert!(!message.is_empty());
        }
        other => panic!("{query} should not compile: {other:?}"),
    }
}

#[rstest]
#[case("a/b/c", true, true)]
#[case("/a/@b", true, true)]
#[case("$var/a", true, true)]
#[case("$var", false, true)]
#[case("a[1]/b", true, false)]
#[case("a//b", true, false)]
#[case("../a", true, false)]
#[case("*", true, false)]
#[case("a/text()", true, false)]
#[case("count(a)", false, false)]
#[case("a | b", false, false)]
#[case("$var[1]", true, false)]
fn classifies_paths(#[case] query: &str, #[case] is_path: bool, #[case] is_simple: bool) {
    let compiled = compile(query).unwrap();
    assert_eq!(compiled.source(), query);
    assert_eq!(compiled.is_path(), is_path, "{query}");
    assert_eq!(compiled.is_simple_path(), is_simple, "{query}");
}

#[rstest]
#[case("child::a/descendant-or-self::node()/attribute::b")]
#[case("ancestor-or-self::*[last()]")]
#[case("following-sibling::a[position() < 3] | preceding-sibling::b")]
#[case("-(1 + 2) * 3 mod 2 div 1")]
#[case("a[b = 'x' and (c != 2 or not(d))]")]
#[case("p:name/p:*")]
#[case("concat('a', \"b\", 1.5, .5)")]
#[case("$ns:var/item[@id >= 10]")]
fn accepts_the_full_expression_syntax(#[case] query: &str) {
    assert!(compile(query).is_ok(), "{query}");
}

#[rstest]
fn compile_errors_surface_through_every_operation() {
    let context = graphpath::ContextBuilder::new(graphpath::Value::empty_map()).lenient(true).build();
    assert_eq!(context.read("a[").unwrap_err().kind(), ErrorKind::Compile);
    assert_eq!(context.iterate("a[").unwrap_err().kind(), ErrorKind::Compile);
    assert_eq!(context.create_path("a[").unwrap_err().kind(), ErrorKind::Compile);
    assert_eq!(context.remove_all("a[").unwrap_err().kind(), ErrorKind::Compile);
}
