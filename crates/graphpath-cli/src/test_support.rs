use std::borrow::Cow;

use graphpath::{Context, ContextBuilder, Value};

pub fn sample_document() -> Value {
    Value::from_json(&serde_json::json!({
        "name": "shop",
        "tags": ["new", "sale"],
        "orders": [
            { "id": 1, "total": 20, "lines": [{ "sku": "a" }, { "sku": "b" }] },
            { "id": 2, "total": 5, "lines": [{ "sku": "c" }] }
        ]
    }))
}

pub fn context(lenient: bool) -> Context<'static> {
    ContextBuilder::new(sample_document()).lenient(lenient).build()
}

pub fn strip_ansi(input: &str) -> Cow<'_, str> {
    if !input.contains('\u{1b}') {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();
    loop {
        match chars.next() {
            Some('\u{1b}') => {
                for next in chars.by_ref() {
                    if next == 'm' {
                        break;
                    }
                }
            }
            Some(ch) => result.push(ch),
            None => break,
        }
    }
    Cow::Owned(result)
}
