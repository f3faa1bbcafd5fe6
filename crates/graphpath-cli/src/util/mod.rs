use std::io::Read;
use std::path::Path;

use anyhow::{Context as _, anyhow};
use graphpath::Value;
use owo_colors::{OwoColorize, Stream};

pub type CliResult<T> = anyhow::Result<T>;

pub fn load_input(path: Option<&Path>) -> CliResult<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
        }
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("cannot read stdin")?;
            Ok(text)
        }
    }
}

pub fn parse_document(text: &str) -> CliResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::empty_map());
    }
    let json: serde_json::Value = serde_json::from_str(text).context("input is not valid JSON")?;
    Ok(Value::from_json(&json))
}

pub fn parse_namespace(binding: &str) -> CliResult<(&str, &str)> {
    match binding.split_once('=') {
        Some((prefix, uri)) if !prefix.is_empty() => Ok((prefix, uri)),
        _ => Err(anyhow!("namespace binding must look like prefix=uri: {binding}")),
    }
}

pub fn parse_variable(binding: &str) -> CliResult<(&str, Value)> {
    let (name, json) = binding
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| anyhow!("variable binding must look like name=json: {binding}"))?;
    let json: serde_json::Value =
        serde_json::from_str(json).with_context(|| format!("value of ${name} is not valid JSON"))?;
    Ok((name, Value::from_json(&json)))
}

/// Parses a command-line value as JSON, taking it as a plain string when it
/// is not valid JSON.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map_or_else(|_| Value::from(raw), |json| Value::from_json(&json))
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(_) | Value::Number(_) => value.to_string(),
        other => other.to_json().to_string(),
    }
}

pub fn colorize_path(path: &str) -> String {
    path.if_supports_color(Stream::Stdout, |text| text.bold().fg_rgb::<79, 166, 255>().to_string())
        .to_string()
}

pub fn colorize_value(value: &str) -> String {
    value.if_supports_color(Stream::Stdout, |text| text.fg_rgb::<136, 192, 74>().to_string()).to_string()
}

pub fn colorize_note(note: &str) -> String {
    note.if_supports_color(Stream::Stdout, |text| text.dimmed().to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("42", Value::from(42))]
    #[case("\"x\"", Value::from("x"))]
    #[case("plain text", Value::from("plain text"))]
    #[case("true", Value::from(true))]
    fn values_fall_back_to_strings(#[case] raw: &str, #[case] expected: Value) {
        assert_eq!(parse_value(raw), expected);
    }

    #[rstest]
    fn bindings_are_validated() {
        assert_eq!(parse_namespace("b=urn:books").unwrap(), ("b", "urn:books"));
        assert!(parse_namespace("=urn:books").is_err());
        assert!(parse_namespace("books").is_err());
        let (name, value) = parse_variable("limit=10").unwrap();
        assert_eq!((name, value), ("limit", Value::from(10)));
        assert!(parse_variable("limit=ten").is_err());
    }

    #[rstest]
    fn empty_input_is_an_empty_document() {
        assert_eq!(parse_document("  \n").unwrap().to_json(), serde_json::json!({}));
        assert!(parse_document("{").is_err());
    }
}
