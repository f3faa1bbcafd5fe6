use std::fmt::Write;

use clap::{Args, ValueEnum};
use graphpath::{Context, TargetType, Value};
use serde::Serialize;

use crate::OutputFormat;
use crate::util::{CliResult, colorize_value, format_value};

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,
}

#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,
    /// Convert the result before printing it.
    #[arg(long = "type", value_enum)]
    pub target: Option<ReadType>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadType {
    Boolean,
    Number,
    Integer,
    String,
    List,
    Map,
}

impl From<ReadType> for TargetType {
    fn from(value: ReadType) -> Self {
        match value {
            ReadType::Boolean => TargetType::Bool,
            ReadType::Number => TargetType::Number,
            ReadType::Integer => TargetType::Integer,
            ReadType::String => TargetType::String,
            ReadType::List => TargetType::List,
            ReadType::Map => TargetType::Map,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
struct ReadSummary<'a> {
    query: &'a str,
    value: serde_json::Value,
}

pub fn read(context: &Context<'_>, args: &ReadArgs, format: OutputFormat) -> CliResult<String> {
    let value = match args.target {
        Some(target) => context.read_typed(&args.query, target.into())?,
        None => context.read(&args.query)?,
    };
    match format {
        OutputFormat::Text => Ok(colorize_value(&format_value(&value))),
        OutputFormat::Json => {
            let summary = ReadSummary { query: &args.query, value: value.to_json() };
            Ok(serde_json::to_string_pretty(&summary)?)
        }
    }
}

pub fn iterate(context: &Context<'_>, args: &QueryArgs, format: OutputFormat) -> CliResult<String> {
    let values: Vec<Value> = context.iterate(&args.query)?.collect();
    match format {
        OutputFormat::Text => Ok(render_values_text(&values)),
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = values.iter().map(Value::to_json).collect();
            Ok(serde_json::to_string_pretty(&items)?)
        }
    }
}

fn render_values_text(values: &[Value]) -> String {
    let mut output = String::new();
    for value in values {
        let _ = writeln!(&mut output, "{}", colorize_value(&format_value(value)));
    }
    output.trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, strip_ansi};
    use rstest::rstest;

    #[rstest]
    #[case("name", "shop")]
    #[case("orders[total > 10]/id", "1")]
    #[case("count(orders)", "2")]
    #[case("orders[1]/lines[1]", "{\"sku\":\"a\"}")]
    fn read_prints_plain_values(#[case] query: &str, #[case] expected: &str) {
        let args = ReadArgs { query: query.into(), target: None };
        let output = read(&context(false), &args, OutputFormat::Text).expect("read");
        assert_eq!(strip_ansi(&output), expected);
    }

    #[rstest]
    fn read_converts_to_the_requested_type() {
        let args = ReadArgs { query: "orders[2]/id".into(), target: Some(ReadType::String) };
        let output = read(&context(false), &args, OutputFormat::Json).expect("read");
        let json: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(json["value"], "2");
        assert_eq!(json["query"], "orders[2]/id");
    }

    #[rstest]
    fn read_of_missing_values_depends_on_the_mode() {
        let args = ReadArgs { query: "missing".into(), target: None };
        assert!(read(&context(false), &args, OutputFormat::Text).is_err());
        let output = read(&context(true), &args, OutputFormat::Text).expect("read");
        assert_eq!(strip_ansi(&output), "null");
    }

    #[rstest]
    fn iterate_lists_every_value() {
        let args = QueryArgs { query: "//sku".into() };
        let output = iterate(&context(false), &args, OutputFormat::Text).expect("iterate");
        assert_eq!(strip_ansi(&output), "a\nb\nc");

        let output = iterate(&context(false), &args, OutputFormat::Json).expect("iterate");
        let json: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(json, serde_json::json!(["a", "b", "c"]));
    }
}
