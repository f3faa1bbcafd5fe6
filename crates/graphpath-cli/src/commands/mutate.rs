use clap::Args;
use graphpath::{Context, Value};
use serde::Serialize;

use crate::OutputFormat;
use crate::util::{CliResult, colorize_note, colorize_path, parse_value};

#[derive(Args, Debug, Clone)]
pub struct SetArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,
    /// JSON value; text that is not valid JSON is stored as a string.
    #[arg(value_name = "VALUE")]
    pub value: String,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,
    /// Value stored at the created location.
    #[arg(value_name = "VALUE")]
    pub value: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,
    /// Remove every selected location instead of the first one.
    #[arg(long)]
    pub all: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
struct MutationSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<usize>,
    document: serde_json::Value,
}

pub fn set(context: &Context<'_>, document: &Value, args: &SetArgs, format: OutputFormat) -> CliResult<String> {
    context.write(&args.query, parse_value(&args.value))?;
    render(MutationSummary { path: None, removed: None, document: document.to_json() }, format)
}

pub fn create(
    context: &Context<'_>,
    document: &Value,
    args: &CreateArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let pointer = match &args.value {
        Some(raw) => context.create_path_and_set(&args.query, parse_value(raw))?,
        None => context.create_path(&args.query)?,
    };
    let summary = MutationSummary { path: Some(pointer.as_path()), removed: None, document: document.to_json() };
    render(summary, format)
}

pub fn remove(
    context: &Context<'_>,
    document: &Value,
    args: &RemoveArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let removed = if args.all {
        context.remove_all(&args.query)?
    } else {
        context.remove_one(&args.query)?;
        1
    };
    let summary = MutationSummary { path: None, removed: args.all.then_some(removed), document: document.to_json() };
    render(summary, format)
}

fn render(summary: MutationSummary, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            let document = serde_json::to_string_pretty(&summary.document)?;
            let header = match (summary.path, summary.removed) {
                (Some(path), _) => Some(format!("{} {}", colorize_note("created"), colorize_path(&path))),
                (None, Some(count)) => Some(colorize_note(&format!("removed {count}"))),
                (None, None) => None,
            };
            Ok(match header {
                Some(header) => format!("{header}\n{document}"),
                None => document,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_document, strip_ansi};
    use graphpath::ContextBuilder;
    use rstest::rstest;

    fn json(output: &str) -> serde_json::Value {
        serde_json::from_str(output).expect("json")
    }

    #[rstest]
    fn set_prints_the_updated_document() {
        let document = sample_document();
        let context = ContextBuilder::new(document.clone()).build();
        let args = SetArgs { query: "orders[id = 2]/total".into(), value: "7".into() };
        let output = set(&context, &document, &args, OutputFormat::Text).expect("set");
        assert_eq!(json(&output)["orders"][1]["total"], 7);
    }

    #[rstest]
    fn set_stores_plain_text_as_strings() {
        let document = sample_document();
        let context = ContextBuilder::new(document.clone()).build();
        let args = SetArgs { query: "name".into(), value: "corner store".into() };
        let output = set(&context, &document, &args, OutputFormat::Json).expect("set");
        assert_eq!(json(&output)["document"]["name"], "corner store");
    }

    #[rstest]
    fn create_reports_the_created_path() {
        let document = sample_document();
        let context = ContextBuilder::new(document.clone()).build();
        let args = CreateArgs { query: "owner/address/city".into(), value: Some("Oslo".into()) };
        let output = create(&context, &document, &args, OutputFormat::Text).expect("create");
        let plain = strip_ansi(&output);
        let (header, body) = plain.split_once('\n').expect("header");
        assert_eq!(header, "created /owner/address/city");
        assert_eq!(json(body)["owner"]["address"]["city"], "Oslo");
    }

    #[rstest]
    fn create_rejects_predicated_paths() {
        let document = sample_document();
        let context = ContextBuilder::new(document.clone()).build();
        let args = CreateArgs { query: "orders[3]/id".into(), value: None };
        let err = create(&context, &document, &args, OutputFormat::Json).expect_err("not creatable");
        assert!(err.to_string().contains("cannot create path"));
    }

    #[rstest]
    #[case(false, None, 1)]
    #[case(true, Some(3), 0)]
    fn remove_one_or_all(#[case] all: bool, #[case] removed: Option<usize>, #[case] remaining: usize) {
        let document = sample_document();
        let context = ContextBuilder::new(document.clone()).build();
        let args = RemoveArgs { query: "//sku".into(), all };
        let output = remove(&context, &document, &args, OutputFormat::Json).expect("remove");
        let payload = json(&output);
        assert_eq!(payload["removed"].as_u64(), removed.map(|n| n as u64));
        let first_lines = payload["document"]["orders"][0]["lines"].as_array().expect("lines").clone();
        let skus = first_lines.iter().filter(|line| line.get("sku").is_some()).count();
        assert_eq!(skus, remaining);
    }
}
