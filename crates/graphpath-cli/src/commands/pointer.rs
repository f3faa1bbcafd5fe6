use std::fmt::Write;

use clap::Args;
use graphpath::{Context, Pointer};
use serde::Serialize;

use crate::OutputFormat;
use crate::util::{CliResult, colorize_path, colorize_value, format_value};

#[derive(Args, Debug, Clone)]
pub struct PointerArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,
    /// Print only the paths, without values.
    #[arg(long)]
    pub paths_only: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct PointerSummary {
    path: String,
    actual: bool,
    value: serde_json::Value,
}

impl From<&Pointer> for PointerSummary {
    fn from(pointer: &Pointer) -> Self {
        PointerSummary { path: pointer.as_path(), actual: pointer.is_actual(), value: pointer.value().to_json() }
    }
}

pub fn run(context: &Context<'_>, args: &PointerArgs, format: OutputFormat) -> CliResult<String> {
    let pointers: Vec<Pointer> = context.iterate_pointers(&args.query)?.collect();
    tracing::debug!(query = %args.query, count = pointers.len(), "pointers selected");
    match format {
        OutputFormat::Text => Ok(render_pointers_text(&pointers, args.paths_only)),
        OutputFormat::Json => {
            let summaries: Vec<PointerSummary> = pointers.iter().map(PointerSummary::from).collect();
            Ok(serde_json::to_string_pretty(&summaries)?)
        }
    }
}

fn render_pointers_text(pointers: &[Pointer], paths_only: bool) -> String {
    let mut output = String::new();
    for pointer in pointers {
        let path = colorize_path(&pointer.as_path());
        if paths_only {
            let _ = writeln!(&mut output, "{path}");
        } else {
            let value = colorize_value(&format_value(&pointer.value()));
            let _ = writeln!(&mut output, "{path} = {value}");
        }
    }
    output.trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, strip_ansi};
    use rstest::rstest;

    #[rstest]
    fn pointers_print_paths_and_values() {
        let args = PointerArgs { query: "orders/id".into(), paths_only: false };
        let output = run(&context(false), &args, OutputFormat::Text).expect("pointers");
        assert_eq!(strip_ansi(&output), "/orders[1]/id = 1\n/orders[2]/id = 2");
    }

    #[rstest]
    fn pointers_can_omit_values() {
        let args = PointerArgs { query: "tags".into(), paths_only: true };
        let output = run(&context(false), &args, OutputFormat::Text).expect("pointers");
        assert_eq!(strip_ansi(&output), "/tags[1]\n/tags[2]");
    }

    #[rstest]
    fn pointers_json_carries_actuality() {
        let args = PointerArgs { query: "//sku".into(), paths_only: false };
        let output = run(&context(false), &args, OutputFormat::Json).expect("pointers");
        let json: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(json.as_array().map(Vec::len), Some(3));
        assert_eq!(json[2]["path"], "/orders[2]/lines[1]/sku");
        assert_eq!(json[2]["actual"], true);
        assert_eq!(json[2]["value"], "c");
    }
}
