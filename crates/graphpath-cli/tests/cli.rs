use std::io::Write;

use clap::Parser;
use graphpath_cli::util::load_input;
use graphpath_cli::{Cli, Command, OutputFormat, execute};
use rstest::{fixture, rstest};
use tempfile::NamedTempFile;

#[fixture]
fn input_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile");
    write!(
        file,
        r#"{{
            "catalog": {{
                "books": [
                    {{ "id": "b1", "title": "Rust", "price": 30 }},
                    {{ "id": "b2", "title": "Go", "price": 25 }}
                ]
            }}
        }}"#
    )
    .expect("write input");
    file
}

fn run(file: &NamedTempFile, args: &[&str]) -> anyhow::Result<String> {
    let path = file.path().to_str().expect("utf-8 path");
    let mut argv = vec!["graphpath", "--input", path];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv)?;
    let input = load_input(cli.options.input.as_deref())?;
    execute(&cli, &input)
}

#[rstest]
fn global_flags_parse_after_the_subcommand() {
    let cli = Cli::try_parse_from([
        "graphpath",
        "read",
        "$limit",
        "--lenient",
        "--var",
        "limit=3",
        "--format",
        "json",
    ])
    .expect("parse");
    assert!(cli.options.lenient);
    assert_eq!(cli.options.variables, ["limit=3"]);
    assert_eq!(cli.options.format, OutputFormat::Json);
    assert!(matches!(cli.command, Command::Read(_)));
}

#[rstest]
#[case(&["read", "catalog/books[price < 28]/title"], "Go")]
#[case(&["read", "sum(catalog/books/price)"], "55")]
#[case(&["read", "catalog/books[price > $min]/id", "--var", "min=26"], "b1")]
#[case(&["read", "--lenient", "catalog/missing"], "null")]
#[case(&["iterate", "catalog/books/title"], "Rust\nGo")]
#[case(&["pointers", "--paths-only", "//title"], "/catalog/books[1]/title\n/catalog/books[2]/title")]
fn queries_read_the_input_file(input_file: NamedTempFile, #[case] args: &[&str], #[case] expected: &str) {
    let output = run(&input_file, args).expect("run");
    assert_eq!(output, expected);
}

#[rstest]
fn mutations_print_the_document(input_file: NamedTempFile) {
    let output = run(&input_file, &["--format", "json", "create", "catalog/owner/name", "\"City\""]).expect("create");
    let json: serde_json::Value = serde_json::from_str(&output).expect("json");
    assert_eq!(json["path"], "/catalog/owner/name");
    assert_eq!(json["document"]["catalog"]["owner"]["name"], "City");

    let output = run(&input_file, &["--format", "json", "remove", "--all", "catalog/books[price > 20]"]).expect("remove");
    let json: serde_json::Value = serde_json::from_str(&output).expect("json");
    assert_eq!(json["removed"], 2);
    assert_eq!(json["document"]["catalog"]["books"], serde_json::json!([]));
}

#[rstest]
fn failures_carry_the_query(input_file: NamedTempFile) {
    let err = run(&input_file, &["read", "catalog/missing"]).expect_err("strict read");
    assert!(err.to_string().contains("catalog/missing"));

    let err = run(&input_file, &["read", "catalog/books["]).expect_err("compile");
    assert!(err.to_string().contains("position"));

    let err = run(&input_file, &["--namespace", "nope", "read", "catalog"]).expect_err("binding");
    assert!(err.to_string().contains("prefix=uri"));
}

#[rstest]
fn missing_input_files_are_reported() {
    let err = load_input(Some(std::path::Path::new("/definitely/not/here.json"))).expect_err("missing");
    assert!(err.to_string().contains("cannot read"));
}
