//! Command-line facade over `graphpath`: loads a JSON document and runs a
//! single query operation against it.
pub mod commands;
pub mod util;

#[cfg(test)]
mod test_support;

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use graphpath::{Context, ContextBuilder, Value};
use tracing_subscriber::EnvFilter;

use crate::commands::{mutate, pointer, query};
use crate::util::{CliResult, load_input, parse_namespace, parse_variable};

#[derive(Parser, Debug)]
#[command(name = "graphpath", version, about = "Query and update JSON documents with path expressions")]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// JSON document to operate on; stdin when omitted.
    #[arg(long, short, global = true, value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Return null or empty results instead of failing on missing locations.
    #[arg(long, global = true)]
    pub lenient: bool,
    /// Namespace binding, `prefix=uri`.
    #[arg(long = "namespace", global = true, value_name = "PREFIX=URI")]
    pub namespaces: Vec<String>,
    /// Variable binding, `name=json`.
    #[arg(long = "var", global = true, value_name = "NAME=JSON")]
    pub variables: Vec<String>,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Read the value a query selects.
    Read(query::ReadArgs),
    /// List every value a query selects.
    Iterate(query::QueryArgs),
    /// List the canonical paths of the selected locations.
    Pointers(pointer::PointerArgs),
    /// Replace the value at an existing location.
    Set(mutate::SetArgs),
    /// Create the location a simple path names, optionally setting it.
    Create(mutate::CreateArgs),
    /// Remove the first selected location, or all of them with `--all`.
    Remove(mutate::RemoveArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.options.verbose);
    let input = load_input(cli.options.input.as_deref())?;
    let output = execute(&cli, &input)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Runs the parsed command against the JSON text of a document and returns
/// what would be printed.
pub fn execute(cli: &Cli, input: &str) -> CliResult<String> {
    let document = util::parse_document(input)?;
    let context = build_context(&cli.options, &document)?;
    tracing::debug!(command = ?cli.command, "executing");

    match &cli.command {
        Command::Read(args) => query::read(&context, args, cli.options.format),
        Command::Iterate(args) => query::iterate(&context, args, cli.options.format),
        Command::Pointers(args) => pointer::run(&context, args, cli.options.format),
        Command::Set(args) => mutate::set(&context, &document, args, cli.options.format),
        Command::Create(args) => mutate::create(&context, &document, args, cli.options.format),
        Command::Remove(args) => mutate::remove(&context, &document, args, cli.options.format),
    }
}

fn build_context(options: &GlobalOptions, document: &Value) -> CliResult<Context<'static>> {
    let mut builder = ContextBuilder::new(document.clone()).lenient(options.lenient);
    for binding in &options.namespaces {
        let (prefix, uri) = parse_namespace(binding)?;
        builder = builder.with_namespace(prefix, uri);
    }
    for binding in &options.variables {
        let (name, value) = parse_variable(binding)?;
        builder = builder.with_variable(name, value);
    }
    Ok(builder.build())
}
