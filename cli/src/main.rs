#![deny(missing_docs)]

//! # OData Codec CLI
//!
//! Command Line Interface over the OData metadata codecs.
//!
//! Supported Commands:
//! - `inspect`: Summarizes declared types and resolution diagnostics.
//! - `schema`: Emits a JSON Schema document for a type.
//! - `decode`: Round-trips a payload and prints its key.
//! - `validate`: Reports field violations for a payload.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::error::CliResult;

mod decode;
mod error;
mod inspect;
mod metadata;
mod schema_gen;
mod validate;

#[derive(Parser, Debug)]
#[clap(author, version, about = "OData metadata codec CLI")]
struct Cli {
    /// Log resolution details (overridden by RUST_LOG).
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize the types declared in a metadata document.
    Inspect(inspect::InspectArgs),
    /// Generate a JSON Schema document for an entity or complex type.
    Schema(schema_gen::SchemaGenArgs),
    /// Deserialize a payload, resolve its key and serialize it again.
    Decode(decode::DecodeArgs),
    /// Validate a payload against its type.
    Validate(validate::ValidateArgs),
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Inspect(args) => inspect::execute(args)?,
        Commands::Schema(args) => schema_gen::execute(args)?,
        Commands::Decode(args) => decode::execute(args)?,
        Commands::Validate(args) => validate::execute(args)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli_structure() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_validate_command() {
        let cli = Cli::try_parse_from([
            "odata-codec",
            "validate",
            "--metadata",
            "metadata.xml",
            "--type",
            "NS.Person",
            "--input",
            "person.json",
            "--method",
            "modify",
        ])
        .unwrap();
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.method, Some(validate::MethodArg::Modify));
                assert_eq!(args.payload.protocol, 4);
            }
            other => panic!("Wrong command: {:?}", other),
        }
    }
}
