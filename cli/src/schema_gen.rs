#![deny(missing_docs)]

//! # Schema Generation Command
//!
//! Generates a draft-07 JSON Schema document for an entity or complex type.

use odata_core::JsonSchemaOptions;
use std::fs;
use std::path::PathBuf;

use crate::error::{CliError, CliResult};
use crate::metadata::{structured, MetadataArgs};

/// Arguments for the schema command.
#[derive(clap::Args, Debug, Clone)]
pub struct SchemaGenArgs {
    #[clap(flatten)]
    pub source: MetadataArgs,

    /// Qualified entity or complex type name.
    #[clap(long = "type")]
    pub type_name: String,

    /// Restrict properties to these fields.
    #[clap(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Navigation properties to inline.
    #[clap(long, value_delimiter = ',')]
    pub expand: Vec<String>,

    /// Output path for the schema file.
    /// Supports .json and .yaml/.yml extensions.
    /// If not provided, prints JSON to stdout.
    #[clap(long)]
    pub output: Option<PathBuf>,
}

/// Executes the schema generation.
pub fn execute(args: &SchemaGenArgs) -> CliResult<()> {
    let registry = args.source.load()?;
    let target = structured(&registry, &args.type_name)?;

    let options = args.expand.iter().fold(
        JsonSchemaOptions::default().with_select(&args.select),
        |opts, nav| opts.with_expand(nav.as_str(), JsonSchemaOptions::default()),
    );
    let schema_json = target.to_json_schema(&options);

    let extension = args
        .output
        .as_ref()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str());
    let output_str = match extension {
        Some("yaml") | Some("yml") => serde_yaml::to_string(&schema_json)
            .map_err(|e| CliError::General(format!("YAML serialization failed: {e}")))?,
        _ => serde_json::to_string_pretty(&schema_json)?,
    };

    if let Some(out_path) = &args.output {
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(out_path, output_str)?;
        println!("Schema generated at {:?}", out_path);
    } else {
        println!("{}", output_str);
    }

    Ok(())
}
