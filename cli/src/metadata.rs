#![deny(missing_docs)]

//! # Metadata Loading
//!
//! Shared arguments for commands that operate on a CSDL document.

use std::fs;
use std::path::{Path, PathBuf};

use odata_core::{ParserOptions, ProtocolVersion, StructuredView, TypeRegistry};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::error::{CliError, CliResult};

/// Location of the metadata document.
#[derive(clap::Args, Debug, Clone)]
pub struct MetadataArgs {
    /// Path to the `$metadata` CSDL XML document.
    #[clap(long, env = "ODATA_METADATA")]
    pub metadata: PathBuf,
}

impl MetadataArgs {
    /// Reads, parses and resolves the document.
    pub fn load(&self) -> CliResult<TypeRegistry> {
        if !self.metadata.exists() {
            return Err(CliError::General(format!(
                "Metadata file not found: {:?}",
                self.metadata
            )));
        }
        let xml = fs::read_to_string(&self.metadata)?;
        let registry = TypeRegistry::from_xml(&xml)?;
        info!(
            path = %self.metadata.display(),
            diagnostics = registry.diagnostics().len(),
            "metadata loaded"
        );
        Ok(registry)
    }
}

/// Codec options shared by the payload commands.
#[derive(clap::Args, Debug, Clone)]
pub struct PayloadArgs {
    /// Qualified entity or complex type name (`Namespace.Type` or `Alias.Type`).
    #[clap(long = "type")]
    pub type_name: String,

    /// JSON payload file.
    #[clap(long)]
    pub input: PathBuf,

    /// Wire protocol of the payload: 2, 3 or 4.
    #[clap(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(2..=4))]
    pub protocol: u8,
}

impl PayloadArgs {
    /// Parser options for the selected protocol.
    pub fn options(&self) -> ParserOptions {
        let version = match self.protocol {
            2 => ProtocolVersion::V2,
            3 => ProtocolVersion::V3,
            _ => ProtocolVersion::V4,
        };
        ParserOptions {
            version,
            ..ParserOptions::default()
        }
    }

    /// Reads the payload file.
    pub fn read_input(&self) -> CliResult<JsonValue> {
        read_json(&self.input)
    }
}

/// Looks up a structured type, failing with a readable message.
pub fn structured<'r>(registry: &'r TypeRegistry, name: &str) -> CliResult<StructuredView<'r>> {
    registry
        .structured_type(name)
        .ok_or_else(|| CliError::General(format!("Type '{name}' not found in metadata")))
}

fn read_json(path: &Path) -> CliResult<JsonValue> {
    debug!(path = %path.display(), "reading payload");
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file() {
        let args = MetadataArgs {
            metadata: PathBuf::from("/nonexistent/metadata.xml"),
        };
        match args.load() {
            Err(CliError::General(msg)) => assert!(msg.contains("Metadata file not found")),
            other => panic!("Wrong result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = tempdir().unwrap();
        let args = MetadataArgs {
            metadata: fixtures::write(dir.path(), "metadata.xml", fixtures::METADATA),
        };
        let registry = args.load().unwrap();
        assert!(structured(&registry, "L.Book").is_ok());
        assert!(structured(&registry, "Library.Genre").is_err());
    }

    #[test]
    fn test_protocol_options() {
        let args = PayloadArgs {
            type_name: "L.Book".into(),
            input: PathBuf::from("book.json"),
            protocol: 3,
        };
        assert_eq!(args.options().version, ProtocolVersion::V3);
    }
}
