#![deny(missing_docs)]

//! # Validate Command
//!
//! Decodes a payload and reports field violations for a request method.

use clap::ValueEnum;
use odata_core::{ErrorsByField, Method, StructuredView, ValidateOptions, Value};

use crate::error::{CliError, CliResult};
use crate::metadata::{structured, MetadataArgs, PayloadArgs};

/// Request method the payload is meant for.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodArg {
    /// POST: computed fields may be absent.
    Create,
    /// PUT: every non-nullable field must be present.
    Update,
    /// PATCH: absent fields are left alone.
    Modify,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Create => Method::Create,
            MethodArg::Update => Method::Update,
            MethodArg::Modify => Method::Modify,
        }
    }
}

/// Arguments for the validate command.
#[derive(clap::Args, Debug, Clone)]
pub struct ValidateArgs {
    #[clap(flatten)]
    pub source: MetadataArgs,

    #[clap(flatten)]
    pub payload: PayloadArgs,

    /// Request method.
    #[clap(long, value_enum)]
    pub method: Option<MethodArg>,

    /// Validate navigation properties too.
    #[clap(long)]
    pub navigation: bool,
}

/// Executes the validation. Violations are printed and turned into an error.
pub fn execute(args: &ValidateArgs) -> CliResult<()> {
    let registry = args.source.load()?;
    let codec = structured(&registry, &args.payload.type_name)?;
    match check(codec, args)? {
        None => {
            println!("valid");
            Ok(())
        }
        Some(errors) => {
            println!("{}", serde_json::to_string_pretty(&errors)?);
            Err(CliError::General(format!(
                "{} field(s) failed validation",
                errors.len()
            )))
        }
    }
}

fn check(codec: StructuredView<'_>, args: &ValidateArgs) -> CliResult<Option<ErrorsByField>> {
    let raw = args.payload.read_input()?;
    let attrs = match codec.deserialize(&raw, &args.payload.options())? {
        Value::Structured(attrs) => attrs,
        _ => {
            return Err(CliError::General(
                "Expected an object payload".to_string(),
            ))
        }
    };
    let options = ValidateOptions {
        method: args.method.map(Method::from),
        navigation: args.navigation,
    };
    Ok(codec.validate(&attrs, &options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fixtures::{write, METADATA};
    use odata_core::{FieldErrors, Violation};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn args(dir: &std::path::Path, body: &str, method: Option<MethodArg>) -> ValidateArgs {
        ValidateArgs {
            source: MetadataArgs {
                metadata: write(dir, "metadata.xml", METADATA),
            },
            payload: PayloadArgs {
                type_name: "Library.Book".into(),
                input: write(dir, "payload.json", body),
                protocol: 4,
            },
            method,
            navigation: false,
        }
    }

    #[test]
    fn test_patch_payload_is_valid() {
        let dir = tempdir().unwrap();
        let args = args(dir.path(), r#"{"Pages": 10}"#, Some(MethodArg::Modify));
        assert!(execute(&args).is_ok());
    }

    #[test]
    fn test_create_reports_violations() {
        let dir = tempdir().unwrap();
        let args = args(
            dir.path(),
            r#"{"Isbn": "97800000000001"}"#,
            Some(MethodArg::Create),
        );
        let registry = args.source.load().unwrap();
        let codec = registry.structured_type("Library.Book").unwrap();

        let errors = check(codec, &args).unwrap().unwrap();
        assert_eq!(
            errors["Isbn"],
            FieldErrors::Codes(vec![Violation::MaxLength])
        );
        assert_eq!(
            errors["Title"],
            FieldErrors::Codes(vec![Violation::Required])
        );
        assert!(matches!(execute(&args), Err(CliError::General(_))));
    }
}
