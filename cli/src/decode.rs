#![deny(missing_docs)]

//! # Decode Command
//!
//! Runs a payload through a structured codec: deserialize, resolve the key,
//! serialize again.

use odata_core::StructuredView;
use serde_json::{json, Value as JsonValue};

use crate::error::{CliError, CliResult};
use crate::metadata::{structured, MetadataArgs, PayloadArgs};

/// Arguments for the decode command.
#[derive(clap::Args, Debug, Clone)]
pub struct DecodeArgs {
    #[clap(flatten)]
    pub source: MetadataArgs,

    #[clap(flatten)]
    pub payload: PayloadArgs,
}

/// Executes the decode.
pub fn execute(args: &DecodeArgs) -> CliResult<()> {
    let registry = args.source.load()?;
    let codec = structured(&registry, &args.payload.type_name)?;
    let report = decode(codec, &args.payload)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// `{ "key": ..., "payload": ... }`, or an array of those for a collection.
fn decode(codec: StructuredView<'_>, payload: &PayloadArgs) -> CliResult<JsonValue> {
    let options = payload.options();
    let one = |raw: &JsonValue| -> CliResult<JsonValue> {
        let value = codec.deserialize(raw, &options)?;
        let key = value
            .as_attributes()
            .and_then(|attrs| codec.resolve_key(attrs, &options))
            .map(|key| key.to_json())
            .unwrap_or(JsonValue::Null);
        Ok(json!({
            "key": key,
            "payload": codec.serialize(&value, &options)?,
        }))
    };

    let many = |items: Vec<JsonValue>| -> CliResult<JsonValue> {
        items
            .iter()
            .map(one)
            .collect::<CliResult<Vec<_>>>()
            .map(JsonValue::Array)
    };

    match payload.read_input()? {
        JsonValue::Array(items) => many(items),
        JsonValue::Object(mut obj) => match obj.remove("value") {
            Some(JsonValue::Array(items)) => many(items),
            Some(other) => {
                obj.insert("value".into(), other);
                one(&JsonValue::Object(obj))
            }
            None => one(&JsonValue::Object(obj)),
        },
        other => Err(CliError::General(format!(
            "Expected an object or array payload, found {}",
            other
        ))),
    }
}
