#![deny(missing_docs)]

//! # Inspect Command
//!
//! Prints a summary of the declared types and any resolution diagnostics.

use std::fmt::Write;

use odata_core::TypeRegistry;

use crate::error::CliResult;
use crate::metadata::MetadataArgs;

/// Arguments for the inspect command.
#[derive(clap::Args, Debug, Clone)]
pub struct InspectArgs {
    #[clap(flatten)]
    pub source: MetadataArgs,
}

/// Executes the inspection.
pub fn execute(args: &InspectArgs) -> CliResult<()> {
    let registry = args.source.load()?;
    print!("{}", summarize(&registry));
    Ok(())
}

/// Renders the summary text.
pub fn summarize(registry: &TypeRegistry) -> String {
    let mut out = String::new();

    for e in registry.enum_types() {
        let kind = if e.is_flags() { "flags" } else { "enum" };
        let members: Vec<&str> = e.get().members().keys().map(String::as_str).collect();
        let _ = writeln!(out, "{} {} [{}]", kind, e.full_name(), members.join(", "));
    }

    for s in registry.structured_types() {
        let mut line = format!("{} {}", s.kind(), s.full_name());
        if let Some(base) = s.base_type() {
            line.push_str(&format!(" : {}", base));
        }
        let keys: Vec<&str> = s.keys().into_iter().map(|k| k.name.as_str()).collect();
        if !keys.is_empty() {
            line.push_str(&format!(" key({})", keys.join(", ")));
        }
        let _ = writeln!(out, "{}", line);
        for field in s.own_fields() {
            let _ = writeln!(
                out,
                "  {}: {}{}",
                field.name(),
                field.type_name(),
                if field.is_nullable() { "" } else { " (required)" }
            );
        }
    }

    for c in registry.all_callables() {
        let params: Vec<String> = c
            .parameters()
            .map(|p| format!("{}: {}", p.name(), p.type_name()))
            .collect();
        let ret = c
            .return_type()
            .map(|r| format!(" -> {}", r.type_name()))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{} {}({}){}",
            c.kind(),
            c.full_name(),
            params.join(", "),
            ret
        );
    }

    for (name, set) in registry.entity_sets() {
        let _ = writeln!(out, "set {}: {}", name, set.full_name());
    }

    for diagnostic in registry.diagnostics() {
        let _ = writeln!(out, "warning: {}", diagnostic);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fixtures::METADATA;

    #[test]
    fn test_summary_lists_types() {
        let registry = TypeRegistry::from_xml(METADATA).unwrap();
        let summary = summarize(&registry);
        assert!(summary.contains("enum Library.Genre [Fiction, Poetry]"));
        assert!(summary.contains("EntityType Library.Book key(Isbn)"));
        assert!(summary.contains("  Title: Edm.String (required)"));
        assert!(summary.contains("set Books: Library.Book"));
        assert!(!summary.contains("warning:"));
    }
}
