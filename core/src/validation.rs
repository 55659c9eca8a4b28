#![deny(missing_docs)]

//! # Validation
//!
//! Violation codes and the error-map shapes returned by `validate` on field
//! and structured codecs. Validation never fails: it reports.

use derive_more::Display;
use indexmap::IndexMap;
use serde::Serialize;

/// A single constraint violation on one value.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Violation {
    /// A non-nullable value is missing.
    #[display("required")]
    #[serde(rename = "required")]
    Required,
    /// A string is longer than the declared `MaxLength`.
    #[display("maxlength")]
    #[serde(rename = "maxlength")]
    MaxLength,
    /// An enum value does not decompose into declared members.
    #[display("mismatch")]
    #[serde(rename = "mismatch")]
    Mismatch,
}

/// The write operation a value is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `POST`: computed fields may be absent.
    Create,
    /// `PUT`: the full value is sent.
    Update,
    /// `PATCH`: absent fields are left untouched on the server.
    Modify,
}

/// Options for `validate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Write operation; `None` validates as a full value.
    pub method: Option<Method>,
    /// Also validate navigation properties.
    pub navigation: bool,
}

impl ValidateOptions {
    /// Options for a given write method.
    pub fn for_method(method: Method) -> Self {
        Self {
            method: Some(method),
            navigation: false,
        }
    }

    /// Enables navigation property validation.
    pub fn with_navigation(mut self, navigation: bool) -> Self {
        self.navigation = navigation;
        self
    }
}

/// Errors reported for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldErrors {
    /// Violations on a scalar or enum value.
    Codes(Vec<Violation>),
    /// Errors inside a structured value.
    Nested(ErrorsByField),
    /// Per-element results of a collection, `None` for valid elements.
    Collection(Vec<Option<FieldErrors>>),
}

/// Field name → errors. Only fields with violations appear.
pub type ErrorsByField = IndexMap<String, FieldErrors>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_map_serialization() {
        let mut nested = ErrorsByField::new();
        nested.insert(
            "City".into(),
            FieldErrors::Codes(vec![Violation::MaxLength]),
        );

        let mut errors = ErrorsByField::new();
        errors.insert("Name".into(), FieldErrors::Codes(vec![Violation::Required]));
        errors.insert("Home".into(), FieldErrors::Nested(nested));
        errors.insert(
            "Tags".into(),
            FieldErrors::Collection(vec![
                None,
                Some(FieldErrors::Codes(vec![Violation::Mismatch])),
            ]),
        );

        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "Name": ["required"],
                "Home": {"City": ["maxlength"]},
                "Tags": [null, ["mismatch"]]
            })
        );
    }

    #[test]
    fn test_violation_display() {
        assert_eq!(Violation::Required.to_string(), "required");
        assert_eq!(Violation::MaxLength.to_string(), "maxlength");
        assert_eq!(format!("{}", Violation::Mismatch), "mismatch");
    }
}
