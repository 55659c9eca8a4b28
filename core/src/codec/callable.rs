//! # Callable Codec
//!
//! Functions and actions: the parameter set going out, the return value
//! coming back. Parameters and the return type are plain field codecs.

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use crate::csdl::{CallableConfig, CallableKind, FieldConfig};
use crate::error::CodecResult;
use crate::options::ParserOptions;
use crate::value::{Attributes, Value};

use super::{is_qualified_as, CallableId, CallableView, FieldCodec, FieldView, Vocabulary};

/// Conventional name of the parameter a bound callable is invoked on.
pub const BINDING_PARAMETER: &str = "bindingParameter";

/// Name given to the return type's field codec.
const RETURN_NAME: &str = "return";

/// Codec for one `Function` or `Action`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallableCodec {
    pub(crate) id: CallableId,
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) alias: Option<String>,
    pub(crate) kind: CallableKind,
    pub(crate) is_bound: bool,
    pub(crate) is_composable: bool,
    pub(crate) entity_set_path: Option<String>,
    pub(crate) parameters: IndexMap<String, FieldCodec>,
    pub(crate) return_type: Option<FieldCodec>,
}

impl CallableCodec {
    pub(crate) fn from_config(
        id: CallableId,
        config: &CallableConfig,
        vocabulary: &Vocabulary,
    ) -> Self {
        Self {
            id,
            name: config.name.clone(),
            namespace: config.namespace.clone(),
            alias: config.alias.clone(),
            kind: config.kind,
            is_bound: config.is_bound,
            is_composable: config.is_composable,
            entity_set_path: config.entity_set_path.clone(),
            parameters: config
                .parameters
                .iter()
                .map(|(name, p)| {
                    (name.clone(), FieldCodec::from_config(name, p, vocabulary))
                })
                .collect(),
            return_type: config.return_type.as_ref().map(|ret| {
                let field = FieldConfig {
                    type_name: ret.type_name.clone(),
                    collection: ret.collection,
                    nullable: ret.nullable,
                    ..FieldConfig::default()
                };
                FieldCodec::from_config(RETURN_NAME, &field, vocabulary)
            }),
        }
    }

    /// Arena index in the owning registry.
    pub fn id(&self) -> CallableId {
        self.id
    }

    /// Simple name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `Namespace.Name`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Function or action.
    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    /// `IsBound`.
    pub fn is_bound(&self) -> bool {
        self.is_bound
    }

    /// `IsComposable`.
    pub fn is_composable(&self) -> bool {
        self.is_composable
    }

    /// `EntitySetPath`.
    pub fn entity_set_path(&self) -> Option<&str> {
        self.entity_set_path.as_deref()
    }

    /// Membership test against `Namespace.Name` and `Alias.Name`.
    pub fn is_type_of(&self, name: &str) -> bool {
        is_qualified_as(&self.namespace, self.alias.as_deref(), &self.name, name)
    }
}

impl<'r> CallableView<'r> {
    /// Parameters in declaration order, binding parameter included.
    pub fn parameters(&self) -> impl Iterator<Item = FieldView<'r>> + 'r {
        let registry = self.registry();
        self.get()
            .parameters
            .values()
            .map(move |p| FieldView::new(registry, p))
    }

    /// Return type codec.
    pub fn return_type(&self) -> Option<FieldView<'r>> {
        self.get()
            .return_type
            .as_ref()
            .map(|r| FieldView::new(self.registry(), r))
    }

    /// The parameter a bound callable is invoked on.
    ///
    /// `bindingParameter` by convention, else the first parameter.
    pub fn binding(&self) -> Option<FieldView<'r>> {
        if !self.is_bound {
            return None;
        }
        let params = &self.get().parameters;
        params
            .get(BINDING_PARAMETER)
            .or_else(|| params.values().next())
            .map(|p| FieldView::new(self.registry(), p))
    }

    /// Parameters that travel in the body or the parenthesized argument list.
    fn arguments<'a>(&self, args: &'a Attributes) -> Vec<(FieldView<'r>, &'a Value)> {
        let binding = self.binding().map(|b| b.name().to_string());
        self.parameters()
            .filter(|p| binding.as_deref() != Some(p.name()))
            .filter_map(|p| args.get(p.name()).map(|v| (p, v)))
            .collect()
    }

    /// Arguments → wire JSON object. The binding parameter and parameters
    /// missing from `args` are left out.
    pub fn serialize(&self, args: &Attributes, options: &ParserOptions) -> CodecResult<JsonValue> {
        let mut out = Map::new();
        for (param, value) in self.arguments(args) {
            out.insert(param.name().to_string(), param.serialize(value, options)?);
        }
        Ok(JsonValue::Object(out))
    }

    /// Arguments → URL literals, for function calls.
    pub fn encode(
        &self,
        args: &Attributes,
        options: &ParserOptions,
    ) -> CodecResult<IndexMap<String, String>> {
        self.arguments(args)
            .into_iter()
            .map(|(param, value)| {
                Ok((param.name().to_string(), param.encode(value, options)?))
            })
            .collect()
    }

    /// Return value → typed value; raw JSON when nothing is declared.
    pub fn deserialize(&self, raw: &JsonValue, options: &ParserOptions) -> CodecResult<Value> {
        match self.return_type() {
            Some(ret) => ret.deserialize(raw, options),
            None => Ok(Value::untyped(raw)),
        }
    }
}
