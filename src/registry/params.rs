use std::collections::BTreeMap;
use std::fmt;

use crate::foundation::error::{OperationError, OperationResult};
use crate::media::item::MediaItem;

/// One operation parameter as supplied by the caller.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Asset(MediaItem),
    Assets(Vec<MediaItem>),
    Map(BTreeMap<String, String>),
}

impl ParamValue {
    pub fn ty(&self) -> ParamType {
        match self {
            Self::Number(_) => ParamType::Number,
            Self::Bool(_) => ParamType::Bool,
            Self::Text(_) => ParamType::Text,
            Self::Asset(_) => ParamType::Asset,
            Self::Assets(_) => ParamType::Assets,
            Self::Map(_) => ParamType::Map,
        }
    }

    /// Interpret a command-line style value: booleans and numbers first, text otherwise.
    pub fn parse_scalar(raw: &str) -> Self {
        match raw {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => match raw.parse::<f64>() {
                Ok(n) if n.is_finite() => Self::Number(n),
                _ => Self::Text(raw.to_string()),
            },
        }
    }
}

/// Caller parameters keyed by name.
pub type Params = BTreeMap<String, ParamValue>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Number,
    Bool,
    Text,
    Asset,
    Assets,
    Map,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Text => "text",
            Self::Asset => "asset",
            Self::Assets => "asset list",
            Self::Map => "map",
        })
    }
}

/// Schema entry of one parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ParamSpec {
    pub key: &'static str,
    pub ty: ParamType,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(key: &'static str, ty: ParamType) -> Self {
        Self {
            key,
            ty,
            required: true,
        }
    }

    pub const fn optional(key: &'static str, ty: ParamType) -> Self {
        Self {
            key,
            ty,
            required: false,
        }
    }
}

/// Check presence and types of `params` against `schema`. Keys outside the schema are ignored.
pub fn check_schema(schema: &[ParamSpec], params: &Params) -> OperationResult<()> {
    for spec in schema {
        match params.get(spec.key) {
            None if spec.required => {
                return Err(OperationError::invalid_parameters(format!(
                    "missing required parameter '{}'",
                    spec.key
                )));
            }
            None => {}
            Some(v) if v.ty() != spec.ty => {
                return Err(OperationError::invalid_parameters(format!(
                    "parameter '{}' must be {}, got {}",
                    spec.key,
                    spec.ty,
                    v.ty()
                )));
            }
            Some(_) => {}
        }
    }
    for key in params.keys() {
        if !schema.iter().any(|s| s.key == key) {
            tracing::debug!(key = %key, "ignoring unknown parameter");
        }
    }
    Ok(())
}

/// Typed accessors over schema-checked parameters.
pub(crate) struct ParamReader<'a> {
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    pub(crate) fn new(params: &'a Params) -> Self {
        Self { params }
    }

    fn missing(key: &str) -> OperationError {
        OperationError::invalid_parameters(format!("missing required parameter '{key}'"))
    }

    fn mismatch(key: &str, want: ParamType, got: &ParamValue) -> OperationError {
        OperationError::invalid_parameters(format!(
            "parameter '{key}' must be {want}, got {}",
            got.ty()
        ))
    }

    pub(crate) fn opt_number(&self, key: &str) -> OperationResult<Option<f64>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(ParamValue::Number(n)) if n.is_finite() => Ok(Some(*n)),
            Some(ParamValue::Number(n)) => Err(OperationError::invalid_parameters(format!(
                "parameter '{key}' must be finite, got {n}"
            ))),
            Some(other) => Err(Self::mismatch(key, ParamType::Number, other)),
        }
    }

    pub(crate) fn number(&self, key: &str) -> OperationResult<f64> {
        self.opt_number(key)?.ok_or_else(|| Self::missing(key))
    }

    /// A number that must be `> 0`.
    pub(crate) fn positive(&self, key: &str) -> OperationResult<f64> {
        let v = self.number(key)?;
        if v <= 0.0 {
            return Err(OperationError::invalid_parameters(format!(
                "parameter '{key}' must be > 0, got {v}"
            )));
        }
        Ok(v)
    }

    /// A number that must be `>= 0`.
    pub(crate) fn non_negative(&self, key: &str) -> OperationResult<f64> {
        let v = self.number(key)?;
        if v < 0.0 {
            return Err(OperationError::invalid_parameters(format!(
                "parameter '{key}' must be >= 0, got {v}"
            )));
        }
        Ok(v)
    }

    /// A whole number of pixels. Sizes below one pixel are left to the transform compiler.
    pub(crate) fn pixels(&self, key: &str) -> OperationResult<f64> {
        let v = self.number(key)?;
        if v.fract() != 0.0 {
            return Err(OperationError::invalid_parameters(format!(
                "parameter '{key}' must be a whole pixel count, got {v}"
            )));
        }
        Ok(v)
    }

    pub(crate) fn opt_bool(&self, key: &str) -> OperationResult<Option<bool>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(ParamValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(Self::mismatch(key, ParamType::Bool, other)),
        }
    }

    pub(crate) fn opt_text(&self, key: &str) -> OperationResult<Option<&'a str>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(ParamValue::Text(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(Self::mismatch(key, ParamType::Text, other)),
        }
    }

    pub(crate) fn text(&self, key: &str) -> OperationResult<&'a str> {
        self.opt_text(key)?.ok_or_else(|| Self::missing(key))
    }

    pub(crate) fn asset(&self, key: &str) -> OperationResult<&'a MediaItem> {
        match self.params.get(key) {
            None => Err(Self::missing(key)),
            Some(ParamValue::Asset(item)) => Ok(item),
            Some(other) => Err(Self::mismatch(key, ParamType::Asset, other)),
        }
    }

    pub(crate) fn assets(&self, key: &str) -> OperationResult<&'a [MediaItem]> {
        match self.params.get(key) {
            None => Err(Self::missing(key)),
            Some(ParamValue::Assets(items)) => Ok(items),
            Some(other) => Err(Self::mismatch(key, ParamType::Assets, other)),
        }
    }

    pub(crate) fn map(&self, key: &str) -> OperationResult<&'a BTreeMap<String, String>> {
        match self.params.get(key) {
            None => Err(Self::missing(key)),
            Some(ParamValue::Map(m)) => Ok(m),
            Some(other) => Err(Self::mismatch(key, ParamType::Map, other)),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/registry/params.rs"]
mod tests;
