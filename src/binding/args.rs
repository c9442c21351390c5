use std::collections::BTreeMap;

use crate::error::SqlPluginDbError;
use crate::params::Params;
use crate::types::Value;

/// One argument to a generic call: a scalar or a collection of scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Arg {
    fn kind(&self) -> &'static str {
        match self {
            Arg::Value(_) => "value",
            Arg::List(_) => "list",
            Arg::Map(_) => "map",
        }
    }

    /// # Errors
    ///
    /// Returns `ParameterTypeError` unless this is a text value.
    pub fn into_text(self, param: &str) -> Result<String, SqlPluginDbError> {
        match self {
            Arg::Value(Value::Text(text)) => Ok(text),
            other => Err(SqlPluginDbError::ParameterTypeError(format!(
                "`{param}` expects text, got {}",
                other.describe()
            ))),
        }
    }

    /// Statement parameters: a list binds positionally, a map by name.
    ///
    /// # Errors
    ///
    /// Returns `ParameterTypeError` for a bare scalar.
    pub fn into_params(self, param: &str) -> Result<Params, SqlPluginDbError> {
        match self {
            Arg::List(values) => Ok(Params::Positional(values)),
            Arg::Map(map) => Ok(Params::Named(map)),
            Arg::Value(Value::Null) => Ok(Params::None),
            Arg::Value(value) => Err(SqlPluginDbError::ParameterTypeError(format!(
                "`{param}` expects a list or map of values, got {}",
                value.storage_class()
            ))),
        }
    }

    /// # Errors
    ///
    /// Returns `ParameterTypeError` unless this is a map.
    pub fn into_map(self, param: &str) -> Result<BTreeMap<String, Value>, SqlPluginDbError> {
        match self {
            Arg::Map(map) => Ok(map),
            other => Err(SqlPluginDbError::ParameterTypeError(format!(
                "`{param}` expects a map, got {}",
                other.describe()
            ))),
        }
    }

    fn describe(&self) -> String {
        match self {
            Arg::Value(value) => value.storage_class().to_string(),
            other => other.kind().to_string(),
        }
    }
}

macro_rules! impl_scalar_arg {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Arg {
                fn from(value: $t) -> Self {
                    Arg::Value(value.into())
                }
            }
        )*
    };
}

impl_scalar_arg!(Value, &str, String, i32, i64, u32, f64, bool);

impl From<Vec<Value>> for Arg {
    fn from(values: Vec<Value>) -> Self {
        Arg::List(values)
    }
}

impl From<BTreeMap<String, Value>> for Arg {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Arg::Map(map)
    }
}

impl From<Params> for Arg {
    fn from(params: Params) -> Self {
        match params {
            Params::None => Arg::Value(Value::Null),
            Params::Positional(values) => Arg::List(values),
            Params::Named(map) => Arg::Map(map),
        }
    }
}

/// Arguments for a generic constructor or method call.
///
/// ```rust
/// use sql_plugins::prelude::*;
///
/// let args = CallArgs::new()
///     .arg("insert into t values(?, ?)")
///     .kwarg("values", Arg::List(vec![Value::Int(1), Value::Text("a".into())]));
/// # let _ = args;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Arg>,
    keyword: BTreeMap<String, Arg>,
}

impl CallArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.positional.push(arg.into());
        self
    }

    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, arg: impl Into<Arg>) -> Self {
        self.keyword.insert(name.into(), arg.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Match these arguments to a signature, Python style: positionals fill
    /// parameters left to right, keywords fill by name.
    ///
    /// # Errors
    ///
    /// Returns `ParameterCountMismatch` for surplus positionals or unknown
    /// keywords, `ParameterTypeError` when a parameter is given twice, and
    /// `MissingParameter` when a required one is absent.
    pub(crate) fn bind(mut self, signature: &Signature) -> Result<BoundArgs, SqlPluginDbError> {
        let params = signature.params;
        if self.positional.len() > params.len() {
            return Err(SqlPluginDbError::ParameterCountMismatch {
                expected: params.len(),
                supplied: self.positional.len(),
            });
        }

        let mut slots: Vec<Option<Arg>> = Vec::with_capacity(params.len());
        let mut positional = self.positional.into_iter();
        for param in params {
            let from_position = positional.next();
            let from_keyword = self.keyword.remove(param.name);
            slots.push(match (from_position, from_keyword) {
                (Some(_), Some(_)) => {
                    return Err(SqlPluginDbError::ParameterTypeError(format!(
                        "`{}` given both by position and by name",
                        param.name
                    )));
                }
                (Some(arg), None) | (None, Some(arg)) => Some(arg),
                (None, None) if param.required => {
                    return Err(SqlPluginDbError::MissingParameter(param.name.to_string()));
                }
                (None, None) => None,
            });
        }

        if !self.keyword.is_empty() {
            return Err(SqlPluginDbError::ParameterCountMismatch {
                expected: params.len(),
                supplied: params.len() + self.keyword.len(),
            });
        }
        Ok(BoundArgs { slots })
    }
}

/// Declared parameters of a constructor or method.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Signature {
    pub(crate) params: &'static [ParamSpec],
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ParamSpec {
    pub(crate) name: &'static str,
    pub(crate) required: bool,
}

pub(crate) const fn required(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
    }
}

pub(crate) const fn optional(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
    }
}

/// Arguments matched to a signature, one slot per declared parameter.
#[derive(Debug)]
pub(crate) struct BoundArgs {
    slots: Vec<Option<Arg>>,
}

impl BoundArgs {
    /// Take the argument in slot `idx`; `None` if an optional one was omitted.
    pub(crate) fn take(&mut self, idx: usize) -> Option<Arg> {
        self.slots.get_mut(idx).and_then(Option::take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXECUTE: Signature = Signature {
        params: &[required("sql"), optional("values")],
    };

    #[test]
    fn positionals_then_keywords_fill_slots() {
        let mut bound = CallArgs::new()
            .arg("select ?")
            .kwarg("values", Arg::List(vec![Value::Int(1)]))
            .bind(&EXECUTE)
            .unwrap();
        assert_eq!(bound.take(0), Some(Arg::Value(Value::Text("select ?".into()))));
        assert_eq!(bound.take(1), Some(Arg::List(vec![Value::Int(1)])));
    }

    #[test]
    fn optional_parameters_may_be_omitted() {
        let mut bound = CallArgs::new().kwarg("sql", "select 1").bind(&EXECUTE).unwrap();
        assert!(bound.take(0).is_some());
        assert!(bound.take(1).is_none());
    }

    #[test]
    fn binding_errors() {
        let missing = CallArgs::new().bind(&EXECUTE).unwrap_err();
        assert_eq!(missing, SqlPluginDbError::MissingParameter("sql".into()));

        let surplus = CallArgs::new().arg("a").arg("b").arg("c").bind(&EXECUTE);
        assert!(matches!(
            surplus.unwrap_err(),
            SqlPluginDbError::ParameterCountMismatch { expected: 2, supplied: 3 }
        ));

        let unknown = CallArgs::new().arg("a").kwarg("nope", 1).bind(&EXECUTE);
        assert!(matches!(
            unknown.unwrap_err(),
            SqlPluginDbError::ParameterCountMismatch { .. }
        ));

        let twice = CallArgs::new().arg("a").kwarg("sql", "b").bind(&EXECUTE);
        assert!(matches!(
            twice.unwrap_err(),
            SqlPluginDbError::ParameterTypeError(_)
        ));
    }

    #[test]
    fn scalars_are_not_statement_parameters() {
        assert_eq!(Arg::Value(Value::Null).into_params("values").unwrap(), Params::None);
        assert!(matches!(
            Arg::from(5).into_params("values"),
            Err(SqlPluginDbError::ParameterTypeError(_))
        ));
        assert!(matches!(
            Arg::from(5).into_text("sql"),
            Err(SqlPluginDbError::ParameterTypeError(_))
        ));
    }
}
