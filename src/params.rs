use std::collections::BTreeMap;

use crate::error::SqlPluginDbError;
use crate::types::Value;

/// Parameters supplied to an execution.
///
/// Positional parameters bind to markers in declaration order; named
/// parameters bind to `:name`, `@name` or `$name` markers. Keys may be given
/// with or without the sigil.
///
/// ```rust
/// use sql_plugins::prelude::*;
///
/// let positional = Params::from(vec![Value::Int(1), Value::Text("a".into())]);
/// let named = Params::named([("id", Value::Int(1))]);
/// # let _ = (positional, named);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(BTreeMap<String, Value>),
}

impl Params {
    /// Build a named mapping from `(key, value)` pairs.
    pub fn named<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Number of values supplied.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(values) => values.len(),
            Params::Named(map) => map.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve these parameters against a statement's markers, producing the
    /// values in marker order.
    ///
    /// `markers` holds one entry per declared parameter: `Some(name)` for a
    /// named marker (sigil included, as the backend reports it) and `None`
    /// for an anonymous `?`.
    ///
    /// # Errors
    ///
    /// Returns `ParameterCountMismatch` when the number of supplied values
    /// differs from the declared count, and `MissingParameter` when a named
    /// mapping lacks a key for some marker.
    pub fn resolve(self, markers: &[Option<String>]) -> Result<Vec<Value>, SqlPluginDbError> {
        let expected = markers.len();
        match self {
            Params::None if expected == 0 => Ok(Vec::new()),
            Params::None => Err(SqlPluginDbError::ParameterCountMismatch {
                expected,
                supplied: 0,
            }),
            Params::Positional(values) => {
                if values.len() == expected {
                    Ok(values)
                } else {
                    Err(SqlPluginDbError::ParameterCountMismatch {
                        expected,
                        supplied: values.len(),
                    })
                }
            }
            Params::Named(map) => resolve_named(map, markers),
        }
    }
}

fn resolve_named(
    map: BTreeMap<String, Value>,
    markers: &[Option<String>],
) -> Result<Vec<Value>, SqlPluginDbError> {
    // A name reused in the text is still a single marker.
    let distinct: std::collections::BTreeSet<&str> = markers
        .iter()
        .flatten()
        .map(|name| strip_sigil(name))
        .collect();
    let surplus = || SqlPluginDbError::ParameterCountMismatch {
        expected: distinct.len(),
        supplied: map.len(),
    };

    let mut lookup: BTreeMap<&str, &Value> = BTreeMap::new();
    for (key, value) in &map {
        // `:a` and `a` name the same marker.
        if lookup.insert(strip_sigil(key), value).is_some() {
            return Err(surplus());
        }
    }

    let mut resolved = Vec::with_capacity(markers.len());
    for (idx, marker) in markers.iter().enumerate() {
        let Some(name) = marker else {
            return Err(SqlPluginDbError::MissingParameter(format!(
                "?{} is anonymous and cannot be bound by name",
                idx + 1
            )));
        };
        let key = strip_sigil(name);
        match lookup.get(key) {
            Some(value) => resolved.push((*value).clone()),
            None => return Err(SqlPluginDbError::MissingParameter(name.clone())),
        }
    }

    if lookup.len() != distinct.len() {
        return Err(surplus());
    }
    Ok(resolved)
}

pub(crate) fn strip_sigil(name: &str) -> &str {
    name.strip_prefix([':', '@', '$']).unwrap_or(name)
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<&[Value]> for Params {
    fn from(values: &[Value]) -> Self {
        Params::Positional(values.to_vec())
    }
}

impl<const N: usize> From<[Value; N]> for Params {
    fn from(values: [Value; N]) -> Self {
        Params::Positional(values.into())
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Params::Named(map)
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Params::None
    }
}

impl From<Option<Vec<Value>>> for Params {
    fn from(values: Option<Vec<Value>>) -> Self {
        values.map_or(Params::None, Params::Positional)
    }
}
