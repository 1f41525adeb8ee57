use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier wrapper for the tenant that owns templates, variables, and campaigns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

/// Value categories a company variable can carry. Image variables hold an
/// opaque media reference; the renderer treats every value as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Text,
    Color,
    Url,
    Image,
}

/// One `(company, key)` variable row as persisted by the back office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyVariable {
    pub company_id: CompanyId,
    pub key: String,
    pub value: String,
    pub kind: VariableKind,
    pub can_be_deleted: bool,
}

/// Immutable key/value snapshot resolved once per render invocation.
///
/// Rendering never reaches back into live company state; the snapshot is the
/// only variable input, which keeps `render` a pure function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableMap(BTreeMap<String, String>);

impl VariableMap {
    pub fn from_variables<I>(variables: I) -> Self
    where
        I: IntoIterator<Item = CompanyVariable>,
    {
        Self(
            variables
                .into_iter()
                .map(|variable| (variable.key, variable.value))
                .collect(),
        )
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lookup abstraction so the engine can snapshot a company's variables without
/// knowing where they live.
pub trait VariableSource: Send + Sync {
    fn variables_for(&self, company: &CompanyId) -> Result<VariableMap, VariableLookupError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VariableLookupError {
    #[error("variable source unavailable: {0}")]
    Unavailable(String),
}
