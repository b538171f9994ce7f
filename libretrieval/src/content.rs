use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A content identifier. The machine carries CIDs opaquely; resolving or
/// validating them is the transport's business.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cid {
    id: String,
}

impl Cid {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl Display for Cid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// A declarative sub-DAG query over the payload DAG, carried opaquely.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Selector {
    expression: String,
}

impl Selector {
    pub fn new(expression: impl Into<String>) -> Self {
        Self { expression: expression.into() }
    }

    /// Selects the entire DAG under the payload root.
    pub fn all() -> Self {
        Self::new("*")
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expression)
    }
}
