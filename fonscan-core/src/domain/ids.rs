use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fund code, trimmed and upper-cased (e.g. "AAK", "TTE").
///
/// Construction goes through [`InstrumentId::parse`], so every value held by
/// the pipeline is already normalized, non-empty, and limited to ASCII
/// letters, digits, `-` and `_`. Codes are used as file names by the CSV
/// provider, so nothing path-like gets through.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("instrument id is empty")]
    Empty,

    #[error("instrument id '{0}' contains whitespace")]
    InnerWhitespace(String),

    #[error("instrument id '{0}' may only contain letters, digits, '-' and '_'")]
    InvalidCharacter(String),
}

impl InstrumentId {
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(IdError::InnerWhitespace(trimmed.to_string()));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(IdError::InvalidCharacter(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for InstrumentId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InstrumentId> for String {
    fn from(id: InstrumentId) -> Self {
        id.0
    }
}

impl AsRef<str> for InstrumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
