//! Language code type.
//!
//! A `LanguageCode` is a short identifier such as `"en"` or `"fr"`, drawn
//! from the externally-supplied catalog in [`crate::i18n::LanguageRegistry`].
//! The bulk-translation core never inspects its structure; it only compares
//! codes for equality. Catalog membership is checked at the edges (HTTP
//! handlers, CLI), not here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A language code, e.g. `"en"` or `"fr"`.
///
/// Comparison is a case-sensitive exact match on the code string. Codes
/// sort lexicographically, which makes them usable as ordered map keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for LanguageCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}
