//! Language pair validation.
//!
//! These checks gate every front end before the batch processor runs. The
//! processor itself assumes a valid pair; invoking it with equal source and
//! target codes is a caller bug.

use crate::i18n::{LanguageCode, LanguageRegistry};
use thiserror::Error;

/// Source and target language are the same code.
///
/// Recoverable: the caller re-prompts with a corrected target. The message
/// is tied to the target-language field in form-style front ends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("the source language and target language cannot be the same ({code})")]
pub struct SameLanguageError {
    pub code: LanguageCode,
}

/// A code that is not part of the enabled language catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown or disabled language code: {code}")]
pub struct UnknownLanguageError {
    pub code: LanguageCode,
}

/// Reject a source/target pair whose codes are equal.
///
/// Case-sensitive exact match, same as the core's own comparisons. Must run
/// before `process_batch`; it is a precondition gate, not part of the
/// processor's error surface.
pub fn validate_language_choice(
    from: &LanguageCode,
    to: &LanguageCode,
) -> Result<(), SameLanguageError> {
    if from == to {
        return Err(SameLanguageError { code: from.clone() });
    }
    Ok(())
}

/// Reject a code outside the enabled catalog.
///
/// Front-end check only. The processor trusts its caller and compares codes
/// for equality without consulting the registry.
pub fn ensure_in_catalog(code: &LanguageCode) -> Result<(), UnknownLanguageError> {
    if LanguageRegistry::get().is_enabled(code) {
        Ok(())
    } else {
        Err(UnknownLanguageError { code: code.clone() })
    }
}
