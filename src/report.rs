//! Turns an outcome tally into operator-facing notices.
//!
//! Presentation only: one notice per nonzero counter, plus a single audit
//! event for the created count. Nothing here affects the tally itself, and
//! tests elsewhere assert on counts rather than on these strings.

use crate::i18n::LanguageCode;
use crate::processor::OutcomeTally;
use tracing::info;

/// Build the notices for a finished batch run.
///
/// One message per nonzero counter; an all-zero tally (empty batch) yields
/// no notices at all.
pub fn notices(tally: &OutcomeTally, from: &LanguageCode, to: &LanguageCode) -> Vec<String> {
    let mut messages = Vec::new();

    if tally.created > 0 {
        messages.push(format!("Created {} translations.", tally.created));
    }
    if tally.already_exists > 0 {
        messages.push(format!(
            "Skipped {}, because target language {} already existed.",
            tally.already_exists, to
        ));
    }
    if tally.source_missing > 0 {
        messages.push(format!(
            "Skipped {}, because source language {} didn't exist.",
            tally.source_missing, from
        ));
    }
    if tally.failed > 0 {
        messages.push(format!(
            "Failed to save {} translations; see the log for details.",
            tally.failed
        ));
    }

    messages
}

/// Build notices and write the audit entry for created translations.
pub fn report(tally: &OutcomeTally, from: &LanguageCode, to: &LanguageCode) -> Vec<String> {
    if tally.created > 0 {
        info!(
            target: "content",
            count = tally.created,
            from = %from,
            to = %to,
            "Created translations: {}",
            tally.created
        );
    }

    notices(tally, from, to)
}
