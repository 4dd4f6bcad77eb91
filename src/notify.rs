//! Notification sink: pushes batch-run notices to a configured webhook.
//!
//! Optional collaborator; when no webhook is configured the notices only
//! reach the log. Delivery failures are reported to the caller but must
//! never fail the batch run itself.

use crate::i18n::LanguageCode;
use crate::processor::OutcomeTally;
use crate::retry::{with_retry_if, RetryConfig};
use anyhow::{Context, Result};
use serde::Serialize;

/// Payload POSTed to the webhook after each batch run.
#[derive(Debug, Serialize)]
struct NoticePayload<'a> {
    event: &'static str,
    from_language: &'a LanguageCode,
    to_language: &'a LanguageCode,
    tally: &'a OutcomeTally,
    notices: &'a [String],
}

/// Deliver the notices for a finished batch run.
///
/// Retries transient failures (5xx, 429, transport errors); 4xx responses
/// fail immediately since resending the same payload cannot help.
pub async fn send_notices(
    client: &reqwest::Client,
    webhook_url: &str,
    from: &LanguageCode,
    to: &LanguageCode,
    tally: &OutcomeTally,
    notices: &[String],
) -> Result<()> {
    let payload = NoticePayload {
        event: "bulk_translation_completed",
        from_language: from,
        to_language: to,
        tally,
        notices,
    };

    with_retry_if(
        &RetryConfig::webhook(),
        "Notification webhook",
        || async {
            let response = client
                .post(webhook_url)
                .json(&payload)
                .send()
                .await
                .context("Failed to send notification webhook")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
                anyhow::bail!("Webhook error ({}): {}", status, body);
            }

            Ok(())
        },
        is_retryable_error,
    )
    .await
}

/// Determine if a delivery error is retryable (5xx, 429, network errors).
/// Other 4xx client errors should not be retried.
fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_str = error.to_string();

    // Error format: "Webhook error (500 Internal Server Error): ..."
    if error_str.contains("Webhook error") {
        if let Some(start) = error_str.find('(') {
            if let Some(end) = error_str[start..].find(')') {
                let status_str = &error_str[start + 1..start + end];
                let status_num = status_str.split_whitespace().next().unwrap_or("");
                if let Ok(status) = status_num.parse::<u16>() {
                    return status == 429 || status >= 500;
                }
            }
        }
    }

    // Transport errors and timeouts are transient
    true
}
