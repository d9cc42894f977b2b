//! Recipient list handling.
//!
//! Workflow forms hand recipients over as one string per header, separated
//! by commas or semicolons. The SMTP envelope is To + Cc + Bcc with
//! duplicates removed, first occurrence wins.

use std::collections::HashSet;

use crate::errors::{ConnectorError, ConnectorErrorKind, ConnectorResult};
use crate::types::SendEmailRequest;

/// Splits a recipient string on `,` and `;`, trimming and dropping empties.
pub fn split_recipients(value: &str) -> Vec<String> {
    value
        .split(&[',', ';'][..])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Removes duplicates while keeping the first occurrence of each item.
pub fn dedupe_keep_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Returns the envelope recipients of a request.
pub fn envelope_recipients(request: &SendEmailRequest) -> ConnectorResult<Vec<String>> {
    let all = request
        .to
        .iter()
        .chain(request.cc.iter())
        .chain(request.bcc.iter())
        .cloned();
    let recipients = dedupe_keep_order(all);

    if recipients.is_empty() {
        return Err(ConnectorError::new(
            ConnectorErrorKind::NoRecipients,
            "No recipients provided (To/Cc/Bcc all empty)",
        ));
    }

    Ok(recipients)
}
