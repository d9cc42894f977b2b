//! Message assembly.
//!
//! Builds the outgoing `lettre` message from a request and its resolved
//! attachments. The SMTP envelope is set explicitly from To + Cc + Bcc, so
//! Bcc recipients receive the message without ever appearing in a header.

use lettre::address::Envelope;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, MultiPartBuilder, SinglePart};
use lettre::{Address, Message};

use crate::errors::{ConnectorError, ConnectorResult};
use crate::recipients::envelope_recipients;
use crate::types::{EmailBody, ResolvedAttachment, SendEmailRequest};

/// A composed message ready for the transport, with a few facts for logging.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// The formatted message and its envelope.
    pub message: Message,
    /// Envelope recipients, de-duplicated, in order.
    pub recipients: Vec<String>,
    /// Number of attachments.
    pub attachment_count: usize,
    /// Total attachment bytes.
    pub attachment_bytes: u64,
}

/// Composes the outgoing message.
pub fn compose_message(
    request: &SendEmailRequest,
    attachments: Vec<ResolvedAttachment>,
) -> ConnectorResult<OutboundMessage> {
    let recipients = envelope_recipients(request)?;
    let from = parse_mailbox(&request.from, "From")?;

    let mut builder = Message::builder()
        .from(from.clone())
        .subject(request.subject.clone());

    for to in &request.to {
        builder = builder.to(parse_mailbox(to, "To")?);
    }
    for cc in &request.cc {
        builder = builder.cc(parse_mailbox(cc, "Cc")?);
    }
    if let Some(reply_to) = &request.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to, "Reply-To")?);
    }

    let envelope_to = recipients
        .iter()
        .map(|r| parse_mailbox(r, "recipient").map(|mailbox| mailbox.email))
        .collect::<ConnectorResult<Vec<Address>>>()?;
    builder = builder.envelope(Envelope::new(Some(from.email), envelope_to)?);

    let attachment_count = attachments.len();
    let attachment_bytes = attachments.iter().map(|a| a.bytes.len() as u64).sum();

    let message = if attachments.is_empty() {
        match request.body.clone() {
            EmailBody::Text(text) => builder.singlepart(SinglePart::plain(text))?,
            EmailBody::Html(html) => builder.singlepart(SinglePart::html(html))?,
            EmailBody::Alternative { text, html } => {
                builder.multipart(MultiPart::alternative_plain_html(text, html))?
            }
        }
    } else {
        let mut mixed = body_part(MultiPart::mixed(), &request.body);
        for attachment in attachments {
            mixed = mixed.singlepart(attachment_part(attachment)?);
        }
        builder.multipart(mixed)?
    };

    Ok(OutboundMessage {
        message,
        recipients,
        attachment_count,
        attachment_bytes,
    })
}

fn body_part(mixed: MultiPartBuilder, body: &EmailBody) -> MultiPart {
    match body.clone() {
        EmailBody::Text(text) => mixed.singlepart(SinglePart::plain(text)),
        EmailBody::Html(html) => mixed.singlepart(SinglePart::html(html)),
        EmailBody::Alternative { text, html } => {
            mixed.multipart(MultiPart::alternative_plain_html(text, html))
        }
    }
}

fn attachment_part(attachment: ResolvedAttachment) -> ConnectorResult<SinglePart> {
    let content_type = ContentType::parse(&attachment.mime_type).map_err(|e| {
        ConnectorError::validation(format!(
            "Attachment '{}' has an unusable MIME type {:?}",
            attachment.filename, attachment.mime_type
        ))
        .with_cause(e)
    })?;

    Ok(Attachment::new(attachment.filename).body(attachment.bytes, content_type))
}

fn parse_mailbox(value: &str, field: &str) -> ConnectorResult<Mailbox> {
    value.trim().parse::<Mailbox>().map_err(|e| {
        ConnectorError::invalid_address(format!("Invalid {} address {:?}: {}", field, value, e))
            .with_cause(e)
    })
}
