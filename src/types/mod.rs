//! Core types for the SMTP connector.
//!
//! This module provides:
//! - Attachment descriptors (inline or path) and their resolved form
//! - The send-email request and the wire parameters it is parsed from
//! - SMTP connection parameters
//! - The command response handed back to the workflow engine

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::attachment::content_type::guess_mime_type;
use crate::errors::{ConnectorError, ConnectorResult};
use crate::recipients::split_recipients;

/// Describes where an attachment's bytes come from.
///
/// Deserializes from [`AttachmentParams`]; exactly one source must be given.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "AttachmentParams")]
pub enum AttachmentDescriptor {
    /// Base64-encoded content carried in the request.
    Inline {
        /// Encoded payload.
        content_base64: String,
        /// Attachment filename.
        filename: String,
        /// MIME type (e.g. `application/pdf`).
        mime_type: String,
    },
    /// A file below the attachments root.
    Path {
        /// Path relative to the attachments root.
        relative_path: String,
        /// Filename override; defaults to the file's base name.
        filename: Option<String>,
        /// MIME type override; defaults to a guess from the extension.
        mime_type: Option<String>,
    },
}

impl AttachmentDescriptor {
    /// Creates an inline attachment descriptor.
    pub fn inline(
        content_base64: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self::Inline {
            content_base64: content_base64.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Creates a path attachment descriptor.
    pub fn path(relative_path: impl Into<String>) -> Self {
        Self::Path {
            relative_path: relative_path.into(),
            filename: None,
            mime_type: None,
        }
    }

    /// Overrides the filename of a path attachment. No-op for inline content.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        if let Self::Path { filename, .. } = &mut self {
            *filename = Some(name.into());
        }
        self
    }

    /// Overrides the MIME type of a path attachment. No-op for inline content.
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        if let Self::Path { mime_type, .. } = &mut self {
            *mime_type = Some(mime.into());
        }
        self
    }

    /// Returns true for path attachments.
    pub fn is_path(&self) -> bool {
        matches!(self, Self::Path { .. })
    }

    /// Returns a short label for logs and error messages.
    pub fn label(&self) -> &str {
        match self {
            Self::Inline { filename, .. } => filename,
            Self::Path {
                filename: Some(filename),
                ..
            } => filename,
            Self::Path { relative_path, .. } => relative_path,
        }
    }
}

impl fmt::Debug for AttachmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline {
                content_base64,
                filename,
                mime_type,
            } => f
                .debug_struct("Inline")
                .field("content_base64_len", &content_base64.len())
                .field("filename", filename)
                .field("mime_type", mime_type)
                .finish(),
            Self::Path {
                relative_path,
                filename,
                mime_type,
            } => f
                .debug_struct("Path")
                .field("relative_path", relative_path)
                .field("filename", filename)
                .field("mime_type", mime_type)
                .finish(),
        }
    }
}

/// Attachment as it arrives from the workflow engine.
///
/// ```json
/// {"filename": "report.pdf", "path": "reports/report.pdf"}
/// {"filename": "report.pdf", "content_base64": "<BASE64>", "content_type": "application/pdf"}
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachmentParams {
    /// Attachment filename.
    #[serde(default)]
    pub filename: Option<String>,
    /// Path relative to the attachments root.
    #[serde(default)]
    pub path: Option<String>,
    /// Base64 payload.
    #[serde(default)]
    pub content_base64: Option<String>,
    /// Explicit content type.
    #[serde(default)]
    pub content_type: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<AttachmentParams> for AttachmentDescriptor {
    type Error = ConnectorError;

    fn try_from(params: AttachmentParams) -> Result<Self, Self::Error> {
        let filename = non_blank(params.filename).map(|f| f.trim().to_string());
        let content_type = non_blank(params.content_type).map(|c| c.trim().to_string());

        match (non_blank(params.path), non_blank(params.content_base64)) {
            (Some(path), None) => Ok(Self::Path {
                relative_path: path,
                filename,
                mime_type: content_type,
            }),
            (None, Some(content)) => {
                let filename = filename.unwrap_or_default();
                let mime_type = content_type
                    .or_else(|| (!filename.is_empty()).then(|| guess_mime_type(&filename)))
                    .unwrap_or_default();
                Ok(Self::Inline {
                    content_base64: content,
                    filename,
                    mime_type,
                })
            }
            (Some(_), Some(_)) => Err(ConnectorError::validation(format!(
                "Attachment '{}' must provide either 'path' or 'content_base64', not both",
                filename.unwrap_or_default()
            ))),
            (None, None) => Err(ConnectorError::validation(format!(
                "Attachment '{}' must provide either 'path' or 'content_base64'",
                filename.unwrap_or_default()
            ))),
        }
    }
}

/// Attachment bytes plus the metadata needed to put them in a message.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedAttachment {
    /// Attachment filename.
    pub filename: String,
    /// MIME type.
    pub mime_type: String,
    /// Raw content.
    pub bytes: Vec<u8>,
}

impl ResolvedAttachment {
    /// Creates a resolved attachment.
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Returns the content size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the attachment has no content.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ResolvedAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAttachment")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailBody {
    /// Plain text only.
    Text(String),
    /// HTML only.
    Html(String),
    /// Plain text with an HTML alternative.
    Alternative {
        /// Plain text part.
        text: String,
        /// HTML part.
        html: String,
    },
}

impl EmailBody {
    /// Builds a body from optional text and HTML parts.
    pub fn from_parts(text: Option<String>, html: Option<String>) -> Self {
        match (non_blank(text), non_blank(html)) {
            (Some(text), Some(html)) => EmailBody::Alternative { text, html },
            (None, Some(html)) => EmailBody::Html(html),
            (Some(text), None) => EmailBody::Text(text),
            (None, None) => EmailBody::Text(String::new()),
        }
    }

    /// Returns true if the body has an HTML part.
    pub fn has_html(&self) -> bool {
        !matches!(self, EmailBody::Text(_))
    }
}

impl Default for EmailBody {
    fn default() -> Self {
        EmailBody::Text(String::new())
    }
}

/// Transport security for the SMTP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpSecurity {
    /// Plaintext session.
    #[default]
    None,
    /// Plaintext connect upgraded with STARTTLS (required).
    StartTls,
    /// TLS from the first byte (usually port 465).
    Implicit,
}

impl SmtpSecurity {
    /// Derives the security mode from the `use_tls`/`use_starttls` flags.
    pub fn from_flags(use_tls: bool, use_starttls: bool) -> ConnectorResult<Self> {
        match (use_tls, use_starttls) {
            (true, true) => Err(ConnectorError::validation(
                "use_tls and use_starttls are mutually exclusive",
            )),
            (true, false) => Ok(SmtpSecurity::Implicit),
            (false, true) => Ok(SmtpSecurity::StartTls),
            (false, false) => Ok(SmtpSecurity::None),
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtpSecurity::None => write!(f, "none"),
            SmtpSecurity::StartTls => write!(f, "starttls"),
            SmtpSecurity::Implicit => write!(f, "tls"),
        }
    }
}

/// SMTP connection parameters supplied with each request.
#[derive(Debug, Clone)]
pub struct SmtpConnection {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login username.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<SecretString>,
    /// Transport security.
    pub security: SmtpSecurity,
}

impl SmtpConnection {
    /// Creates connection parameters without credentials.
    pub fn new(host: impl Into<String>, port: u16, security: SmtpSecurity) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            security,
        }
    }

    /// Sets login credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Returns true if both username and password are set.
    pub fn has_auth(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Returns the `host:port` address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Send-email command parameters as sent by the workflow engine.
#[derive(Debug, Deserialize)]
pub struct SendEmailParams {
    /// SMTP server host.
    pub smtp_host: String,
    /// SMTP server port.
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub smtp_user: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub smtp_password: Option<SecretString>,
    /// Upgrade with STARTTLS.
    #[serde(default)]
    pub smtp_starttls: Option<bool>,
    /// Connect with implicit TLS.
    #[serde(default)]
    pub smtp_tls: Option<bool>,
    /// Subject line.
    pub email_subject: String,
    /// Plain text body.
    #[serde(default)]
    pub email_body: Option<String>,
    /// HTML body.
    #[serde(default)]
    pub email_body_html: Option<String>,
    /// To recipients, comma or semicolon separated.
    pub email_to: String,
    /// Cc recipients.
    #[serde(default)]
    pub email_cc: Option<String>,
    /// Bcc recipients.
    #[serde(default)]
    pub email_bcc: Option<String>,
    /// Sender address.
    pub email_from: String,
    /// Reply-To address.
    #[serde(default)]
    pub email_reply_to: Option<String>,
    /// Attachments, in message order.
    #[serde(default)]
    pub attachments: Option<Vec<AttachmentParams>>,
}

/// A validated send-email request.
#[derive(Debug, Clone)]
pub struct SendEmailRequest {
    /// Sender address.
    pub from: String,
    /// To recipients.
    pub to: Vec<String>,
    /// Cc recipients.
    pub cc: Vec<String>,
    /// Bcc recipients (envelope only).
    pub bcc: Vec<String>,
    /// Reply-To address.
    pub reply_to: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: EmailBody,
    /// Attachments, in message order.
    pub attachments: Vec<AttachmentDescriptor>,
    /// SMTP connection parameters.
    pub connection: SmtpConnection,
}

impl SendEmailRequest {
    /// Creates a new request builder.
    pub fn builder() -> SendEmailRequestBuilder {
        SendEmailRequestBuilder::default()
    }

    /// Returns true if any attachment is read from disk.
    pub fn has_path_attachments(&self) -> bool {
        self.attachments.iter().any(AttachmentDescriptor::is_path)
    }
}

impl TryFrom<SendEmailParams> for SendEmailRequest {
    type Error = ConnectorError;

    fn try_from(params: SendEmailParams) -> Result<Self, Self::Error> {
        let security = SmtpSecurity::from_flags(
            params.smtp_tls.unwrap_or(false),
            params.smtp_starttls.unwrap_or(false),
        )?;

        let attachments = params
            .attachments
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, att)| {
                AttachmentDescriptor::try_from(att).map_err(|e| {
                    ConnectorError::validation(format!("Attachment #{}: {}", index, e.message()))
                })
            })
            .collect::<ConnectorResult<Vec<_>>>()?;

        let mut builder = SendEmailRequest::builder()
            .smtp(params.smtp_host, params.smtp_port, security)
            .from(params.email_from)
            .to(params.email_to)
            .subject(params.email_subject)
            .body(EmailBody::from_parts(params.email_body, params.email_body_html))
            .attachments(attachments);

        if let Some(cc) = params.email_cc {
            builder = builder.cc(cc);
        }
        if let Some(bcc) = params.email_bcc {
            builder = builder.bcc(bcc);
        }
        if let Some(reply_to) = non_blank(params.email_reply_to) {
            builder = builder.reply_to(reply_to);
        }
        // Credentials only count when both halves are present
        builder.username = non_blank(params.smtp_user);
        builder.password = params.smtp_password;

        builder.build()
    }
}

/// Builder for send-email requests.
#[derive(Debug, Default)]
pub struct SendEmailRequestBuilder {
    host: Option<String>,
    port: u16,
    security: SmtpSecurity,
    username: Option<String>,
    password: Option<SecretString>,
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    reply_to: Option<String>,
    subject: String,
    body: EmailBody,
    attachments: Vec<AttachmentDescriptor>,
}

impl SendEmailRequestBuilder {
    /// Sets the SMTP server.
    pub fn smtp(mut self, host: impl Into<String>, port: u16, security: SmtpSecurity) -> Self {
        self.host = Some(host.into());
        self.port = port;
        self.security = security;
        self
    }

    /// Sets login credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Sets the sender.
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Adds To recipients (comma or semicolon separated).
    pub fn to(mut self, recipients: impl AsRef<str>) -> Self {
        self.to.extend(split_recipients(recipients.as_ref()));
        self
    }

    /// Adds Cc recipients (comma or semicolon separated).
    pub fn cc(mut self, recipients: impl AsRef<str>) -> Self {
        self.cc.extend(split_recipients(recipients.as_ref()));
        self
    }

    /// Adds Bcc recipients (comma or semicolon separated).
    pub fn bcc(mut self, recipients: impl AsRef<str>) -> Self {
        self.bcc.extend(split_recipients(recipients.as_ref()));
        self
    }

    /// Sets the Reply-To address.
    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Sets the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets a plain text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = EmailBody::Text(text.into());
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: EmailBody) -> Self {
        self.body = body;
        self
    }

    /// Adds an attachment.
    pub fn attachment(mut self, attachment: AttachmentDescriptor) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Replaces the attachments.
    pub fn attachments(mut self, attachments: Vec<AttachmentDescriptor>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Builds the request.
    pub fn build(self) -> ConnectorResult<SendEmailRequest> {
        let host = non_blank(self.host)
            .ok_or_else(|| ConnectorError::validation("SMTP host is required"))?;
        if self.port == 0 {
            return Err(ConnectorError::validation("SMTP port must be non-zero"));
        }
        let from = non_blank(self.from)
            .ok_or_else(|| ConnectorError::validation("Sender address is required"))?;

        let mut connection = SmtpConnection::new(host.trim(), self.port, self.security);
        let password = self
            .password
            .filter(|p| !p.expose_secret().trim().is_empty());
        if let (Some(username), Some(password)) = (non_blank(self.username), password) {
            connection.username = Some(username);
            connection.password = Some(password);
        }

        Ok(SendEmailRequest {
            from: from.trim().to_string(),
            to: self.to,
            cc: self.cc,
            bcc: self.bcc,
            reply_to: self.reply_to,
            subject: self.subject,
            body: self.body,
            attachments: self.attachments,
            connection,
        })
    }
}

/// Outcome of a successful send.
#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    /// Correlation ID of the request.
    pub request_id: String,
    /// Number of envelope recipients.
    pub recipients: usize,
    /// Number of attachments in the message.
    pub attachments: usize,
    /// Total attachment bytes.
    pub attachment_bytes: u64,
    /// Final server reply.
    pub server_response: String,
    /// Completion time.
    pub sent_at: chrono::DateTime<chrono::Utc>,
}

/// Response body returned to the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    /// Serialized body.
    pub body: String,
    /// Body MIME type.
    pub mimetype: String,
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self {
            body: "{}".to_string(),
            mimetype: "application/json".to_string(),
        }
    }
}

/// Error section of a command response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    /// Stable error code (e.g. `PathTraversalError`).
    pub error_code: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&ConnectorError> for CommandError {
    fn from(err: &ConnectorError) -> Self {
        Self {
            error_code: err.error_code().to_string(),
            message: err.message().to_string(),
        }
    }
}

/// Version of the command response shape.
pub const COMMAND_RESPONSE_VERSION: u32 = 2;

/// Full command response returned to the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Response body.
    pub command_response: ResponseBody,
    /// Error, if the command failed.
    pub error: Option<CommandError>,
    /// Response shape version.
    pub command_response_version: u32,
    /// Log lines collected while executing the command.
    #[serde(rename = "spiff__logs")]
    pub logs: Vec<String>,
}

impl CommandResponse {
    /// Creates a successful response.
    pub fn success(logs: Vec<String>) -> Self {
        Self {
            command_response: ResponseBody::default(),
            error: None,
            command_response_version: COMMAND_RESPONSE_VERSION,
            logs,
        }
    }

    /// Creates a failed response.
    pub fn failure(error: &ConnectorError, logs: Vec<String>) -> Self {
        Self {
            error: Some(CommandError::from(error)),
            ..Self::success(logs)
        }
    }

    /// Returns true if the command succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConnectorErrorKind;
    use serde_json::json;

    #[test]
    fn test_attachment_params_path() {
        let descriptor: AttachmentDescriptor =
            serde_json::from_value(json!({"filename": "r.pdf", "path": "reports/r.pdf"})).unwrap();

        assert_eq!(
            descriptor,
            AttachmentDescriptor::path("reports/r.pdf").with_filename("r.pdf")
        );
    }

    #[test]
    fn test_attachment_params_inline_guesses_type() {
        let descriptor: AttachmentDescriptor =
            serde_json::from_value(json!({"filename": "notes.txt", "content_base64": "aGk="}))
                .unwrap();

        assert_eq!(descriptor, AttachmentDescriptor::inline("aGk=", "notes.txt", "text/plain"));
    }

    #[test]
    fn test_attachment_params_requires_exactly_one_source() {
        let both = AttachmentParams {
            filename: Some("a.txt".into()),
            path: Some("a.txt".into()),
            content_base64: Some("aGk=".into()),
            content_type: None,
        };
        let err = AttachmentDescriptor::try_from(both).unwrap_err();
        assert_eq!(err.kind(), ConnectorErrorKind::Validation);

        let neither = AttachmentParams {
            filename: Some("a.txt".into()),
            path: Some("  ".into()),
            ..Default::default()
        };
        let err = AttachmentDescriptor::try_from(neither).unwrap_err();
        assert_eq!(err.kind(), ConnectorErrorKind::Validation);
    }

    #[test]
    fn test_descriptor_debug_hides_payload() {
        let descriptor = AttachmentDescriptor::inline("c2VjcmV0", "s.txt", "text/plain");
        let debug = format!("{:?}", descriptor);
        assert!(!debug.contains("c2VjcmV0"));
        assert!(debug.contains("content_base64_len"));
    }

    #[test]
    fn test_email_body_from_parts() {
        assert_eq!(
            EmailBody::from_parts(Some("hi".into()), None),
            EmailBody::Text("hi".into())
        );
        assert_eq!(
            EmailBody::from_parts(None, Some("<p>hi</p>".into())),
            EmailBody::Html("<p>hi</p>".into())
        );
        assert!(EmailBody::from_parts(Some("hi".into()), Some("<p>hi</p>".into())).has_html());
        assert_eq!(EmailBody::from_parts(None, None), EmailBody::Text(String::new()));
    }

    #[test]
    fn test_security_flags() {
        assert_eq!(SmtpSecurity::from_flags(false, false).unwrap(), SmtpSecurity::None);
        assert_eq!(SmtpSecurity::from_flags(false, true).unwrap(), SmtpSecurity::StartTls);
        assert_eq!(SmtpSecurity::from_flags(true, false).unwrap(), SmtpSecurity::Implicit);
        assert!(SmtpSecurity::from_flags(true, true).is_err());
    }

    #[test]
    fn test_send_email_params_conversion() {
        let params: SendEmailParams = serde_json::from_value(json!({
            "smtp_host": "smtp.example.com",
            "smtp_port": 587,
            "smtp_user": "bot",
            "smtp_password": "hunter2",
            "smtp_starttls": true,
            "email_subject": "Report",
            "email_body": "See attached.",
            "email_to": "a@example.com; b@example.com",
            "email_cc": "c@example.com",
            "email_from": "bot@example.com",
            "attachments": [{"filename": "r.pdf", "path": "r.pdf"}]
        }))
        .unwrap();

        let request = SendEmailRequest::try_from(params).unwrap();
        assert_eq!(request.to, vec!["a@example.com", "b@example.com"]);
        assert_eq!(request.cc, vec!["c@example.com"]);
        assert!(request.bcc.is_empty());
        assert_eq!(request.connection.security, SmtpSecurity::StartTls);
        assert!(request.connection.has_auth());
        assert!(request.has_path_attachments());
    }

    #[test]
    fn test_send_email_params_user_without_password() {
        let params: SendEmailParams = serde_json::from_value(json!({
            "smtp_host": "smtp.example.com",
            "smtp_port": 25,
            "smtp_user": "bot",
            "email_subject": "s",
            "email_to": "a@example.com",
            "email_from": "bot@example.com"
        }))
        .unwrap();

        let request = SendEmailRequest::try_from(params).unwrap();
        assert!(!request.connection.has_auth());
        assert!(request.connection.username.is_none());
    }

    #[test]
    fn test_send_email_params_blank_password_skips_login() {
        let params: SendEmailParams = serde_json::from_value(json!({
            "smtp_host": "smtp.example.com",
            "smtp_port": 25,
            "smtp_user": "bot",
            "smtp_password": "",
            "email_subject": "s",
            "email_to": "a@example.com",
            "email_from": "bot@example.com"
        }))
        .unwrap();

        let request = SendEmailRequest::try_from(params).unwrap();
        assert!(!request.connection.has_auth());
        assert!(request.connection.password.is_none());

        let request = SendEmailRequest::builder()
            .smtp("smtp.example.com", 25, SmtpSecurity::None)
            .credentials("bot", "   ")
            .from("bot@example.com")
            .build()
            .unwrap();
        assert!(!request.connection.has_auth());
    }

    #[test]
    fn test_send_email_params_malformed_content_type_is_guessed() {
        let descriptor: AttachmentDescriptor = serde_json::from_value(json!({
            "filename": "r.pdf",
            "content_base64": "aGk=",
            "content_type": "pdf"
        }))
        .unwrap();

        let resolved = crate::attachment::AttachmentResolver::inline_only(1024)
            .resolve(&descriptor)
            .unwrap();
        assert_eq!(resolved.mime_type, "application/pdf");
    }

    #[test]
    fn test_send_email_params_bad_attachment_names_index() {
        let params: SendEmailParams = serde_json::from_value(json!({
            "smtp_host": "smtp.example.com",
            "smtp_port": 25,
            "email_subject": "s",
            "email_to": "a@example.com",
            "email_from": "bot@example.com",
            "attachments": [{"filename": "ok.txt", "content_base64": "aGk="}, {"filename": "bad"}]
        }))
        .unwrap();

        let err = SendEmailRequest::try_from(params).unwrap_err();
        assert_eq!(err.kind(), ConnectorErrorKind::Validation);
        assert!(err.message().starts_with("Attachment #1"));
    }

    #[test]
    fn test_command_response_serialization() {
        let err = ConnectorError::path_traversal("escapes root");
        let response = CommandResponse::failure(&err, vec!["attachment error".into()]);

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["command_response_version"], 2);
        assert_eq!(value["command_response"]["body"], "{}");
        assert_eq!(value["error"]["error_code"], "PathTraversalError");
        assert_eq!(value["spiff__logs"][0], "attachment error");
    }
}
