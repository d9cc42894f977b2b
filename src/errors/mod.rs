//! Error types for the SMTP connector.
//!
//! Every failure a send request can hit is a [`ConnectorError`] carrying a
//! [`ConnectorErrorKind`]. The kind decides the error code reported back
//! to the workflow engine; nothing here is ever retried.

use std::fmt;
use thiserror::Error;

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Connector error kinds categorizing different failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorErrorKind {
    // Attachment errors
    /// Malformed descriptor or missing required field.
    Validation,
    /// Inline content is not valid base64.
    Decoding,
    /// Resolved path escapes the attachments root.
    PathTraversal,
    /// Referenced file is missing or not a regular file.
    NotFound,
    /// Reading the attachment failed.
    Io,
    /// Attachment exceeds the configured size limit.
    AttachmentTooLarge,

    // Message errors
    /// An address could not be parsed.
    InvalidAddress,
    /// To, Cc and Bcc are all empty.
    NoRecipients,

    // Delivery errors
    /// Could not connect to the SMTP server.
    ConnectionFailed,
    /// TLS negotiation failed.
    TlsFailed,
    /// The server refused the credentials.
    AuthenticationFailed,
    /// The server rejected the message.
    DeliveryRejected,
    /// The SMTP session timed out.
    Timeout,

    // Configuration errors
    /// Required configuration is missing or invalid.
    Configuration,
}

impl ConnectorErrorKind {
    /// Returns the stable error code reported to the workflow engine.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorErrorKind::Validation => "ValidationError",
            ConnectorErrorKind::Decoding => "DecodingError",
            ConnectorErrorKind::PathTraversal => "PathTraversalError",
            ConnectorErrorKind::NotFound => "NotFoundError",
            ConnectorErrorKind::Io => "IOError",
            ConnectorErrorKind::AttachmentTooLarge => "AttachmentTooLargeError",
            ConnectorErrorKind::InvalidAddress => "InvalidAddressError",
            ConnectorErrorKind::NoRecipients => "NoRecipientsError",
            ConnectorErrorKind::ConnectionFailed => "ConnectionError",
            ConnectorErrorKind::TlsFailed => "TlsError",
            ConnectorErrorKind::AuthenticationFailed => "AuthenticationError",
            ConnectorErrorKind::DeliveryRejected => "DeliveryError",
            ConnectorErrorKind::Timeout => "TimeoutError",
            ConnectorErrorKind::Configuration => "ConfigurationError",
        }
    }

    /// Returns true for failures caused by an attachment.
    pub fn is_attachment_error(&self) -> bool {
        matches!(
            self,
            ConnectorErrorKind::Validation
                | ConnectorErrorKind::Decoding
                | ConnectorErrorKind::PathTraversal
                | ConnectorErrorKind::NotFound
                | ConnectorErrorKind::Io
                | ConnectorErrorKind::AttachmentTooLarge
        )
    }

    /// Returns the severity level of this error kind.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Someone is probing outside the root, or the deployment is broken
            ConnectorErrorKind::PathTraversal | ConnectorErrorKind::Configuration => {
                ErrorSeverity::Critical
            }

            ConnectorErrorKind::ConnectionFailed
            | ConnectorErrorKind::TlsFailed
            | ConnectorErrorKind::AuthenticationFailed
            | ConnectorErrorKind::DeliveryRejected
            | ConnectorErrorKind::Io => ErrorSeverity::Error,

            ConnectorErrorKind::Timeout => ErrorSeverity::Warning,

            ConnectorErrorKind::Validation
            | ConnectorErrorKind::Decoding
            | ConnectorErrorKind::NotFound
            | ConnectorErrorKind::AttachmentTooLarge
            | ConnectorErrorKind::InvalidAddress
            | ConnectorErrorKind::NoRecipients => ErrorSeverity::Info,
        }
    }
}

impl fmt::Display for ConnectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorErrorKind::Validation => write!(f, "Validation failed"),
            ConnectorErrorKind::Decoding => write!(f, "Decoding failed"),
            ConnectorErrorKind::PathTraversal => write!(f, "Path traversal blocked"),
            ConnectorErrorKind::NotFound => write!(f, "Not found"),
            ConnectorErrorKind::Io => write!(f, "I/O error"),
            ConnectorErrorKind::AttachmentTooLarge => write!(f, "Attachment too large"),
            ConnectorErrorKind::InvalidAddress => write!(f, "Invalid address"),
            ConnectorErrorKind::NoRecipients => write!(f, "No recipients"),
            ConnectorErrorKind::ConnectionFailed => write!(f, "Connection failed"),
            ConnectorErrorKind::TlsFailed => write!(f, "TLS failed"),
            ConnectorErrorKind::AuthenticationFailed => write!(f, "Authentication failed"),
            ConnectorErrorKind::DeliveryRejected => write!(f, "Delivery rejected"),
            ConnectorErrorKind::Timeout => write!(f, "Timed out"),
            ConnectorErrorKind::Configuration => write!(f, "Invalid configuration"),
        }
    }
}

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational - bad input from the caller.
    Info,
    /// Warning - temporary issue.
    Warning,
    /// Error - operation failed.
    Error,
    /// Critical - requires immediate attention.
    Critical,
}

/// Connector error with detailed information.
#[derive(Error, Debug)]
pub struct ConnectorError {
    kind: ConnectorErrorKind,
    message: String,
    /// SMTP reply code if the server answered.
    smtp_code: Option<u16>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConnectorError {
    /// Creates a new connector error.
    pub fn new(kind: ConnectorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            smtp_code: None,
            cause: None,
        }
    }

    /// Sets the SMTP reply code.
    pub fn with_smtp_code(mut self, code: u16) -> Self {
        self.smtp_code = Some(code);
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause<E: std::error::Error + Send + Sync + 'static>(mut self, cause: E) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ConnectorErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the SMTP reply code if available.
    pub fn smtp_code(&self) -> Option<u16> {
        self.smtp_code
    }

    /// Returns the stable error code for this error.
    pub fn error_code(&self) -> &'static str {
        self.kind.error_code()
    }

    /// Returns the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        self.kind.severity()
    }

    // Convenience constructors

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Validation, message)
    }

    /// Creates a decoding error.
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Decoding, message)
    }

    /// Creates a path traversal error.
    pub fn path_traversal(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::PathTraversal, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::NotFound, message)
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Io, message)
    }

    /// Creates an attachment size error.
    pub fn too_large(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::AttachmentTooLarge, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Configuration, message)
    }

    /// Creates an invalid address error.
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::InvalidAddress, message)
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(code) = self.smtp_code {
            write!(f, " (SMTP {})", code)?;
        }
        Ok(())
    }
}

impl From<lettre::address::AddressError> for ConnectorError {
    fn from(err: lettre::address::AddressError) -> Self {
        ConnectorError::invalid_address(err.to_string()).with_cause(err)
    }
}

impl From<lettre::error::Error> for ConnectorError {
    fn from(err: lettre::error::Error) -> Self {
        ConnectorError::validation(format!("Could not build message: {}", err)).with_cause(err)
    }
}

impl From<lettre::transport::smtp::Error> for ConnectorError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        // Code implements Display as the three-digit reply code
        let code = err
            .status()
            .and_then(|code| code.to_string().parse::<u16>().ok());

        let kind = if err.is_timeout() {
            ConnectorErrorKind::Timeout
        } else if is_tls_error(&err) {
            ConnectorErrorKind::TlsFailed
        } else if matches!(code, Some(530 | 534 | 535 | 538)) {
            ConnectorErrorKind::AuthenticationFailed
        } else if err.is_transient() || err.is_permanent() {
            ConnectorErrorKind::DeliveryRejected
        } else {
            ConnectorErrorKind::ConnectionFailed
        };

        let mut error = ConnectorError::new(kind, err.to_string());
        if let Some(code) = code {
            error = error.with_smtp_code(code);
        }
        error.with_cause(err)
    }
}

#[cfg(any(feature = "rustls-tls", feature = "native-tls"))]
fn is_tls_error(err: &lettre::transport::smtp::Error) -> bool {
    err.is_tls()
}

#[cfg(not(any(feature = "rustls-tls", feature = "native-tls")))]
fn is_tls_error(_err: &lettre::transport::smtp::Error) -> bool {
    false
}
