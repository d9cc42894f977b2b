//! # SMTP Connector
//!
//! Workflow connector that relays send-email commands to an SMTP server:
//! - Attachments from inline base64 content or files under a restricted folder
//! - Path traversal and symlink escapes blocked against the canonical root
//! - Configurable per-attachment size limit with a hard ceiling
//! - Plain text, HTML and multipart/alternative bodies
//! - STARTTLS, implicit TLS and plain sessions, credentials per request
//! - Command responses carrying the per-request log
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_smtp_connector::{
//!     AttachmentDescriptor, ConnectorConfig, SendEmailRequest, SmtpConnector, SmtpSecurity,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectorConfig::builder()
//!         .attachments_root("/srv/workflow/attachments")
//!         .attachments_limit_mb(25)
//!         .build()?;
//!     let connector = SmtpConnector::new(config)?;
//!
//!     let request = SendEmailRequest::builder()
//!         .smtp("smtp.example.com", 587, SmtpSecurity::StartTls)
//!         .credentials("workflow@example.com", "password")
//!         .from("workflow@example.com")
//!         .to("alice@example.com, bob@example.com")
//!         .subject("Monthly report")
//!         .text("Report attached.")
//!         .attachment(AttachmentDescriptor::path("reports/2024-05.pdf"))
//!         .build()?;
//!
//!     let report = connector.send(request).await?;
//!     println!("Delivered to {} recipient(s)", report.recipients);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Attachments and message assembly
pub mod attachment;
pub mod message;
pub mod recipients;

// Transport layer
pub mod transport;

// Observability
pub mod observability;

// Connector
pub mod client;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use attachment::{resolve, AttachmentResolver, AttachmentsRoot};
pub use attachment::content_type::guess_mime_type;
pub use client::{SmtpConnector, SmtpConnectorBuilder};
pub use config::{ConnectorConfig, ConnectorConfigBuilder, ATTACHMENTS_FOLDER_ENV};
pub use errors::{ConnectorError, ConnectorErrorKind, ConnectorResult, ErrorSeverity};
pub use message::{compose_message, OutboundMessage};
pub use observability::{ConnectorMetrics, MetricsSnapshot, SendLog};
pub use recipients::{dedupe_keep_order, envelope_recipients, split_recipients};
pub use transport::{DeliveryResponse, LettreTransport, MailTransport};
pub use types::{
    AttachmentDescriptor, AttachmentParams, CommandError, CommandResponse, EmailBody,
    ResolvedAttachment, SendEmailParams, SendEmailRequest, SendEmailRequestBuilder, SendReport,
    SmtpConnection, SmtpSecurity,
};
