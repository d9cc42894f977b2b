//! Send-email connector.
//!
//! [`SmtpConnector`] runs one command end to end:
//! - resolve attachments (in parallel, confined to the attachments folder)
//! - compose the message and its envelope
//! - hand it to the transport
//!
//! Every step appends to the request's [`SendLog`]; any failure ends the
//! command and is reported, never retried.

use std::sync::Arc;

use crate::attachment::AttachmentResolver;
use crate::config::{ConnectorConfig, HARD_ATTACHMENTS_LIMIT_MB};
use crate::errors::{ConnectorError, ConnectorResult};
use crate::message::compose_message;
use crate::observability::{ConnectorMetrics, SendLog, Timer};
use crate::transport::{LettreTransport, MailTransport};
use crate::types::{CommandResponse, SendEmailParams, SendEmailRequest, SendReport, SmtpSecurity};

/// High-level send-email connector.
pub struct SmtpConnector {
    config: Arc<ConnectorConfig>,
    resolver: AttachmentResolver,
    transport: Arc<dyn MailTransport>,
    metrics: Arc<ConnectorMetrics>,
}

impl SmtpConnector {
    /// Creates a connector that delivers through `lettre`.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::builder().config(config).build()
    }

    /// Creates a connector configured from the process environment.
    pub fn from_env() -> ConnectorResult<Self> {
        Self::new(ConnectorConfig::from_env())
    }

    /// Creates a builder for the connector.
    pub fn builder() -> SmtpConnectorBuilder {
        SmtpConnectorBuilder::default()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Returns the attachment resolver.
    pub fn resolver(&self) -> &AttachmentResolver {
        &self.resolver
    }

    /// Returns a reference to the metrics collector.
    pub fn metrics(&self) -> &ConnectorMetrics {
        &self.metrics
    }

    /// Sends an email.
    pub async fn send(&self, request: SendEmailRequest) -> ConnectorResult<SendReport> {
        let mut log = SendLog::new();
        self.send_logged(request, &mut log).await
    }

    /// Runs a send-email command and reports the outcome to the workflow engine.
    pub async fn execute(&self, params: SendEmailParams) -> CommandResponse {
        let mut log = SendLog::new();

        let result = match SendEmailRequest::try_from(params) {
            Ok(request) => self.send_logged(request, &mut log).await.map(|_| ()),
            Err(e) => {
                log.push(format!("invalid request: {}", e.message()));
                Err(e)
            }
        };

        match result {
            Ok(()) => CommandResponse::success(log.into_lines()),
            Err(e) => CommandResponse::failure(&e, log.into_lines()),
        }
    }

    /// Like [`execute`](Self::execute), starting from untyped JSON parameters.
    pub async fn execute_json(&self, params: serde_json::Value) -> CommandResponse {
        match serde_json::from_value::<SendEmailParams>(params) {
            Ok(params) => self.execute(params).await,
            Err(e) => {
                let error = ConnectorError::validation(format!("Invalid command parameters: {}", e))
                    .with_cause(e);
                CommandResponse::failure(&error, vec![format!("invalid request: {}", error.message())])
            }
        }
    }

    async fn send_logged(
        &self,
        request: SendEmailRequest,
        log: &mut SendLog,
    ) -> ConnectorResult<SendReport> {
        let result = self.deliver(request, log).await;
        match &result {
            Ok(_) => self.metrics.record_send_success(),
            Err(e) => {
                self.metrics.record_send_failure();

                #[cfg(feature = "tracing")]
                tracing::error!(
                    request_id = %log.request_id(),
                    error_code = e.error_code(),
                    severity = ?e.severity(),
                    error = %e,
                    "Send email command failed"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = e;
            }
        }
        result
    }

    async fn deliver(
        &self,
        mut request: SendEmailRequest,
        log: &mut SendLog,
    ) -> ConnectorResult<SendReport> {
        let timer = Timer::start("send_email");

        match self.resolver.root() {
            Ok(root) => log.push(format!("attachments allowed dir: {}", root.path().display())),
            Err(_) => log.push("attachments allowed dir: <not configured>"),
        }
        log.push(format!(
            "attachments size limit: {:.2} MB (hard max {} MB)",
            self.config.attachments_limit_mb(),
            HARD_ATTACHMENTS_LIMIT_MB
        ));

        // Fail fast on a missing root before touching any attachment
        if request.has_path_attachments() {
            if let Err(e) = self.resolver.root() {
                log.push(format!("attachment error: {}", e.message()));
                return Err(e);
            }
        }

        let descriptors = std::mem::take(&mut request.attachments);
        let attachments = match self.resolver.resolve_all(descriptors).await {
            Ok(attachments) => attachments,
            Err(e) => {
                self.metrics.record_attachment_rejected(e.kind());
                log.push(format!("attachment error: {}", e.message()));
                return Err(e);
            }
        };
        for attachment in &attachments {
            log.push(format!(
                "attached: {} ({}, {} bytes)",
                attachment.filename,
                attachment.mime_type,
                attachment.len()
            ));
        }

        let outbound = compose_message(&request, attachments).map_err(|e| {
            log.push(format!("did error: {}", e.message()));
            e
        })?;
        let recipient_count = outbound.recipients.len();
        let attachment_count = outbound.attachment_count;
        let attachment_bytes = outbound.attachment_bytes;

        log.push(format!(
            "will send (smtp timeout: {})",
            humantime::format_duration(self.config.smtp_timeout)
        ));
        match request.connection.security {
            SmtpSecurity::StartTls => log.push("will starttls"),
            SmtpSecurity::Implicit => log.push("will connect with tls"),
            SmtpSecurity::None => {}
        }
        if request.connection.has_auth() {
            log.push("will login");
        }

        let response = self
            .transport
            .send(&request.connection, outbound)
            .await
            .map_err(|e| {
                log.push(format!("did error: {}", e));
                e
            })?;

        self.metrics.record_attachments(attachment_count, attachment_bytes);
        log.push(format!("did send to {} recipient(s)", recipient_count));

        let duration = timer.stop();

        #[cfg(feature = "tracing")]
        tracing::info!(
            request_id = %log.request_id(),
            recipients = recipient_count,
            attachments = attachment_count,
            duration_ms = duration.as_millis() as u64,
            "Email sent"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = duration;

        Ok(SendReport {
            request_id: log.request_id().to_string(),
            recipients: recipient_count,
            attachments: attachment_count,
            attachment_bytes,
            server_response: response.to_string(),
            sent_at: chrono::Utc::now(),
        })
    }
}

/// Builder for SmtpConnector.
#[derive(Default)]
pub struct SmtpConnectorBuilder {
    config: Option<ConnectorConfig>,
    transport: Option<Arc<dyn MailTransport>>,
    metrics: Option<Arc<ConnectorMetrics>>,
}

impl SmtpConnectorBuilder {
    /// Sets the configuration.
    pub fn config(mut self, config: ConnectorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Shares a metrics collector with other components.
    pub fn metrics(mut self, metrics: Arc<ConnectorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the connector.
    pub fn build(self) -> ConnectorResult<SmtpConnector> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(LettreTransport::new(config.smtp_timeout)));

        Ok(SmtpConnector {
            resolver: AttachmentResolver::from_config(&config),
            config: Arc::new(config),
            transport,
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConnectorErrorKind;
    use crate::transport::{DeliveryResponse, MockMailTransport};
    use crate::types::AttachmentDescriptor;

    fn request() -> SendEmailRequest {
        SendEmailRequest::builder()
            .smtp("smtp.example.com", 587, SmtpSecurity::StartTls)
            .credentials("bot", "secret")
            .from("bot@example.com")
            .to("alice@example.com; bob@example.com")
            .subject("Hello")
            .text("Hi there")
            .attachment(AttachmentDescriptor::inline("aGk=", "hi.txt", "text/plain"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_hands_message_to_transport() {
        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .times(1)
            .withf(|connection, message| {
                connection.host == "smtp.example.com"
                    && connection.has_auth()
                    && message.recipients == vec!["alice@example.com", "bob@example.com"]
                    && message.attachment_count == 1
            })
            .returning(|_, _| Ok(DeliveryResponse::new(250, "queued")));

        let connector = SmtpConnector::builder()
            .transport(Arc::new(transport))
            .build()
            .unwrap();

        let report = connector.send(request()).await.unwrap();
        assert_eq!(report.recipients, 2);
        assert_eq!(report.attachments, 1);
        assert_eq!(report.attachment_bytes, 2);
        assert_eq!(report.server_response, "250 queued");
        assert_eq!(connector.metrics().snapshot().emails_sent, 1);
    }

    #[tokio::test]
    async fn test_attachment_failure_skips_transport() {
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(0);

        let connector = SmtpConnector::builder()
            .transport(Arc::new(transport))
            .build()
            .unwrap();

        let mut req = request();
        req.attachments = vec![AttachmentDescriptor::inline("%%%%", "x.txt", "text/plain")];

        let err = connector.send(req).await.unwrap_err();
        assert_eq!(err.kind(), ConnectorErrorKind::Decoding);

        let snapshot = connector.metrics().snapshot();
        assert_eq!(snapshot.emails_failed, 1);
        assert_eq!(snapshot.attachments_rejected, 1);
    }

    #[tokio::test]
    async fn test_path_attachment_without_root_fails_fast() {
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(0);

        let connector = SmtpConnector::builder()
            .transport(Arc::new(transport))
            .build()
            .unwrap();

        let mut req = request();
        req.attachments = vec![AttachmentDescriptor::path("report.pdf")];

        let err = connector.send(req).await.unwrap_err();
        assert_eq!(err.kind(), ConnectorErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_execute_reports_transport_error() {
        let mut transport = MockMailTransport::new();
        transport.expect_send().returning(|_, _| {
            Err(ConnectorError::new(ConnectorErrorKind::AuthenticationFailed, "bad credentials")
                .with_smtp_code(535))
        });

        let connector = SmtpConnector::builder()
            .transport(Arc::new(transport))
            .build()
            .unwrap();

        let response = connector
            .execute_json(serde_json::json!({
                "smtp_host": "smtp.example.com",
                "smtp_port": 587,
                "email_subject": "s",
                "email_to": "a@example.com",
                "email_from": "bot@example.com"
            }))
            .await;

        let error = response.error.as_ref().unwrap();
        assert_eq!(error.error_code, "AuthenticationError");
        assert!(response.logs.iter().any(|l| l.starts_with("did error")));
        assert_eq!(connector.metrics().snapshot().emails_failed, 1);
    }

    #[tokio::test]
    async fn test_execute_json_rejects_malformed_params() {
        let connector = SmtpConnector::builder()
            .transport(Arc::new(MockMailTransport::new()))
            .build()
            .unwrap();

        let response = connector.execute_json(serde_json::json!({"smtp_host": 7})).await;
        assert_eq!(response.error.unwrap().error_code, "ValidationError");
    }
}
