//! Mock implementations for testing.
//!
//! [`MockTransport`] records every message it is handed instead of talking
//! to a server, and can be programmed to fail.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::errors::{ConnectorError, ConnectorResult};
use crate::message::OutboundMessage;
use crate::transport::{DeliveryResponse, MailTransport};
use crate::types::SmtpConnection;

/// A message captured by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// Connection parameters the message was sent with.
    pub connection: SmtpConnection,
    /// Envelope recipients.
    pub recipients: Vec<String>,
    /// Number of attachments.
    pub attachment_count: usize,
    /// Formatted RFC 5322 message.
    pub raw: Vec<u8>,
}

impl SentMessage {
    /// Returns the formatted message as text.
    pub fn raw_text(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

/// Recording mail transport for testing.
#[derive(Debug, Clone)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    responses: Arc<Mutex<VecDeque<DeliveryResponse>>>,
    default_response: DeliveryResponse,
    fail_next: Arc<Mutex<Option<ConnectorError>>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: DeliveryResponse::new(250, "OK: queued"),
            fail_next: Arc::new(Mutex::new(None)),
        }
    }

    /// Queues a response for the next send.
    pub fn queue_response(&self, response: DeliveryResponse) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Sets the next send to fail.
    pub fn fail_next_with(&self, error: ConnectorError) -> &Self {
        *self.fail_next.lock().unwrap() = Some(error);
        self
    }

    /// Returns the messages sent so far.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Returns the number of messages sent.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Clears recorded state.
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.responses.lock().unwrap().clear();
        *self.fail_next.lock().unwrap() = None;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(
        &self,
        connection: &SmtpConnection,
        message: OutboundMessage,
    ) -> ConnectorResult<DeliveryResponse> {
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }

        self.sent.lock().unwrap().push(SentMessage {
            connection: connection.clone(),
            raw: message.message.formatted(),
            recipients: message.recipients,
            attachment_count: message.attachment_count,
        });

        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone()))
    }
}

/// Test fixtures.
pub mod fixtures {
    use crate::types::{SendEmailRequest, SendEmailRequestBuilder, SmtpSecurity};

    /// A request builder with connection, sender and one recipient filled in.
    pub fn request_builder() -> SendEmailRequestBuilder {
        SendEmailRequest::builder()
            .smtp("smtp.example.com", 587, SmtpSecurity::StartTls)
            .credentials("workflow", "secret")
            .from("Workflow Bot <bot@example.com>")
            .to("alice@example.com")
            .subject("Test")
            .text("Hello")
    }
}
