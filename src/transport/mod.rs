//! Transport layer for SMTP delivery.
//!
//! The connector never speaks SMTP itself. [`MailTransport`] is the seam;
//! [`LettreTransport`] opens one `lettre` session per request using the
//! connection parameters that came with it.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::Tls;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use secrecy::ExposeSecret;
use std::time::Duration;

use crate::config::DEFAULT_SMTP_TIMEOUT;
use crate::errors::{ConnectorError, ConnectorResult};
use crate::message::OutboundMessage;
use crate::types::{SmtpConnection, SmtpSecurity};

/// Final reply of the SMTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    /// Reply code (e.g. `250`).
    pub code: u16,
    /// Reply text, lines joined with spaces.
    pub message: String,
}

impl DeliveryResponse {
    /// Creates a delivery response.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DeliveryResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

/// Delivers composed messages to an SMTP server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Sends one message over a fresh session.
    async fn send(
        &self,
        connection: &SmtpConnection,
        message: OutboundMessage,
    ) -> ConnectorResult<DeliveryResponse>;
}

/// Production transport backed by `lettre`.
#[derive(Debug, Clone)]
pub struct LettreTransport {
    timeout: Duration,
}

impl LettreTransport {
    /// Creates a transport with the given per-command socket timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the per-command socket timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build(&self, connection: &SmtpConnection) -> ConnectorResult<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(connection.host.as_str())
            .port(connection.port)
            .tls(tls_for(connection)?)
            .timeout(Some(self.timeout));

        if let (Some(username), Some(password)) = (&connection.username, &connection.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(builder.build())
    }
}

impl Default for LettreTransport {
    fn default() -> Self {
        Self::new(DEFAULT_SMTP_TIMEOUT)
    }
}

#[async_trait]
impl MailTransport for LettreTransport {
    async fn send(
        &self,
        connection: &SmtpConnection,
        message: OutboundMessage,
    ) -> ConnectorResult<DeliveryResponse> {
        let transport = self.build(connection)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            server = %connection.address(),
            security = %connection.security,
            authenticated = connection.has_auth(),
            "Opening SMTP session"
        );

        let response = transport.send(message.message).await?;

        let code = response
            .code()
            .to_string()
            .parse::<u16>()
            .unwrap_or(250);
        let text = response
            .message()
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(DeliveryResponse::new(code, text))
    }
}

#[cfg(any(feature = "rustls-tls", feature = "native-tls"))]
fn tls_for(connection: &SmtpConnection) -> ConnectorResult<Tls> {
    use lettre::transport::smtp::client::TlsParameters;

    let parameters = || {
        TlsParameters::new(connection.host.clone()).map_err(|e| {
            ConnectorError::new(
                crate::errors::ConnectorErrorKind::TlsFailed,
                format!("Could not set up TLS for {}: {}", connection.host, e),
            )
            .with_cause(e)
        })
    };

    Ok(match connection.security {
        SmtpSecurity::None => Tls::None,
        SmtpSecurity::StartTls => Tls::Required(parameters()?),
        SmtpSecurity::Implicit => Tls::Wrapper(parameters()?),
    })
}

#[cfg(not(any(feature = "rustls-tls", feature = "native-tls")))]
fn tls_for(connection: &SmtpConnection) -> ConnectorResult<Tls> {
    match connection.security {
        SmtpSecurity::None => Ok(Tls::None),
        _ => Err(ConnectorError::configuration(
            "TLS requested but the connector was built without a TLS backend",
        )),
    }
}
