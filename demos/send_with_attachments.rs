//! Email with Attachments Example
//!
//! This example demonstrates how to:
//! - Point the connector at an attachments folder
//! - Attach a file from that folder and an inline base64 payload
//! - Run a workflow command and print its response
//!
//! Set `SMTP_HOST`, `SMTP_USER` and `SMTP_PASSWORD` to send for real.

use integrations_smtp_connector::{ConnectorConfig, ConnectorError, SmtpConnector};
use serde_json::json;
use std::fs;

#[tokio::main]
async fn main() -> Result<(), ConnectorError> {
    // Lay out an attachments folder with one report in it
    let folder = std::env::temp_dir().join("smtp-connector-demo");
    fs::create_dir_all(folder.join("reports"))
        .map_err(|e| ConnectorError::io(format!("Could not create demo folder: {}", e)))?;
    fs::write(folder.join("reports").join("q1.csv"), "region,total\neu,42\nus,57\n")
        .map_err(|e| ConnectorError::io(format!("Could not write demo report: {}", e)))?;

    let config = ConnectorConfig::builder()
        .attachments_root(&folder)
        .attachments_limit_mb(10)
        .build()?;

    println!("Creating connector...");
    let connector = SmtpConnector::new(config)?;

    let host = std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());
    let params = json!({
        "smtp_host": host,
        "smtp_port": 587,
        "smtp_user": std::env::var("SMTP_USER").ok(),
        "smtp_password": std::env::var("SMTP_PASSWORD").ok(),
        "smtp_starttls": true,
        "email_from": "reports@example.com",
        "email_to": "alice@example.com; bob@example.com",
        "email_bcc": "archive@example.com",
        "email_subject": "Quarterly report",
        "email_body": "The Q1 numbers are attached.",
        "email_body_html": "<p>The <b>Q1</b> numbers are attached.</p>",
        "attachments": [
            {"path": "reports/q1.csv"},
            {"filename": "notes.txt", "content_base64": "U2VlIHlvdSBhdCB0aGUgcmV2aWV3Lg=="}
        ]
    });

    println!("Sending...");
    let response = connector.execute_json(params).await;

    for line in &response.logs {
        println!("  {}", line);
    }
    match &response.error {
        None => println!("Sent."),
        Some(error) => println!("Failed: {} ({})", error.message, error.error_code),
    }

    let metrics = connector.metrics().snapshot();
    println!("Emails sent: {}, failed: {}", metrics.emails_sent, metrics.emails_failed);

    Ok(())
}
