// src/mail.rs

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

/// An outgoing plain-text email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: Vec<String>,
}

/// Delivery backend for outgoing mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError>;
}

/// Writes every message to the log instead of delivering it.
/// Message bodies, which hold invite codes, are logged at `debug` only.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        tracing::info!(
            target: "mail",
            from = %message.from,
            to = ?message.to,
            subject = %message.subject,
            "Mail sent"
        );
        tracing::debug!(target: "mail", "{}", message.body);
        Ok(())
    }
}

/// Keeps sent messages in memory so they can be inspected later.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<EmailMessage>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        self.outbox
            .lock()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            subject: "Quiz Invite!".to_string(),
            body: "You've been invited to Geography.".to_string(),
            from: "owner@quiz.com".to_string(),
            to: vec![to.to_string()],
        }
    }

    #[tokio::test]
    async fn test_memory_mailer_records_in_order() {
        let mailer = MemoryMailer::new();
        mailer.send(&message("a@test.com")).await.unwrap();
        mailer.send(&message("b@test.com")).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, vec!["a@test.com".to_string()]);
        assert_eq!(sent[1].to, vec!["b@test.com".to_string()]);
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_messages() {
        assert!(LogMailer.send(&message("a@test.com")).await.is_ok());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_log_mailer_keeps_body_out_of_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut invite = message("a@test.com");
        invite.body = "Accept the invite with the code 3f2b-secret.".to_string();
        LogMailer.send(&invite).await.unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Quiz Invite!"));
        assert!(output.contains("a@test.com"));
        assert!(!output.contains("3f2b-secret"));
    }
}
