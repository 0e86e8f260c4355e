//! Best-effort email notification.
//!
//! The routing engine only ever sees the [`Notifier`] trait; whether a
//! message actually left the building is reported as a bool and nothing
//! more. Tests substitute a recording stub.

use async_trait::async_trait;

pub mod smtp;

pub use smtp::SmtpConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Attempts delivery and reports whether it happened. Must not panic
    /// and must not error: a failed send is an outcome, not a fault.
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> bool;
}

/// Production notifier: SMTP submission over implicit TLS.
///
/// Built from `SMTP_*` environment variables; when credentials are unset
/// every send is skipped and reported as not attempted.
pub struct SmtpNotifier {
    config: Option<SmtpConfig>,
}

impl SmtpNotifier {
    pub fn from_env() -> Self {
        let config = SmtpConfig::from_env();
        if config.is_none() {
            tracing::warn!("SMTP credentials not set; email delivery is disabled");
        }
        Self { config }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> bool {
        let Some(config) = &self.config else {
            tracing::info!(%to, "skipping email; SMTP credentials are not set");
            return false;
        };

        match smtp::submit(config, to, subject, html_body).await {
            Ok(()) => {
                tracing::info!(%to, %subject, "email sent");
                true
            }
            Err(e) => {
                tracing::warn!(%to, error = %e, "email delivery failed");
                false
            }
        }
    }
}
