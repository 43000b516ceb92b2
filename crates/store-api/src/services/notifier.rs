//! Delivery of password reset links.
//!
//! The store API has no outbound mail of its own. [`LogNotifier`] is the
//! default and only writes the request to the log; deployments that send
//! email plug their own [`PasswordResetNotifier`] into the application
//! state.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use avara_core::Email;

/// Delivery failed.
#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Sends a reset token to the account holder.
#[async_trait]
pub trait PasswordResetNotifier: Send + Sync {
    /// Deliver `token` to `email`.
    async fn send_password_reset(&self, email: &Email, token: &str) -> Result<(), NotifyError>;
}

/// Notifier that only logs.
///
/// The token itself is logged at `debug`, so local setups can complete a
/// reset by reading the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl PasswordResetNotifier for LogNotifier {
    async fn send_password_reset(&self, email: &Email, token: &str) -> Result<(), NotifyError> {
        info!(%email, "Password reset requested");
        debug!(%email, token, "Password reset token");
        Ok(())
    }
}
