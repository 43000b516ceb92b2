//! Business logic services.
//!
//! - [`token`] - bearer token issuance and verification
//! - [`resolver`] - token claims to customer resolution
//! - [`auth`] - registration, login and logout bookkeeping
//! - [`notifier`] - delivery of password reset tokens
//! - [`backfill`] - one-off repair of identity links for legacy customers

pub mod auth;
pub mod backfill;
pub mod notifier;
pub mod resolver;
pub mod token;

pub use auth::{AuthError, AuthService, AuthSession, PasswordReset, Registration};
pub use backfill::{BackfillReport, backfill_identity_links};
pub use notifier::{LogNotifier, NotifyError, PasswordResetNotifier};
pub use resolver::{CustomerResolver, ResolutionStep, ResolveError, Resolved};
pub use token::{
    PASSWORD_RESET_TTL, ResetClaims, TOKEN_VERSION, TokenClaims, TokenError, TokenService,
};
