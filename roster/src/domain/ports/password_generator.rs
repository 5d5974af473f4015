//! Driven port for temporary credential generation.

use crate::domain::directory::TemporaryPassword;

/// Source of initial sign-in secrets.
#[cfg_attr(test, mockall::automock)]
pub trait PasswordGenerator: Send + Sync {
    /// Produce a fresh secret.
    fn generate(&self) -> TemporaryPassword;
}
