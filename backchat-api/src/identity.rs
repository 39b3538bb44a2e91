use crate::User;

/// The session provider. The engine asks for the signed-in user on every
/// operation rather than caching it, so sign-out takes effect immediately.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;
}
