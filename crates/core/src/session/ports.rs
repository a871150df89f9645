//! Port interfaces for session-scoped persistence
//!
//! These traits separate the credential store from where the bytes live.

use authwire_domain::Result;

/// Key-value storage scoped to one session.
///
/// Values written here outlive a reload of the same session, not the
/// session itself.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Apply several changes as one write. `None` removes the key.
    ///
    /// The default applies them one at a time. Storage that can commit a
    /// batch at once overrides it, so readers never see half a batch.
    fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        for (key, value) in changes {
            match value {
                Some(value) => self.set(key, value)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}

/// Read access to cookies the server has set.
pub trait CookieSource: Send + Sync {
    /// Current value of the cookie `name`, if any.
    fn cookie(&self, name: &str) -> Option<String>;
}
