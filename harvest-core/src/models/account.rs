//! Account credentials.

use std::fmt;

/// A secret value that never appears in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// One portal account whose report is harvested.
///
/// Input only: the core never persists credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredential {
    /// Human label; also used for artifact names and the source column.
    pub label: String,
    /// Login identity (usually an email address).
    pub identity: String,
    /// Login secret.
    pub secret: Secret,
}

impl AccountCredential {
    /// Creates a new credential.
    pub fn new(label: impl Into<String>, identity: impl Into<String>, secret: Secret) -> Self {
        Self {
            label: label.into(),
            identity: identity.into(),
            secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let account = AccountCredential::new("Ana", "ana@example.com", Secret::new("hunter2"));
        let debug = format!("{account:?}");

        assert!(debug.contains("ana@example.com"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(account.secret.to_string(), "***");
        assert_eq!(account.secret.expose(), "hunter2");
    }
}
