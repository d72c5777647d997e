//! Opaque credential provider
//!
//! Upstream token issuance is out of scope; feeds only need something that
//! yields the current session credential on demand.

use async_trait::async_trait;

/// Supplies the session credential used by both the push and pull feeds
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current credential (approval key / access token)
    async fn credential(&self) -> anyhow::Result<String>;
}

/// Fixed credential, e.g. injected from configuration or environment
pub struct StaticToken {
    credential: String,
}

impl StaticToken {
    /// Wrap a fixed credential string
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn credential(&self) -> anyhow::Result<String> {
        Ok(self.credential.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_returns_credential() {
        let tokens = StaticToken::new("abc-123");
        assert_eq!(tokens.credential().await.unwrap(), "abc-123");
    }
}
