//! Bearer token to user resolution.

use std::collections::BTreeMap;

use modelshot_core::identifier::UserId;

/// Maps an opaque bearer token to a user.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<UserId>;
}

/// Resolves tokens from a fixed table, such as `[access].tokens`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: BTreeMap<String, UserId>,
}

impl StaticTokens {
    pub fn new(tokens: &BTreeMap<String, String>) -> Self {
        Self {
            tokens: tokens
                .iter()
                .filter(|(token, _)| !token.is_empty())
                .map(|(token, user)| (token.clone(), UserId::new(user.as_str())))
                .collect(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, user: UserId) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

impl IdentityResolver for StaticTokens {
    fn resolve(&self, token: &str) -> Option<UserId> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        self.tokens.get(token).cloned()
    }
}
