use std::sync::{PoisonError, RwLock};

/// Holder of the single bearer token used to authenticate uploads.
///
/// Where the token is persisted is up to the implementation.
pub trait CredentialStore: Send + Sync + 'static {
    fn token(&self) -> Option<String>;
    /// Stores a token. A blank token clears the store.
    fn set_token(&self, token: &str);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn with_token(token: &str) -> Self {
        let store = Self::default();
        store.set_token(token);
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_token(&self, token: &str) {
        let token = token.trim();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) =
            (!token.is_empty()).then(|| token.to_string());
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
