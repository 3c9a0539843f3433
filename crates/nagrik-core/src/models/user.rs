use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated user as reported by the backend auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Session snapshot published by the auth implementation over a watch
/// channel. While `loading` is true no child component may be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub loading: bool,
    pub user: Option<AuthUser>,
}

impl SessionState {
    /// Initial state before the auth provider has resolved the session.
    pub fn loading() -> Self {
        Self {
            loading: true,
            user: None,
        }
    }

    pub fn signed_in(user: AuthUser) -> Self {
        Self {
            loading: false,
            user: Some(user),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            loading: false,
            user: None,
        }
    }
}
