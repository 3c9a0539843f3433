//! Shared helpers for component integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use nagrik_backend::{AuthApi, MemoryBackend};
use nagrik_core::models::AuthUser;

/// Poll `condition` until it holds or a couple of seconds pass. Events
/// travel through spawned consumer tasks, so tests wait instead of
/// assuming delivery is synchronous.
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Register and sign in a fresh user on the in-process backend.
pub async fn signed_in_user(backend: &Arc<MemoryBackend>, email: &str) -> AuthUser {
    backend
        .sign_up(email, "secret")
        .await
        .expect("test sign-up");
    backend
        .sign_in(email, "secret")
        .await
        .expect("test sign-in")
}
