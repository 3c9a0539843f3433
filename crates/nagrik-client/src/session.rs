//! Session gate.
//!
//! Wraps the auth capability's session watch channel. While the session is
//! still loading no child component may be started; when the user signs
//! out, every subordinate subscription registered with the gate is
//! disposed. That teardown is the one cross-component lifecycle invariant
//! the components share.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use nagrik_core::models::SessionState;

use crate::feed::MessageFeed;

/// A resource the gate tears down on sign-out.
pub trait Dispose: Send + Sync {
    fn dispose(&self);
}

impl Dispose for MessageFeed {
    fn dispose(&self) {
        MessageFeed::dispose(self);
    }
}

pub struct SessionGate {
    rx: watch::Receiver<SessionState>,
}

impl SessionGate {
    pub fn new(rx: watch::Receiver<SessionState>) -> Self {
        Self { rx }
    }

    pub fn snapshot(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Whether child components may be started.
    pub fn ready(&self) -> bool {
        !self.rx.borrow().loading
    }

    /// Wait until the auth provider has resolved the initial session.
    pub async fn resolved(&mut self) -> SessionState {
        loop {
            {
                let state = self.rx.borrow();
                if !state.loading {
                    return state.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                // Sender gone: report the last known state.
                return self.rx.borrow().clone();
            }
        }
    }

    /// Watch for the signed-in → signed-out edge and dispose the given
    /// subscriptions when it happens. The task finishes after one
    /// teardown; a new sign-in builds new components and a new guard.
    pub fn guard(&self, subscriptions: Vec<Arc<dyn Dispose>>) -> JoinHandle<()> {
        let mut rx = self.rx.clone();
        tokio::spawn(async move {
            let mut had_user = rx.borrow().user.is_some();
            while rx.changed().await.is_ok() {
                let has_user = {
                    let state = rx.borrow();
                    !state.loading && state.user.is_some()
                };
                if had_user && !has_user {
                    tracing::info!(
                        count = subscriptions.len(),
                        "Session ended, disposing subscriptions"
                    );
                    for subscription in &subscriptions {
                        subscription.dispose();
                    }
                    return;
                }
                had_user = has_user;
            }
        })
    }
}
