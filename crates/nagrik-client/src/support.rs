//! Support chat widget.
//!
//! The second chat surface: a purely local scripted assistant. No backend
//! calls are made; the widget owns its transcript exclusively and cancels
//! any pending scripted reply when dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use nagrik_core::{normalize_message_body, ValidationError};

const GREETING: &str = "Hello! How can I help you today?";
const CANNED_REPLY: &str = "Thanks for your message! Our assistant is currently being trained. \
     In the meantime, I can help you with basic information about government schemes.";
const DEFAULT_REPLY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportMessage {
    pub body: String,
    pub from_user: bool,
}

pub struct SupportWidget {
    transcript: Arc<Mutex<Vec<SupportMessage>>>,
    pending_replies: Mutex<Vec<JoinHandle<()>>>,
    reply_delay: Duration,
}

impl SupportWidget {
    pub fn new() -> Self {
        Self::with_reply_delay(DEFAULT_REPLY_DELAY)
    }

    pub fn with_reply_delay(reply_delay: Duration) -> Self {
        Self {
            transcript: Arc::new(Mutex::new(vec![SupportMessage {
                body: GREETING.to_string(),
                from_user: false,
            }])),
            pending_replies: Mutex::new(Vec::new()),
            reply_delay,
        }
    }

    /// Append the user's message and schedule the scripted reply.
    pub fn send(&self, body: &str) -> Result<(), ValidationError> {
        let body = normalize_message_body(body)?;
        self.transcript
            .lock()
            .expect("support transcript lock")
            .push(SupportMessage {
                body,
                from_user: true,
            });

        let transcript = self.transcript.clone();
        let delay = self.reply_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            transcript
                .lock()
                .expect("support transcript lock")
                .push(SupportMessage {
                    body: CANNED_REPLY.to_string(),
                    from_user: false,
                });
        });
        self.pending_replies
            .lock()
            .expect("support replies lock")
            .push(handle);
        Ok(())
    }

    pub fn transcript(&self) -> Vec<SupportMessage> {
        self.transcript
            .lock()
            .expect("support transcript lock")
            .clone()
    }
}

impl Default for SupportWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SupportWidget {
    fn drop(&mut self) {
        if let Ok(handles) = self.pending_replies.lock() {
            for handle in handles.iter() {
                handle.abort();
            }
        }
    }
}
