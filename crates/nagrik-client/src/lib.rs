//! Nagrik Client Library
//!
//! The stateful client-side components of the citizen-services portal:
//! the session gate, the document upload tracker, the realtime message
//! feed, the local support widget and the profile view. Components take
//! their backend capabilities as `Arc<dyn …>` at construction and own
//! their local state exclusively.

pub mod feed;
pub mod profile;
pub mod session;
pub mod support;
pub mod upload;

// Re-export commonly used types
pub use feed::{FeedEntry, FeedError, MessageFeed};
pub use profile::{ProfileError, ProfileView};
pub use session::{Dispose, SessionGate};
pub use support::{SupportMessage, SupportWidget};
pub use upload::{SelectedFile, UploadError, UploadState, UploadTracker};
