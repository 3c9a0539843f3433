//! Data models for the application
//!
//! This module contains all data structures used throughout the application,
//! organized by domain. Each sub-module represents a specific feature area.

mod document;
mod message;
mod profile;
mod user;

// Re-export all models for convenient imports
pub use document::*;
pub use message::*;
pub use profile::*;
pub use user::*;
