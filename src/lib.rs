//! Telegram message media downloader
//!
//! This library provides tools to:
//! - Parse a links file of `<message link> ; <description>` lines
//! - Resolve private, public and discussion-comment message links
//! - Turn descriptions into safe, unique file names
//! - Stream message media to disk with throttled progress logging
//! - Infer file extensions from content

pub mod chat;
pub mod config;
pub mod download;
pub mod error;
pub mod input;
pub mod links;
pub mod media;
pub mod metrics;
pub mod naming;
pub mod progress;
pub mod session;
pub mod sniff;

// Re-export common types
pub use config::{Config, DownloadSettings};
pub use error::{Error, Result};
pub use links::{LinkPeer, MessageLink};
pub use naming::{sanitize_filename, NameAllocator};
pub use session::{check_session_exists, get_client, SessionLock};

pub mod commands;
