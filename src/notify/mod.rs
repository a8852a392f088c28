//! Outbound notifications.
//!
//! - [`flush`]: deliver every staged image, then clear the staging area
//! - [`report`]: weekly presence/absence summary for the administrator
//! - [`telegram`]: Bot API transport implementing [`Messenger`]

use crate::error::Result;
use std::path::PathBuf;

pub mod flush;
pub mod report;
pub mod telegram;

/// Numeric chat or channel identifier.
pub type ChatId = i64;

/// Delivery seam for text and grouped-image messages.
pub trait Messenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Send up to ten photos as one message.
    async fn send_photos(&self, chat_id: ChatId, photos: &[PathBuf]) -> Result<()>;
}
