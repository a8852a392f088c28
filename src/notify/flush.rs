//! Deliver staged images and clear the staging area.
//!
//! For every staged source with images: one header message, then the images
//! of each batch directory in groups of at most [`MAX_GROUP`]. Groups never
//! span two batch directories. Delivery is best effort; the staging area is
//! reset afterwards whatever happened.

use super::{ChatId, Messenger};
use crate::error::Result;
use crate::staging::{StagedSource, StagingArea};
use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

/// Largest number of images in one grouped message.
pub const MAX_GROUP: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Photos(Vec<PathBuf>),
}

/// Counters for one flush.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    pub sent: usize,
    pub failed: usize,
}

pub fn header(source: &str) -> String {
    format!("Ofertas do {source}")
}

/// Turn staged sources into the ordered list of messages to send.
pub fn plan(sources: &[StagedSource]) -> Vec<Outbound> {
    let mut out = Vec::new();
    for source in sources {
        out.push(Outbound::Text(header(&source.name)));
        for batch in &source.batches {
            for group in batch.chunks(MAX_GROUP) {
                out.push(Outbound::Photos(group.to_vec()));
            }
        }
    }
    out
}

/// Send everything staged to `chat_id`, then reset the staging area.
///
/// # Arguments
///
/// * `staging` - Staging area to drain
/// * `messenger` - Channel client used for every message
/// * `chat_id` - Destination chat
///
/// # Returns
///
/// How many messages went out and how many failed. Errors only when the
/// staging area cannot be reset; scanning and delivery failures are logged
/// and counted.
///
/// # Examples
///
/// ```ignore
/// // 23 staged pages of one PDF: a header and groups of 10, 10 and 3.
/// let stats = flush(&staging, &bot, channel_id).await?;
/// assert_eq!(stats, FlushStats { sent: 4, failed: 0 });
/// ```
#[instrument(level = "info", skip_all, fields(root = %staging.root().display()))]
pub async fn flush<M: Messenger>(staging: &StagingArea, messenger: &M, chat_id: ChatId) -> Result<FlushStats> {
    let mut stats = FlushStats::default();

    match staging.pending().await {
        Ok(sources) => {
            let images: usize = sources.iter().map(StagedSource::image_count).sum();
            info!(sources = sources.len(), images, "Delivering staged images");
            for message in plan(&sources) {
                let result = match &message {
                    Outbound::Text(text) => messenger.send_text(chat_id, text).await,
                    Outbound::Photos(photos) => messenger.send_photos(chat_id, photos).await,
                };
                match result {
                    Ok(()) => stats.sent += 1,
                    Err(e) => {
                        stats.failed += 1;
                        warn!(error = %e, "Message delivery failed");
                    }
                }
            }
        }
        Err(e) => error!(error = %e, "Could not scan staging area"),
    }

    staging.reset().await?;
    info!(sent = stats.sent, failed = stats.failed, "Flushed staging area");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Market;
    use crate::notify::fake::{RecordingMessenger, Sent};
    use tempfile::TempDir;

    async fn stage_images(staging: &StagingArea, market: Market, batch: &str, n: usize) {
        for i in 0..n {
            staging
                .write(market, &format!("{batch}/page-{i:02}.png"), b"png")
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_twenty_three_images_make_header_and_three_groups() {
        let tmp = TempDir::new().unwrap();
        let staging = StagingArea::new(tmp.path());
        stage_images(&staging, Market::SaoVicente, "1700000000", 23).await;
        let messenger = RecordingMessenger::default();

        let stats = flush(&staging, &messenger, -100).await.unwrap();

        let sent = messenger.messages();
        assert_eq!(stats, FlushStats { sent: 4, failed: 0 });
        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[0],
            Sent::Text(-100, "Ofertas do Supermercados São Vicente".to_string())
        );
        let sizes: Vec<usize> = sent[1..]
            .iter()
            .map(|m| match m {
                Sent::Photos(_, p) => p.len(),
                Sent::Text(..) => panic!("unexpected text"),
            })
            .collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    #[tokio::test]
    async fn test_batches_go_out_in_numeric_order() {
        let tmp = TempDir::new().unwrap();
        let staging = StagingArea::new(tmp.path());
        stage_images(&staging, Market::Roldao, "900", 1).await;
        stage_images(&staging, Market::Roldao, "1000", 2).await;
        let messenger = RecordingMessenger::default();

        flush(&staging, &messenger, 1).await.unwrap();

        let sent = messenger.messages();
        assert_eq!(sent.len(), 3);
        let Sent::Photos(_, first) = &sent[1] else { panic!() };
        assert!(first[0].to_string_lossy().contains("/900/"));
        let Sent::Photos(_, second) = &sent[2] else { panic!() };
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_staging_is_emptied_even_when_delivery_fails() {
        let tmp = TempDir::new().unwrap();
        let staging = StagingArea::new(tmp.path().join("stage"));
        stage_images(&staging, Market::Delta, "5", 3).await;
        let messenger = RecordingMessenger::failing();

        let stats = flush(&staging, &messenger, 1).await.unwrap();

        assert_eq!(stats, FlushStats { sent: 0, failed: 2 });
        assert!(staging.root().is_dir());
        assert_eq!(std::fs::read_dir(staging.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_staging_sends_nothing() {
        let tmp = TempDir::new().unwrap();
        let staging = StagingArea::new(tmp.path());
        staging.write(Market::PagueMenos, "ofertas.pdf", b"%PDF").await.unwrap();
        let messenger = RecordingMessenger::default();

        let stats = flush(&staging, &messenger, 1).await.unwrap();

        assert_eq!(stats, FlushStats::default());
        assert!(messenger.messages().is_empty());
        assert_eq!(std::fs::read_dir(staging.root()).unwrap().count(), 0);
    }
}
