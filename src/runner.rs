//! One batch run over every configured market.
//!
//! For each market, in order: discover → fetch → ingest → rasterize new PDFs
//! → flush staged images to the channel. Failures are collected into the
//! market's [`SourceOutcome`] and never stop the other markets. After all
//! markets, records older than the retention window are pruned and the
//! weekly report goes to the administrator.

use crate::error::Result;
use crate::fetch::Fetch;
use crate::ingest::{Ingested, Ingestor};
use crate::models::{FlyerKind, FlyerLink, Market, RunSummary, SourceOutcome};
use crate::notify::flush::flush;
use crate::notify::report::send_report;
use crate::notify::{ChatId, Messenger};
use crate::rasterize::Rasterize;
use crate::scrapers;
use crate::staging::StagingArea;
use crate::store::FlyerStore;
use chrono::{Duration, Utc};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub channel_id: ChatId,
    pub admin_chat_id: ChatId,
    /// Records older than this are pruned; also the report window.
    pub retention: Duration,
    pub markets: Vec<Market>,
    pub send_report: bool,
}

pub struct Runner<'a, F, S, R, M> {
    pub fetcher: &'a F,
    pub store: &'a S,
    pub staging: &'a StagingArea,
    pub rasterizer: &'a R,
    pub messenger: &'a M,
    pub config: RunConfig,
}

impl<'a, F, S, R, M> Runner<'a, F, S, R, M>
where
    F: Fetch,
    S: FlyerStore,
    R: Rasterize,
    M: Messenger,
{
    /// Process every market, prune, report.
    ///
    /// Only a staging area that cannot be reset aborts the run, since
    /// continuing would resend the same images.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for &market in &self.config.markets {
            info!(%market, "Extracting offers");
            let mut outcome = self.process_source(market).await;

            info!(%market, "Sending offers");
            let stats = flush(self.staging, self.messenger, self.config.channel_id).await?;
            outcome.messages_sent = stats.sent;
            if stats.failed > 0 {
                outcome
                    .failures
                    .push(format!("{} message(s) not delivered", stats.failed));
            }

            info!(
                %market,
                discovered = outcome.discovered,
                new = outcome.new,
                duplicates = outcome.duplicates,
                failures = outcome.failures.len(),
                messages = outcome.messages_sent,
                "Finished market"
            );
            summary.sources.push((market, outcome));
        }

        let cutoff = Utc::now() - self.config.retention;
        match self.store.delete_older_than(cutoff).await {
            Ok(n) => {
                info!(deleted = n, %cutoff, "Pruned old records");
                summary.pruned = n;
            }
            Err(e) => error!(error = %e, "Retention sweep failed"),
        }

        if self.config.send_report {
            info!("Sending weekly report");
            match send_report(
                self.store,
                self.messenger,
                self.config.admin_chat_id,
                self.config.retention,
            )
            .await
            {
                Ok(()) => summary.report_sent = true,
                Err(e) => error!(error = %e, "Weekly report failed"),
            }
        }

        Ok(summary)
    }

    /// Discover and ingest everything for one market.
    #[instrument(level = "info", skip(self), fields(%market))]
    pub async fn process_source(&self, market: Market) -> SourceOutcome {
        let mut outcome = SourceOutcome::default();

        let discovery = match scrapers::discover(market, self.fetcher).await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Discovery failed; skipping market");
                outcome.failures.push(e.to_string());
                return outcome;
            }
        };
        outcome.discovered = discovery.links.len();
        outcome.failures.extend(discovery.skipped);

        let ingestor = Ingestor::new(self.store, self.staging);
        let mut image_batch: Option<String> = None;

        for link in &discovery.links {
            match self.process_link(market, link, &ingestor, &mut image_batch).await {
                Ok(true) => outcome.new += 1,
                Ok(false) => outcome.duplicates += 1,
                Err(e) => {
                    warn!(url = %link.url, error = %e, kind = e.kind(), "Skipping flyer");
                    outcome.failures.push(format!("{}: {e}", link.url));
                }
            }
        }
        outcome
    }

    /// Returns whether the link carried new content.
    async fn process_link(
        &self,
        market: Market,
        link: &FlyerLink,
        ingestor: &Ingestor<'_, S>,
        image_batch: &mut Option<String>,
    ) -> Result<bool> {
        let bytes = self.fetcher.get_bytes(&link.url).await?;

        match link.kind {
            FlyerKind::Pdf => {
                let Ingested::New { fingerprint, path } =
                    ingestor.ingest(market, &link.filename, &bytes).await?
                else {
                    return Ok(false);
                };
                let out_dir = self.staging.new_batch_dir(market).await?;
                if let Err(e) = self.rasterizer.rasterize(&path, &out_dir).await {
                    // Drop partial pages and forget the record so the flyer is
                    // retried next run without anything having been sent.
                    self.staging.discard_dir(&out_dir).await;
                    self.staging.discard(&path).await;
                    if let Err(undo) = self.store.remove(&fingerprint).await {
                        error!(%fingerprint, error = %undo, "Could not roll back record");
                    }
                    return Err(e);
                }
                Ok(true)
            }
            FlyerKind::Image => {
                let batch = match image_batch.as_ref() {
                    Some(batch) => batch.clone(),
                    None => {
                        let dir = self.staging.new_batch_dir(market).await?;
                        let name = dir
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        image_batch.insert(name).clone()
                    }
                };
                let relative = format!("{batch}/{}", link.filename);
                let ingested = ingestor.ingest(market, &relative, &bytes).await?;
                debug!(fingerprint = ingested.fingerprint(), %relative, "Image processed");
                Ok(!ingested.already_existed())
            }
        }
    }
}
