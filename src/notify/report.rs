//! Weekly presence/absence report.
//!
//! Lists every known market exactly once, in fixed order, with ✅ when at
//! least one flyer was recorded for it inside the window and ❌ otherwise.

use super::{ChatId, Messenger};
use crate::error::Result;
use crate::models::{FlyerRecord, Market};
use crate::store::FlyerStore;
use chrono::{Duration, Utc};
use itertools::Itertools;
use std::fmt::Write;
use tracing::{info, instrument};

const TITLE: &str = "Relatório de ofertas da semana:";

/// Render the report text for the records inside the window.
pub fn build_report(records: &[FlyerRecord]) -> String {
    let counts = records
        .iter()
        .filter_map(|r| Market::from_name(&r.source))
        .counts();

    let mut text = format!("{TITLE}\n\n");
    for market in Market::ALL {
        let status = if counts.get(&market).copied().unwrap_or(0) > 0 {
            "✅"
        } else {
            "❌"
        };
        let _ = writeln!(text, "{}: {status}", market.name());
    }
    text
}

/// Query the last `window` of records and send the report to `admin_chat`.
///
/// # Arguments
///
/// * `store` - Content store holding the flyer records
/// * `messenger` - Channel client
/// * `admin_chat` - Administrator chat receiving the report
/// * `window` - How far back a record counts as "this week"
///
/// # Returns
///
/// `Ok(())` once the report is delivered; store and delivery failures are
/// returned to the caller.
#[instrument(level = "info", skip(store, messenger))]
pub async fn send_report<S: FlyerStore, M: Messenger>(
    store: &S,
    messenger: &M,
    admin_chat: ChatId,
    window: Duration,
) -> Result<()> {
    let records = store.records_since(Utc::now() - window).await?;
    let text = build_report(&records);
    messenger.send_text(admin_chat, &text).await?;
    info!(records = records.len(), "Sent weekly report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::fake::{RecordingMessenger, Sent};
    use crate::store::memory::MemoryStore;

    fn record(id: &str, market: Market) -> FlyerRecord {
        FlyerRecord {
            id: id.into(),
            source: market.name().into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_lists_every_market_once() {
        let records = vec![
            record("a", Market::Delta),
            record("b", Market::Delta),
            record("c", Market::SaoVicente),
        ];
        let text = build_report(&records);

        assert_eq!(
            text,
            "Relatório de ofertas da semana:\n\n\
             Roldão Atacadista: ❌\n\
             Supermercados Pague Menos: ❌\n\
             Delta Supermercados: ✅\n\
             Supermercados São Vicente: ✅\n"
        );
    }

    #[test]
    fn test_report_ignores_unknown_sources() {
        let mut stray = record("x", Market::Roldao);
        stray.source = "Mercado Fechado".into();
        let text = build_report(&[stray]);
        assert!(!text.contains("Mercado Fechado"));
        assert_eq!(text.matches('❌').count(), 4);
    }

    #[tokio::test]
    async fn test_send_report_uses_window() {
        let store = MemoryStore::default();
        store.insert("old", Market::Roldao.name()).await.unwrap();
        store.insert("new", Market::PagueMenos.name()).await.unwrap();
        store.backdate("old", Utc::now() - Duration::days(10));
        let messenger = RecordingMessenger::default();

        send_report(&store, &messenger, 42, Duration::days(7)).await.unwrap();

        let sent = messenger.messages();
        assert_eq!(sent.len(), 1);
        let Sent::Text(chat, text) = &sent[0] else {
            panic!("expected text message");
        };
        assert_eq!(*chat, 42);
        assert!(text.contains("Roldão Atacadista: ❌"));
        assert!(text.contains("Supermercados Pague Menos: ✅"));
    }
}
