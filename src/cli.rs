//! Command-line interface definitions.
//!
//! Every option can also be supplied through the environment, which is how
//! the bot is normally configured when run from cron or a container.

use crate::models::Market;
use clap::Parser;
use std::path::PathBuf;

/// Scrape supermarket flyers and forward new ones to a Telegram channel.
///
/// # Examples
///
/// ```sh
/// DATABASE_URL=postgres://bot@localhost/ofertas \
/// TELEGRAM_BOT_TOKEN=123:abc CHANNEL_ID=-1001234 ADMIN_CHAT_ID=5678 \
/// ofertas_bot
///
/// # Only São Vicente, no weekly report
/// ofertas_bot --only sao-vicente --skip-report
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: String,

    /// Channel that receives the flyers
    #[arg(long, env = "CHANNEL_ID", allow_negative_numbers = true)]
    pub channel_id: i64,

    /// Chat that receives the weekly report
    #[arg(long, env = "ADMIN_CHAT_ID", allow_negative_numbers = true)]
    pub admin_chat_id: i64,

    /// Working directory for downloads and page images; wiped on every run
    #[arg(long, env = "STAGING_DIR", default_value = "tmp")]
    pub staging_dir: PathBuf,

    /// Rasterization resolution in DPI
    #[arg(long, env = "RASTER_RESOLUTION", default_value_t = 80)]
    pub resolution: u32,

    /// pdftoppm executable
    #[arg(long, env = "PDFTOPPM_BIN", default_value = "pdftoppm")]
    pub pdftoppm: String,

    /// Days a fingerprint is remembered; also the report window
    #[arg(long, env = "RETENTION_DAYS", default_value_t = 7)]
    pub retention_days: u32,

    /// Database connection attempts before giving up
    #[arg(long, env = "DB_MAX_ATTEMPTS", default_value_t = 10)]
    pub db_max_attempts: u32,

    /// Delay after the first failed connection attempt, doubled each time
    #[arg(long, env = "DB_RETRY_BASE_SECS", default_value_t = 15)]
    pub db_retry_base_secs: u64,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// Scrape only these markets (repeatable); the report still covers all
    #[arg(long, value_enum)]
    pub only: Vec<Market>,

    /// Do not send the weekly report
    #[arg(long)]
    pub skip_report: bool,
}

impl Cli {
    /// Markets to scrape, in the fixed order regardless of flag order.
    pub fn markets(&self) -> Vec<Market> {
        if self.only.is_empty() {
            return Market::ALL.to_vec();
        }
        Market::ALL
            .into_iter()
            .filter(|m| self.only.contains(m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "ofertas_bot",
        "--database-url",
        "postgres://localhost/ofertas",
        "--telegram-bot-token",
        "123:abc",
        "--channel-id",
        "-1001234",
        "--admin-chat-id",
        "42",
    ];

    #[test]
    fn test_cli_parsing_with_defaults() {
        let cli = Cli::try_parse_from(REQUIRED).unwrap();

        assert_eq!(cli.channel_id, -1001234);
        assert_eq!(cli.admin_chat_id, 42);
        assert_eq!(cli.staging_dir, PathBuf::from("tmp"));
        assert_eq!(cli.resolution, 80);
        assert_eq!(cli.retention_days, 7);
        assert_eq!(cli.db_max_attempts, 10);
        assert_eq!(cli.markets(), Market::ALL.to_vec());
        assert!(!cli.skip_report);
    }

    #[test]
    fn test_only_keeps_fixed_order() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--only", "sao-vicente", "--only", "roldao"]);
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.markets(), vec![Market::Roldao, Market::SaoVicente]);
    }

    #[test]
    fn test_malformed_chat_id_is_rejected() {
        let mut args = REQUIRED.to_vec();
        args[6] = "not-a-number";
        assert!(Cli::try_parse_from(args).is_err());
    }
}
