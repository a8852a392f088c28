//! Error taxonomy for the flyer pipeline.
//!
//! Every fallible operation in the crate returns [`Error`]. The runner decides
//! per variant whether a failure is fatal (configuration) or only ends the
//! current item or source (everything else).

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Network or HTTP failure while retrieving a page or a flyer.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Markup or embedded script did not have the expected shape.
    #[error("unexpected markup: {0}")]
    Parse(String),

    /// Staging filesystem failure.
    #[error("filesystem error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content store failure.
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// The external rasterizer could not be run or exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    /// The messaging channel rejected or never received a message.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Missing or malformed required configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        Error::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Short stable label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Fetch { .. } => "fetch",
            Error::Parse(_) => "parse",
            Error::Io { .. } | Error::Database(_) => "storage",
            Error::ExternalTool { .. } => "external_tool",
            Error::Delivery(_) => "delivery",
            Error::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_storage_failures() {
        let io = Error::io("tmp/x", std::io::Error::other("disk full"));
        assert_eq!(io.kind(), "storage");
        assert_eq!(Error::Parse("x".into()).kind(), "parse");
        assert_eq!(Error::fetch("http://a", "timeout").kind(), "fetch");
    }

    #[test]
    fn test_display_includes_context() {
        let e = Error::fetch("https://example.com/a.pdf", "status 404");
        assert_eq!(
            e.to_string(),
            "failed to fetch https://example.com/a.pdf: status 404"
        );
        let e = Error::io("tmp/roldao", std::io::Error::other("denied"));
        assert!(e.to_string().contains("tmp/roldao"));
    }
}
