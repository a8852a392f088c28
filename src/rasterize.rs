//! PDF to page-image conversion through an external rasterizer.

use crate::error::{Error, Result};
use crate::utils::truncate_for_log;
use std::path::Path;
use tokio::process::Command;
use tracing::{info, instrument};

/// Converts a staged PDF into page images inside `out_dir`.
pub trait Rasterize {
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<()>;
}

/// `pdftoppm` from poppler-utils.
///
/// Runs `pdftoppm -r <dpi> <pdf> <out_dir>/page -png`, which writes
/// `page-1.png`, `page-2.png`, ... (zero-padded for longer documents).
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    pub binary: String,
    pub resolution: u32,
}

impl Pdftoppm {
    pub fn new(binary: impl Into<String>, resolution: u32) -> Self {
        Self {
            binary: binary.into(),
            resolution,
        }
    }

    fn command(&self, pdf: &Path, out_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-r")
            .arg(self.resolution.to_string())
            .arg(pdf)
            .arg(out_dir.join("page"))
            .arg("-png");
        cmd
    }
}

impl Rasterize for Pdftoppm {
    #[instrument(level = "info", skip(self), fields(pdf = %pdf.display(), out_dir = %out_dir.display()))]
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<()> {
        let output = self
            .command(pdf, out_dir)
            .output()
            .await
            .map_err(|e| Error::ExternalTool {
                tool: self.binary.clone(),
                reason: format!("cannot run: {e} (is poppler-utils installed?)"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExternalTool {
                tool: self.binary.clone(),
                reason: format!("{}: {}", output.status, truncate_for_log(stderr.trim(), 300)),
            });
        }
        info!(resolution = self.resolution, "Rasterized PDF");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Writes `pages` placeholder PNGs instead of running a tool, then fails
    /// when `fail` is set, like a PDF that breaks partway through.
    #[derive(Debug, Default)]
    pub struct FakeRasterizer {
        pub pages: usize,
        pub fail: bool,
        pub calls: Mutex<Vec<std::path::PathBuf>>,
    }

    impl Rasterize for FakeRasterizer {
        async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(pdf.to_path_buf());
            for page in 1..=self.pages {
                std::fs::write(out_dir.join(format!("page-{page:02}.png")), b"png")
                    .map_err(|e| Error::io(out_dir, e))?;
            }
            if self.fail {
                return Err(Error::ExternalTool {
                    tool: "fake".into(),
                    reason: "broken pdf".into(),
                });
            }
            Ok(())
        }
    }
}
