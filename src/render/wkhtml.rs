use super::PdfConverter;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

const DEFAULT_BINARY: &str = "wkhtmltopdf";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs `wkhtmltopdf`, feeding HTML on stdin and reading the PDF back from a
/// temp file that is removed when this call returns.
#[derive(Debug, Clone)]
pub struct WkhtmlToPdf {
    binary: PathBuf,
    timeout: Duration,
}

impl WkhtmlToPdf {
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| PathBuf::from(DEFAULT_BINARY)),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Default for WkhtmlToPdf {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl PdfConverter for WkhtmlToPdf {
    async fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>> {
        let out = tempfile::Builder::new()
            .prefix("resumeflow-")
            .suffix(".pdf")
            .tempfile()?;

        let mut child = Command::new(&self.binary)
            .args(["--quiet", "--encoding", "utf-8", "-"])
            .arg(out.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Render(format!(
                    "failed to start {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(html.as_bytes())
                .await
                .map_err(|e| Error::Render(format!("failed to send HTML: {}", e)))?;
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Render(format!("timed out after {:?}", self.timeout)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Render(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        let pdf = tokio::fs::read(out.path()).await?;
        if !pdf.starts_with(b"%PDF") {
            return Err(Error::Render("converter produced no PDF output".to_string()));
        }

        debug!(bytes = pdf.len(), "wkhtmltopdf finished");
        Ok(pdf)
    }
}
