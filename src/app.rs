//! Application orchestration: resume intake, analysis, logging and reports.

use crate::ai::{mime, GeminiClient, GenerativeModel, RemoteCaller, RetryPolicy};
use crate::analysis::{AnalysisOutcome, AnalysisRequest, Analyzer};
use crate::history::{HistoryHandle, HistoryWriter, InteractionStore, LogSummary, NewInteraction};
use crate::image::{PageRasterizer, PopplerRasterizer};
use crate::models::{Config, ContentPart, UserIdentity};
use crate::render::{PdfConverter, ReportRenderer, WkhtmlToPdf};
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Check `given` against the configured admin password. With none
/// configured every caller is allowed.
pub fn authorize_admin(expected: Option<&str>, given: Option<&str>) -> Result<()> {
    match expected {
        Some(expected) if given != Some(expected) => {
            Err(Error::AccessDenied("incorrect admin password".to_string()))
        }
        _ => Ok(()),
    }
}

/// Ties the model, rasterizer, renderer and interaction log together.
pub struct App {
    analyzer: Analyzer,
    rasterizer: Box<dyn PageRasterizer>,
    renderer: ReportRenderer,
    history: HistoryHandle,
    history_task: JoinHandle<()>,
    retention_days: i64,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub model: Arc<dyn GenerativeModel>,
    pub rasterizer: Box<dyn PageRasterizer>,
    pub pdf: Arc<dyn PdfConverter>,
    pub store: InteractionStore,
}

/// Tunables taken from [`Config`].
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub model: String,
    pub retry: RetryPolicy,
    pub retention_days: i64,
}

impl AppSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.gemini_model.clone(),
            retry: RetryPolicy::new(config.max_attempts)
                .with_attempt_timeout(config.request_timeout),
            retention_days: config.history_retention_days,
        }
    }
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// Must be called inside a tokio runtime: the interaction log writer is
    /// spawned here.
    pub fn with_services(services: AppServices, settings: AppSettings) -> Self {
        let caller = RemoteCaller::new(services.model).with_policy(settings.retry);
        let (history, history_task) = HistoryWriter::spawn(services.store);

        Self {
            analyzer: Analyzer::new(caller, settings.model),
            rasterizer: services.rasterizer,
            renderer: ReportRenderer::new(services.pdf),
            history,
            history_task,
            retention_days: settings.retention_days,
        }
    }

    /// Construct the production app and prune stale history.
    pub async fn new(config: Config) -> Result<Self> {
        let model = GeminiClient::new(config.api_key()?.to_string())?
            .with_base_url(config.gemini_base_url.clone());
        info!("Model provider: Gemini (default model: {})", config.gemini_model);

        let services = AppServices {
            model: Arc::new(model),
            rasterizer: Box::new(PopplerRasterizer::new(config.poppler_path.as_deref())),
            pdf: Arc::new(WkhtmlToPdf::new(config.wkhtmltopdf_path.clone())),
            store: InteractionStore::new(config.db_file.clone()),
        };
        let app = Self::with_services(services, AppSettings::from_config(&config));

        app.prune_on_startup().await;
        Ok(app)
    }

    pub fn default_model(&self) -> &str {
        self.analyzer.default_model()
    }

    /// Prune with the configured retention. Failures are logged, not raised.
    pub async fn prune_on_startup(&self) {
        match self.history.prune(self.retention_days).await {
            Ok(true) => info!(days = self.retention_days, "Old interaction history cleaned up"),
            Ok(false) => {}
            Err(e) => warn!("Failed to prune interaction history: {}", e),
        }
    }

    pub async fn load_resume(&self, path: &Path, max_pages: u32) -> Result<Vec<ContentPart>> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.resume_parts(bytes, &name, max_pages).await
    }

    /// Turn an uploaded resume into model input.
    ///
    /// PDFs are rasterized page by page, images are passed through, and
    /// UTF-8 text is sent as a text part.
    pub async fn resume_parts(
        &self,
        bytes: Vec<u8>,
        name: &str,
        max_pages: u32,
    ) -> Result<Vec<ContentPart>> {
        if mime::is_pdf(&bytes) {
            let pages = self.rasterizer.rasterize(&bytes, max_pages).await?;
            if pages.is_empty() {
                return Err(Error::MissingInput(format!(
                    "no pages could be extracted from '{}'",
                    name
                )));
            }
            info!(resume = name, pages = pages.len(), "Resume rasterized");
            return Ok(pages);
        }

        if mime::sniff_mime(&bytes).is_some() {
            return Ok(vec![ContentPart::image(bytes)]);
        }

        match String::from_utf8(bytes) {
            Ok(text) if !text.trim().is_empty() => {
                Ok(vec![ContentPart::text(format!("Resume:\n{}", text.trim()))])
            }
            Ok(_) => Err(Error::MissingInput(format!("resume '{}' is empty", name))),
            Err(_) => Err(Error::MissingInput(format!(
                "resume '{}' is not a PDF, image or text file",
                name
            ))),
        }
    }

    /// Run one analysis and record it in the interaction log.
    pub async fn analyze(&self, request: &AnalysisRequest, user: &UserIdentity) -> AnalysisOutcome {
        let outcome = self.analyzer.run(request).await;

        let interaction = NewInteraction {
            user: user.clone(),
            analysis_type: request.kind.as_str().to_string(),
            job_description: request.params.job_description.clone(),
            response: outcome.to_string(),
        };
        if let Err(e) = self.history.record(interaction).await {
            warn!(analysis = request.kind.as_str(), "Failed to record interaction: {}", e);
        }

        outcome
    }

    pub async fn render_report(&self, markdown: &str, title: &str, footer: &str) -> Option<Vec<u8>> {
        self.renderer.render_pdf_or_log(markdown, title, footer).await
    }

    /// Usage summary of the interaction log.
    pub async fn stats(&self) -> Result<LogSummary> {
        self.history.summary().await
    }

    /// Stop the interaction log writer once queued commands are done.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.history);
        self.history_task
            .await
            .map_err(|e| Error::Invariant(format!("History writer join error: {}", e)))
    }
}
