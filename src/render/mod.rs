//! Report rendering
//!
//! Turns model markdown into a styled HTML page and then into PDF bytes
//! through a [`PdfConverter`]. Rendering is never retried: a failure is
//! surfaced once and the caller gets no artifact.

pub mod mock;
pub mod wkhtml;

pub use mock::MockPdfConverter;
pub use wkhtml::WkhtmlToPdf;

use crate::prompts;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use pulldown_cmark::{html, Options, Parser};
use std::sync::Arc;
use tracing::{error, info};

pub const DEFAULT_TITLE: &str = "Report";
pub const DEFAULT_FOOTER: &str = "ResumeFlow AI";

#[async_trait]
pub trait PdfConverter: Send + Sync {
    async fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>>;
}

pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = pulldown_cmark_escape::escape_html(&mut out, text);
    out
}

/// Fill the report template. `title` and `footer` are escaped; the body is
/// the HTML produced from `markdown`.
pub fn build_html(markdown: &str, title: &str, footer: &str, now: DateTime<Local>) -> String {
    let body = markdown_to_html(markdown);
    let title = escape_html(title);
    let footer = escape_html(footer);
    let generated_at = now.format("%Y-%m-%d %H:%M:%S").to_string();

    prompts::render(
        prompts::REPORT_HTML,
        &[
            ("title", &title),
            ("body", &body),
            ("footer", &footer),
            ("generated_at", &generated_at),
        ],
    )
}

/// Make `name` safe as a file name: alphanumerics, space, `_` and `-` are
/// kept, everything else becomes `_`, and surrounding underscores are trimmed.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

#[derive(Clone)]
pub struct ReportRenderer {
    converter: Arc<dyn PdfConverter>,
}

impl ReportRenderer {
    pub fn new(converter: Arc<dyn PdfConverter>) -> Self {
        Self { converter }
    }

    pub async fn render_pdf(&self, markdown: &str, title: &str, footer: &str) -> Result<Vec<u8>> {
        let html = build_html(markdown, title, footer, Local::now());
        let pdf = self.converter.html_to_pdf(&html).await?;
        info!(title, bytes = pdf.len(), "Rendered report PDF");
        Ok(pdf)
    }

    /// Like [`render_pdf`](Self::render_pdf), but logs the failure and
    /// returns `None` instead of an error.
    pub async fn render_pdf_or_log(
        &self,
        markdown: &str,
        title: &str,
        footer: &str,
    ) -> Option<Vec<u8>> {
        match self.render_pdf(markdown, title, footer).await {
            Ok(pdf) => Some(pdf),
            Err(e) => {
                error!(
                    title,
                    "Error generating PDF: {}. Is wkhtmltopdf installed, or WKHTMLTOPDF_PATH set?",
                    e
                );
                None
            }
        }
    }
}
