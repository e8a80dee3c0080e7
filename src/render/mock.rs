use super::PdfConverter;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Converter that records the HTML it receives and returns a stub PDF.
#[derive(Clone)]
pub struct MockPdfConverter {
    rendered: Arc<Mutex<Vec<String>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockPdfConverter {
    pub fn new() -> Self {
        Self {
            rendered: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_render_count(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }

    pub fn last_html(&self) -> Option<String> {
        self.rendered.lock().unwrap().last().cloned()
    }
}

impl Default for MockPdfConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PdfConverter for MockPdfConverter {
    async fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Render("Mock failure".to_string()));
        }

        self.rendered.lock().unwrap().push(html.to_string());
        Ok(b"%PDF-1.4\n% mock report\n%%EOF\n".to_vec())
    }
}
