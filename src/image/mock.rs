use super::PageRasterizer;
use crate::models::ContentPart;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Rasterizer that pretends the document has `page_count` pages.
#[derive(Clone)]
pub struct MockRasterizer {
    page_count: u32,
    requests: Arc<Mutex<Vec<u32>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockRasterizer {
    pub fn new() -> Self {
        Self {
            page_count: 1,
            requests: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_page_count(mut self, page_count: u32) -> Self {
        self.page_count = page_count;
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_rasterize_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// `max_pages` of every request, in order.
    pub fn requested_pages(&self) -> Vec<u32> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRasterizer for MockRasterizer {
    async fn rasterize(&self, _pdf: &[u8], max_pages: u32) -> Result<Vec<ContentPart>> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Rasterize("Mock failure".to_string()));
        }

        self.requests.lock().unwrap().push(max_pages);

        Ok((1..=self.page_count.min(max_pages))
            .map(|page| ContentPart::jpeg(vec![0xFF, 0xD8, 0xFF, page as u8]))
            .collect())
    }
}
