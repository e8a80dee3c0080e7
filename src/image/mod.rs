//! Resume page rasterization
//!
//! Turns an uploaded PDF into JPEG page images the model can read, capped at
//! a caller-chosen page count.

pub mod mock;
pub mod processor;

pub use mock::MockRasterizer;
pub use processor::PopplerRasterizer;

use crate::models::ContentPart;
use crate::Result;
use async_trait::async_trait;

pub const JPEG_QUALITY: u8 = 85;

#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Pages `1..=max_pages` (or fewer, if the document is shorter) as
    /// `image/jpeg` content parts, in page order.
    async fn rasterize(&self, pdf: &[u8], max_pages: u32) -> Result<Vec<ContentPart>>;
}
