use super::{PageRasterizer, JPEG_QUALITY};
use crate::ai::mime;
use crate::models::ContentPart;
use crate::{Error, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

const PDFTOPPM: &str = "pdftoppm";
const RESOLUTION_DPI: u32 = 150;
const PAGE_PREFIX: &str = "page";

/// Rasterizes with Poppler's `pdftoppm`, then re-encodes each page as JPEG.
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    binary: PathBuf,
    timeout: Duration,
}

impl PopplerRasterizer {
    /// `poppler_dir` is the directory holding the Poppler binaries. Without
    /// it `pdftoppm` is looked up on `PATH`.
    pub fn new(poppler_dir: Option<&Path>) -> Self {
        let binary = match poppler_dir {
            Some(dir) => dir.join(PDFTOPPM),
            None => PathBuf::from(PDFTOPPM),
        };
        Self {
            binary,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn render_pages(&self, pdf: &[u8], max_pages: u32, dir: &Path) -> Result<Vec<PathBuf>> {
        let input = dir.join("input.pdf");
        tokio::fs::write(&input, pdf).await?;

        let output = timeout(
            self.timeout,
            Command::new(&self.binary)
                .arg("-png")
                .args(["-r", &RESOLUTION_DPI.to_string()])
                .args(["-f", "1", "-l", &max_pages.to_string()])
                .arg(&input)
                .arg(dir.join(PAGE_PREFIX))
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| Error::Rasterize(format!("timed out after {:?}", self.timeout)))?
        .map_err(|e| Error::Rasterize(format!("failed to run {}: {}", self.binary.display(), e)))?;

        if !output.status.success() {
            return Err(Error::Rasterize(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(PAGE_PREFIX) && name.ends_with(".png") {
                pages.push(entry.path());
            }
        }
        // pdftoppm zero-pads page numbers to a common width.
        pages.sort();
        Ok(pages)
    }

    fn encode_jpeg_sync(pages: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>> {
        pages
            .iter()
            .map(|png| {
                let img = image::load_from_memory(png)?;
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                let mut jpeg = Vec::new();
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY))?;
                Ok(jpeg)
            })
            .collect()
    }

    async fn encode_jpeg(pages: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>> {
        tokio::task::spawn_blocking(move || Self::encode_jpeg_sync(pages))
            .await
            .map_err(|e| Error::Invariant(format!("Image encoding task join error: {}", e)))?
    }
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl PageRasterizer for PopplerRasterizer {
    async fn rasterize(&self, pdf: &[u8], max_pages: u32) -> Result<Vec<ContentPart>> {
        if max_pages == 0 {
            return Ok(Vec::new());
        }
        if !mime::is_pdf(pdf) {
            return Err(Error::Rasterize("input is not a PDF document".to_string()));
        }

        let dir = TempDir::new()?;
        let page_files = self.render_pages(pdf, max_pages, dir.path()).await?;

        let mut pngs = Vec::with_capacity(page_files.len());
        for path in page_files.iter().take(max_pages as usize) {
            pngs.push(tokio::fs::read(path).await?);
        }
        debug!(pages = pngs.len(), "Rendered PDF pages");

        let jpegs = Self::encode_jpeg(pngs).await?;
        info!(pages = jpegs.len(), max_pages, "Processed page(s) from the PDF");

        Ok(jpegs.into_iter().map(ContentPart::jpeg).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn create_test_png(color: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(10, 10, image::Rgba(color));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_png_pages_become_jpeg() {
        let jpegs = PopplerRasterizer::encode_jpeg_sync(vec![
            create_test_png([255, 0, 0, 255]),
            create_test_png([0, 0, 255, 128]),
        ])
        .unwrap();

        assert_eq!(jpegs.len(), 2);
        for jpeg in &jpegs {
            assert_eq!(mime::sniff_mime(jpeg), Some("image/jpeg"));
            let decoded = image::load_from_memory(jpeg).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (10, 10));
        }
    }

    #[test]
    fn test_undecodable_page_is_an_error() {
        let result = PopplerRasterizer::encode_jpeg_sync(vec![b"not a png".to_vec()]);
        assert!(matches!(result, Err(Error::Image(_))));
    }

    #[test]
    fn test_binary_location() {
        assert_eq!(PopplerRasterizer::new(None).binary, PathBuf::from("pdftoppm"));
        assert_eq!(
            PopplerRasterizer::new(Some(Path::new("/opt/poppler/bin"))).binary,
            PathBuf::from("/opt/poppler/bin/pdftoppm")
        );
    }

    #[tokio::test]
    async fn test_zero_pages_skips_work() {
        let rasterizer = PopplerRasterizer::new(Some(Path::new("/nonexistent")));
        let parts = rasterizer.rasterize(b"%PDF-1.4", 0).await.unwrap();
        assert!(parts.is_empty());
    }

    #[tokio::test]
    async fn test_non_pdf_input_is_rejected() {
        let rasterizer = PopplerRasterizer::default();
        let err = rasterizer.rasterize(b"hello", 1).await.unwrap_err();
        assert!(matches!(err, Error::Rasterize(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_rasterize_error() {
        let rasterizer = PopplerRasterizer::new(Some(Path::new("/nonexistent/poppler")));
        let err = rasterizer.rasterize(b"%PDF-1.4\n", 1).await.unwrap_err();
        assert!(matches!(err, Error::Rasterize(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pages_are_collected_in_order_and_capped() {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = TempDir::new().unwrap();
        let fixtures = TempDir::new().unwrap();
        for (i, color) in [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]]
            .iter()
            .enumerate()
        {
            std::fs::write(
                fixtures.path().join(format!("page-{}.png", i + 1)),
                create_test_png(*color),
            )
            .unwrap();
        }

        // Arguments: -png -r 150 -f 1 -l <n> <input> <prefix>
        let script = format!(
            "#!/bin/sh\ni=1\nwhile [ $i -le $7 ]; do cp {}/page-$i.png \"$9-$i.png\"; i=$((i+1)); done\n",
            fixtures.path().display()
        );
        let binary = bin_dir.path().join("pdftoppm");
        std::fs::write(&binary, script).unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let rasterizer = PopplerRasterizer::new(Some(bin_dir.path()));
        let parts = rasterizer.rasterize(b"%PDF-1.4\n", 2).await.unwrap();

        assert_eq!(parts.len(), 2);
        let ContentPart::Image { mime_type, data } = &parts[0] else {
            panic!("expected an image part");
        };
        assert_eq!(mime_type, "image/jpeg");
        let first = image::load_from_memory(data).unwrap().to_rgb8();
        assert!(first.get_pixel(5, 5)[0] > 200, "first page should be red");
    }
}
