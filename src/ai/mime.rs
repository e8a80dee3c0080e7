/// Sniff a MIME type from magic bytes. Only the formats the model accepts as
/// inline data, plus PDF for uploaded resumes, are recognized.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x25, 0x50, 0x44, 0x46, 0x2D, ..] => Some("application/pdf"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    sniff_mime(bytes) == Some("application/pdf")
}

pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    match sniff_mime(bytes) {
        Some(mime) if mime.starts_with("image/") => mime,
        _ => {
            tracing::warn!(
                "Unrecognized image format (first 4 bytes: {:02X?}), sending as image/jpeg",
                &bytes[..bytes.len().min(4)]
            );
            "image/jpeg"
        }
    }
}
