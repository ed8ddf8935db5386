use std::path::Path;

use anyhow::Context as _;

use crate::llm::ImagePayload;

/// Minimum number of extracted characters considered usable text.
pub const MIN_EXTRACTED_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
    Docx,
    Xlsx,
    Ppt,
    Pptx,
    Text,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" => Some(DocumentKind::Png),
            "jpg" | "jpeg" => Some(DocumentKind::Jpeg),
            "docx" => Some(DocumentKind::Docx),
            "xlsx" => Some(DocumentKind::Xlsx),
            "ppt" => Some(DocumentKind::Ppt),
            "pptx" => Some(DocumentKind::Pptx),
            "txt" | "md" | "csv" | "eml" => Some(DocumentKind::Text),
            _ => None,
        }
    }

    pub fn image_mime(&self) -> Option<&'static str> {
        match self {
            DocumentKind::Png => Some("image/png"),
            DocumentKind::Jpeg => Some("image/jpeg"),
            _ => None,
        }
    }
}

/// What a format-specific extractor produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Text(String),
    /// Needs the vision model to read it.
    Image(ImagePayload),
    Nothing,
}

/// Format-specific text extraction. Structured formats (PDF, Office) are
/// plugged in from outside; the built-in extractor only knows plain text
/// and images.
pub trait TextExtractor {
    fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> anyhow::Result<Extracted>;

    /// Renders a document as an image for the vision model, used when
    /// [`extract`](Self::extract) found no usable text (scanned PDFs,
    /// slides that are all pictures).
    fn render_image(&self, _kind: DocumentKind, _bytes: &[u8]) -> Option<ImagePayload> {
        None
    }
}

pub struct BasicExtractor;

impl TextExtractor for BasicExtractor {
    fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> anyhow::Result<Extracted> {
        if let Some(mime) = kind.image_mime() {
            return Ok(Extracted::Image(ImagePayload {
                mime: mime.to_string(),
                bytes: bytes.to_vec(),
            }));
        }
        match kind {
            DocumentKind::Text => {
                let text = std::str::from_utf8(bytes).context("document is not valid UTF-8")?;
                Ok(Extracted::Text(text.to_string()))
            }
            _ => Ok(Extracted::Nothing),
        }
    }
}

/// Reads the whole file once; the extractor and the image renderer both
/// borrow the same buffer.
pub fn load_document(path: &Path) -> anyhow::Result<(DocumentKind, Vec<u8>)> {
    let kind = DocumentKind::from_path(path)
        .with_context(|| format!("unsupported file type: {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok((kind, bytes))
}

/// True when extraction produced enough text to work with.
pub fn is_usable(text: &str) -> bool {
    text.trim().chars().count() >= MIN_EXTRACTED_CHARS
}
