use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("No text detected")]
    NoTextDetected,
    #[error("Tesseract not available: build with the `tesseract` feature")]
    NotAvailable,
}

/// Turns a receipt image into text.
///
/// `recognize` returns the receipt's non-blank lines, trimmed, joined with
/// `\n` in top-to-bottom order, or [`OcrError::NoTextDetected`] when the image
/// held nothing readable. [`receipt_text`] applies that contract to raw
/// engine output.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }
}

/// Normalize raw engine output: page breaks become line breaks, lines are
/// trimmed and blank ones dropped.
pub fn receipt_text(raw: &str) -> Result<String, OcrError> {
    let lines: Vec<&str> = raw
        .split(|c| c == '\n' || c == '\u{c}')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(OcrError::NoTextDetected);
    }
    Ok(lines.join("\n"))
}

/// Canned backend for running the scan flow without an OCR engine.
pub struct MockRecognizer {
    text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        receipt_text(&self.text)
    }
}

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{receipt_text, OcrBackend, OcrError};
    use leptess::LepTess;
    use std::path::PathBuf;
    use tracing::debug;

    /// Preprocessed images carry no density metadata.
    const SOURCE_DPI: i32 = 300;

    pub struct TesseractRecognizer {
        language: String,
        tessdata: Option<PathBuf>,
    }

    impl TesseractRecognizer {
        pub fn new(language: impl Into<String>) -> Self {
            Self { language: language.into(), tessdata: None }
        }

        /// Directory holding the `*.traineddata` files.
        pub fn with_tessdata(mut self, dir: impl Into<PathBuf>) -> Self {
            self.tessdata = Some(dir.into());
            self
        }

        fn engine(&self) -> Result<LepTess, OcrError> {
            let data_path = match &self.tessdata {
                Some(dir) => Some(dir.to_str().ok_or_else(|| {
                    OcrError::Engine(format!("tessdata path is not UTF-8: {}", dir.display()))
                })?),
                None => None,
            };
            LepTess::new(data_path, &self.language).map_err(|e| {
                OcrError::Engine(format!("cannot load language '{}': {e}", self.language))
            })
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut engine = self.engine()?;
            engine
                .set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            engine.set_source_resolution(SOURCE_DPI);
            let raw = engine.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))?;
            debug!(language = %self.language, chars = raw.len(), "tesseract finished");
            receipt_text(&raw)
        }
    }
}
