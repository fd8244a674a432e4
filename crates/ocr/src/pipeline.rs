use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::extract::Extractor;
use crate::preprocess::{self, DEFAULT_MAX_WIDTH};
use crate::recognizer::{OcrBackend, OcrError};
use crate::types::ParseResult;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] crate::preprocess::PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
}

/// The result of a single receipt scan.
#[derive(Debug)]
pub struct ScanResult {
    /// Raw OCR text output.
    pub ocr_text: String,
    /// Items and total parsed from the OCR text.
    pub parsed: ParseResult,
}

/// Orchestrates: preprocess → OCR → parse.
pub struct ReceiptPipeline<R: OcrBackend> {
    recognizer: R,
    max_width: u32,
}

impl<R: OcrBackend> ReceiptPipeline<R> {
    pub fn new(recognizer: R) -> Self {
        Self { recognizer, max_width: DEFAULT_MAX_WIDTH }
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = max_width;
        self
    }

    /// Process an image file on disk.
    pub async fn process_file(&self, path: &Path) -> Result<ScanResult, PipelineError> {
        info!("Scanning receipt: {}", path.display());
        let bytes = tokio::fs::read(path).await?;
        self.process_bytes(&bytes)
    }

    /// Process raw image bytes (from camera capture or file read).
    pub fn process_bytes(&self, data: &[u8]) -> Result<ScanResult, PipelineError> {
        let image_bytes = preprocess::prepare_for_ocr_from_bytes(data, self.max_width)?;

        let ocr_text = self.recognizer.recognize(&image_bytes)?;
        debug!(chars = ocr_text.len(), "OCR text recognized");

        let parsed = Extractor::extract(&ocr_text);
        Ok(ScanResult { ocr_text, parsed })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::MockRecognizer;
    use crate::types::ItemStrategy;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use spendscan_core::Money;
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn process_bytes_parses_recognized_text() {
        let pipeline = ReceiptPipeline::new(MockRecognizer::new("Coffee\n4.50\nBagel\n3.25\nTotal\n7.75"));

        let result = pipeline.process_bytes(&tiny_png()).unwrap();

        assert_eq!(result.ocr_text, "Coffee\n4.50\nBagel\n3.25\nTotal\n7.75");
        assert_eq!(result.parsed.items.len(), 2);
        assert_eq!(result.parsed.total, Money::from_cents(775));
        assert_eq!(result.parsed.strategy, ItemStrategy::Paired);
    }

    #[test]
    fn blank_ocr_text_is_reported_as_no_text() {
        let pipeline = ReceiptPipeline::new(MockRecognizer::new("  \n \n"));
        let err = pipeline.process_bytes(&tiny_png()).unwrap_err();
        assert!(matches!(err, PipelineError::Ocr(OcrError::NoTextDetected)));
    }

    #[test]
    fn undecodable_image_fails_before_ocr() {
        let pipeline = ReceiptPipeline::new(MockRecognizer::new("Tea\n2.00"));
        let err = pipeline.process_bytes(b"definitely not a png").unwrap_err();
        assert!(matches!(err, PipelineError::Preprocess(_)));
    }

    #[tokio::test]
    async fn process_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, tiny_png()).unwrap();

        let pipeline = ReceiptPipeline::new(MockRecognizer::new("Juice\nS3.99")).with_max_width(500);
        let result = pipeline.process_file(&path).await.unwrap();

        assert_eq!(result.parsed.items.len(), 1);
        assert_eq!(result.parsed.items[0].description, "Juice");
        assert_eq!(result.parsed.items[0].amount, Money::from_cents(399));
    }

    #[tokio::test]
    async fn process_file_missing_path_is_io_error() {
        let pipeline = ReceiptPipeline::new(MockRecognizer::new("x"));
        let err = pipeline
            .process_file(Path::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
