pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use extract::{Extractor, MAX_DESCRIPTION_CHARS, SUMMARY_KEYWORDS};
pub use pipeline::{PipelineError, ReceiptPipeline, ScanResult};
pub use preprocess::{prepare_for_ocr, prepare_for_ocr_from_bytes, PreprocessError, DEFAULT_MAX_WIDTH};
pub use recognizer::{receipt_text, MockRecognizer, OcrBackend, OcrError};
pub use types::{accepted_expenses, ItemStrategy, LineItem, ParseResult, ReviewError, ReviewItem};
