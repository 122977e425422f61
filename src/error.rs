use thiserror::Error;

/// Raised when a capture cannot be turned into strokes. User-facing: "retake photo".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Image is empty ({width}x{height})")]
    EmptyImage { width: usize, height: usize },

    #[error("Image buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("No ink detected in the capture")]
    NoInk,

    #[error("Detected {found} strokes, plausible range is {min}..={max}")]
    ImplausibleStrokeCount { found: usize, min: usize, max: usize },

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Extraction cancelled")]
    Cancelled,
}

/// Raised when captured strokes cannot be registered against the reference.
/// User-facing: "wrong character or illegible strokes".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    #[error(
        "Stroke count mismatch for '{character}': expected {expected}, captured {captured} (tolerance {tolerance})"
    )]
    StrokeCountMismatch {
        character: String,
        expected: usize,
        captured: usize,
        tolerance: usize,
    },

    #[error("Reference '{0}' has an empty skeleton")]
    EmptyReference(String),

    #[error("Alignment cancelled")]
    Cancelled,
}

/// Raised when a session could not be persisted. User-facing: "result not saved, retry".
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Session store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Terminal outcomes of a single evaluation attempt.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error("Unknown character '{0}'")]
    UnknownCharacter(String),

    #[error("Another evaluation is already running")]
    Busy,

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl EngineError {
    /// True when the caller should ask the user for a new capture.
    pub fn is_retake(&self) -> bool {
        matches!(self, EngineError::Extraction(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            EngineError::Extraction(ExtractionError::Cancelled)
                | EngineError::Alignment(AlignmentError::Cancelled)
        )
    }
}

#[derive(Error, Debug)]
pub enum GyeolguError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type GyResult<T> = Result<T, GyeolguError>;
