use thiserror::Error;

/// Every failure the detection core can report. Each variant maps to one
/// stable machine-readable code (see [`DomainError::code`]).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("no image file provided")]
    NoFileProvided,
    #[error("uploaded file has an empty filename")]
    EmptyFileName,
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("image url not provided")]
    MissingImageUrl,
    #[error("malformed request body: {0}")]
    InvalidRequestBody(String),
    #[error("failed to fetch image: {0}")]
    FetchFailed(String),
    #[error("failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("invalid confidence: {0}")]
    InvalidConfidence(String),
    #[error("invalid iou_threshold: {0}")]
    InvalidIouThreshold(String),
    #[error("invalid max_detections: {0}")]
    InvalidMaxDetections(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),
    /// `requested` is true when the missing model was named by the client.
    #[error("model not found: {model}")]
    ModelNotFound { model: String, requested: bool },

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("request cancelled before inference")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Who caused a failure; drives the HTTP status the adapter picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Server,
    Cancelled,
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFileProvided => "NO_IMAGE_FILE",
            Self::EmptyFileName => "NO_FILE_SELECTED",
            Self::UnsupportedFileType(_) => "INVALID_FILE_TYPE",
            Self::MissingImageUrl => "NO_IMAGE_URL",
            Self::InvalidRequestBody(_) => "INVALID_REQUEST_BODY",
            Self::FetchFailed(_) => "FETCH_FAILED",
            Self::DecodeFailed(_) => "IMAGE_PROCESSING_ERROR",
            Self::InvalidConfidence(_) => "INVALID_CONFIDENCE",
            Self::InvalidIouThreshold(_) => "INVALID_IOU_THRESHOLD",
            Self::InvalidMaxDetections(_) => "INVALID_MAX_DETECTIONS",
            Self::ModelLoadFailed(_) => "MODEL_LOAD_FAILED",
            Self::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            Self::InferenceFailed(_) => "INFERENCE_FAILED",
            Self::Cancelled => "REQUEST_CANCELLED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NoFileProvided
            | Self::EmptyFileName
            | Self::UnsupportedFileType(_)
            | Self::MissingImageUrl
            | Self::InvalidRequestBody(_)
            | Self::FetchFailed(_)
            | Self::DecodeFailed(_)
            | Self::InvalidConfidence(_)
            | Self::InvalidIouThreshold(_)
            | Self::InvalidMaxDetections(_) => ErrorClass::Client,
            Self::ModelNotFound { requested: true, .. } => ErrorClass::Client,
            Self::ModelNotFound { requested: false, .. }
            | Self::ModelLoadFailed(_)
            | Self::InferenceFailed(_)
            | Self::Internal(_) => ErrorClass::Server,
            Self::Cancelled => ErrorClass::Cancelled,
        }
    }

    /// Message safe to show to any client. Internal text never appears here.
    pub fn public_message(&self) -> String {
        match self {
            Self::NoFileProvided => "No image file provided".into(),
            Self::EmptyFileName => "No file selected".into(),
            Self::UnsupportedFileType(_) => format!(
                "Unsupported file type. Allowed types: {}",
                crate::domain::image::ALLOWED_EXTENSIONS.join(", ")
            ),
            Self::MissingImageUrl => "Image URL not provided".into(),
            Self::InvalidRequestBody(_) => "Request body must be a JSON object".into(),
            Self::FetchFailed(_) => "Could not fetch image from URL".into(),
            Self::DecodeFailed(_) => "Could not process image".into(),
            Self::InvalidConfidence(_) => "confidence must be a number between 0.0 and 1.0".into(),
            Self::InvalidIouThreshold(_) => {
                "iou_threshold must be a number between 0.0 and 1.0".into()
            }
            Self::InvalidMaxDetections(_) => "max_detections must be an integer >= 1".into(),
            Self::ModelNotFound { requested: true, model } => format!("Model not found: {model}"),
            Self::Cancelled => "Request cancelled".into(),
            Self::ModelNotFound { requested: false, .. }
            | Self::ModelLoadFailed(_)
            | Self::InferenceFailed(_)
            | Self::Internal(_) => "Internal server error".into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_client_errors() {
        let errs = [
            DomainError::NoFileProvided,
            DomainError::EmptyFileName,
            DomainError::UnsupportedFileType("exe".into()),
            DomainError::MissingImageUrl,
            DomainError::InvalidRequestBody("expected value at line 1".into()),
            DomainError::FetchFailed("timeout".into()),
            DomainError::DecodeFailed("eof".into()),
            DomainError::InvalidConfidence("1.5".into()),
            DomainError::InvalidIouThreshold("-1".into()),
            DomainError::InvalidMaxDetections("0".into()),
        ];
        for e in errs {
            assert_eq!(e.class(), ErrorClass::Client, "{e:?}");
        }
    }

    #[test]
    fn model_not_found_class_depends_on_origin() {
        let requested = DomainError::ModelNotFound { model: "x.onnx".into(), requested: true };
        let default = DomainError::ModelNotFound { model: "x.onnx".into(), requested: false };
        assert_eq!(requested.class(), ErrorClass::Client);
        assert_eq!(default.class(), ErrorClass::Server);
        assert_eq!(requested.code(), default.code());
    }

    #[test]
    fn public_message_hides_internal_text() {
        let e = DomainError::InferenceFailed("CUDA OOM at 0xdeadbeef".into());
        assert!(!e.public_message().contains("0xdeadbeef"));
        let e = DomainError::FetchFailed("dns error: secret-host.internal".into());
        assert!(!e.public_message().contains("secret-host"));
    }
}
