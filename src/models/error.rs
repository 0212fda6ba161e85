use serde::{Deserialize, Serialize};

use super::Stage;

/// Response bodies quoted in user-facing messages are cut to this many chars.
pub const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidMediaType,
    UploadFailed,
    InferenceFailed,
    InferenceMalformed,
    ParseFailed,
    EmptyResult,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidMediaType => "invalid_media_type",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::InferenceFailed => "inference_failed",
            ErrorKind::InferenceMalformed => "inference_malformed",
            ErrorKind::ParseFailed => "parse_failed",
            ErrorKind::EmptyResult => "empty_result",
        };
        write!(f, "{}", s)
    }
}

/// Typed failure of a single pipeline stage.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalysisError {
    #[error("unsupported media type: {declared}")]
    InvalidMediaType { declared: String },

    #[error("image upload failed (status {status:?}): {body}")]
    UploadFailed { status: Option<u16>, body: String },

    #[error("inference request failed (status {status:?}): {body}")]
    InferenceFailed { status: Option<u16>, body: String },

    #[error("inference response malformed: {reason}")]
    InferenceMalformed { reason: String, body: String },

    #[error("nutrition payload could not be parsed: {reason}")]
    ParseFailed { reason: String, payload: String },

    #[error("no food items detected")]
    EmptyResult,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidMediaType { .. } => ErrorKind::InvalidMediaType,
            AnalysisError::UploadFailed { .. } => ErrorKind::UploadFailed,
            AnalysisError::InferenceFailed { .. } => ErrorKind::InferenceFailed,
            AnalysisError::InferenceMalformed { .. } => ErrorKind::InferenceMalformed,
            AnalysisError::ParseFailed { .. } => ErrorKind::ParseFailed,
            AnalysisError::EmptyResult => ErrorKind::EmptyResult,
        }
    }

    /// Text shown to the user in the error banner.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::InvalidMediaType { .. } => "Please upload an image file".to_string(),
            AnalysisError::UploadFailed { .. } => "Failed to upload image to ImgBB".to_string(),
            AnalysisError::InferenceFailed { status: Some(status), body } => {
                format!("Groq API Error ({}): {}", status, truncate_chars(body, BODY_PREVIEW_CHARS))
            }
            AnalysisError::InferenceFailed { status: None, body } => {
                format!("Groq API Error: {}", truncate_chars(body, BODY_PREVIEW_CHARS))
            }
            AnalysisError::InferenceMalformed { .. } => "Invalid response format from Groq".to_string(),
            AnalysisError::ParseFailed { .. } => {
                "Could not read the nutrition data returned for this image".to_string()
            }
            AnalysisError::EmptyResult => "No food items detected in the image".to_string(),
        }
    }

    /// Raw fragment kept for developer logs.
    pub fn diagnostic(&self) -> Option<String> {
        let raw = match self {
            AnalysisError::InvalidMediaType { declared } => declared,
            AnalysisError::UploadFailed { body, .. } => body,
            AnalysisError::InferenceFailed { body, .. } => body,
            AnalysisError::InferenceMalformed { body, .. } => body,
            AnalysisError::ParseFailed { payload, .. } => payload,
            AnalysisError::EmptyResult => return None,
        };
        Some(truncate_chars(raw, BODY_PREVIEW_CHARS * 5))
    }
}

/// What the presentation boundary receives when a run fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub stage: Option<Stage>,
    pub message: String,
    pub detail: Option<String>,
}

impl ErrorInfo {
    pub fn from_error(error: &AnalysisError, stage: Option<Stage>) -> Self {
        Self {
            kind: error.kind(),
            stage,
            message: error.user_message(),
            detail: error.diagnostic(),
        }
    }
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
