use base64::{engine::general_purpose, Engine};

use crate::models::{AnalysisError, ImageCandidate, SourceImage};

/// Validates a user-selected (or camera-captured) file before anything
/// leaves the machine.
pub fn accept(candidate: ImageCandidate) -> Result<SourceImage, AnalysisError> {
    let declared = candidate.declared_type.unwrap_or_default();

    // "image/jpeg; charset=binary" -> "image/jpeg"
    let mime_type = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !mime_type.starts_with("image/") || mime_type.len() == "image/".len() {
        log::warn!("🚫 Rejected upload with media type '{}'", declared);
        return Err(AnalysisError::InvalidMediaType { declared });
    }

    log::debug!("📊 Accepted {} image: {} bytes", mime_type, candidate.bytes.len());

    Ok(SourceImage {
        bytes: candidate.bytes,
        mime_type,
    })
}

impl SourceImage {
    /// Transport encoding: plain base64, no data-URL prefix.
    pub fn encode(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Data URL the user confirms before starting an analysis.
    pub fn preview_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.encode())
    }
}
