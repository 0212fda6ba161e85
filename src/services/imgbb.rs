use serde::Deserialize;

use crate::models::{AnalysisError, HostedImageRef, SourceImage};

pub const DEFAULT_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

/// Stages an image somewhere the inference service can fetch it from.
#[async_trait::async_trait]
pub trait HostingClient: Send + Sync {
    async fn upload(&self, image: &SourceImage) -> Result<HostedImageRef, AnalysisError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: Option<String>,
}

/// ImgBB upload API client
pub struct ImgBbClient {
    api_key: String,
    upload_url: String,
    expiration_secs: Option<u64>,
    client: reqwest::Client,
}

impl ImgBbClient {
    pub fn new(
        api_key: String,
        upload_url: String,
        expiration_secs: Option<u64>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_key,
            upload_url,
            expiration_secs,
            client,
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("key", self.api_key.clone())];
        if let Some(secs) = self.expiration_secs {
            query.push(("expiration", secs.to_string()));
        }
        query
    }
}

#[async_trait::async_trait]
impl HostingClient for ImgBbClient {
    async fn upload(&self, image: &SourceImage) -> Result<HostedImageRef, AnalysisError> {
        let encoded = image.encode();
        log::debug!(
            "🔄 Uploading {} ({} bytes, {} base64 chars) to ImgBB",
            image.mime_type,
            image.bytes.len(),
            encoded.len()
        );

        let form = reqwest::multipart::Form::new().text("image", encoded);

        let response = self
            .client
            .post(&self.upload_url)
            .query(&self.query())
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalysisError::UploadFailed {
                status: None,
                body: e.without_url().to_string(), // the URL carries the API key
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| AnalysisError::UploadFailed {
            status: Some(status.as_u16()),
            body: e.without_url().to_string(),
        })?;

        log::debug!("📥 ImgBB response status: {}", status);

        if !status.is_success() {
            log::error!("❌ ImgBB error response: {}", response_text);
            return Err(AnalysisError::UploadFailed {
                status: Some(status.as_u16()),
                body: response_text,
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&response_text).map_err(|e| {
            log::error!("❌ ImgBB returned an unreadable body: {}", e);
            AnalysisError::UploadFailed {
                status: Some(status.as_u16()),
                body: response_text.clone(),
            }
        })?;

        let url = parsed
            .data
            .and_then(|data| data.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AnalysisError::UploadFailed {
                status: Some(status.as_u16()),
                body: response_text.clone(),
            })?;

        log::info!("✅ Image hosted at {}", url);
        Ok(HostedImageRef { url })
    }
}
