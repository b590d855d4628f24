use crate::config::Config;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

pub const LINK_DELIMITER: &str = " | ";
pub const NO_IMAGES: &str = "-";
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// One image received from a form, held in memory.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub fn is_supported_image(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| extension.eq_ignore_ascii_case(allowed))
        })
}

pub trait ImageHost: Send + Sync {
    /// Stores the image and returns its public URL.
    fn upload(&self, image: &ImageFile) -> Result<String>;
}

/// Uploads every image in order and joins the resulting links.
///
/// A failed upload does not stop the submission: its slot holds an
/// `[Erro: ...]` placeholder instead of a URL.
pub fn upload_all(host: &dyn ImageHost, images: &[ImageFile]) -> String {
    if images.is_empty() {
        return NO_IMAGES.to_string();
    }

    images
        .iter()
        .map(|image| upload_or_placeholder(host, image))
        .collect::<Vec<_>>()
        .join(LINK_DELIMITER)
}

pub fn upload_or_placeholder(host: &dyn ImageHost, image: &ImageFile) -> String {
    match host.upload(image) {
        Ok(url) => {
            info!(file = %image.file_name, url = %url, "image uploaded");
            url
        }
        Err(error) => {
            warn!(file = %image.file_name, error = %format!("{error:#}"), "image upload failed");
            format!("[Erro: {error:#}]")
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: UploadData,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

/// ImgBB-compatible image host.
pub struct ImgbbUploader {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ImgbbUploader {
    pub fn new(config: &Config) -> Self {
        Self {
            endpoint: config.image_host_url.clone(),
            api_key: config.image_host_api_key.clone(),
            timeout: config.http_timeout(),
        }
    }
}

impl ImageHost for ImgbbUploader {
    fn upload(&self, image: &ImageFile) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .context("image host API key is not configured")?;

        let mime = mime_guess::from_path(&image.file_name)
            .first_or_octet_stream()
            .to_string();
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&mime)
            .context("Failed to build image part")?;
        let form = Form::new()
            .text("key", api_key.to_string())
            .text("expiration", "0")
            .part("image", part);

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to create image host HTTP client")?;

        let response = client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .context("image host request failed")?;

        let status = response.status();
        let body = response
            .text()
            .context("Failed to read image host response body")?;

        if !status.is_success() {
            bail!("image host error {}: {}", status, body);
        }

        parse_upload_response(&body)
    }
}

fn parse_upload_response(body: &str) -> Result<String> {
    let parsed: UploadResponse = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse image host response: {body}"))?;

    Some(parsed.data.url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| anyhow!("image host response did not include data.url"))
}
