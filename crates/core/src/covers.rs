//! Cover image handling for photo previews.
//!
//! Telegram fetches photo URLs itself only up to a size limit, so large
//! covers are downloaded, shrunk and uploaded as bytes instead.

use std::io::Cursor;
use std::time::Duration;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Cover handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverConfig {
    /// Largest photo Telegram will fetch by URL, in bytes.
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: usize,
    /// Widest photo to send without shrinking, in pixels.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Download timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_photo_bytes() -> usize {
    5_000_000
}

fn default_max_width() -> u32 {
    1920
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            max_photo_bytes: default_max_photo_bytes(),
            max_width: default_max_width(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Errors while fetching or shrinking a cover.
#[derive(Debug, Error)]
pub enum CoverError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The cover host answered with a non-success status.
    #[error("cover fetch returned status {status}")]
    FetchFailed { status: u16 },

    /// Decoding or encoding failed.
    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),

    /// Halving never got the image under the limits.
    #[error("image cannot be shrunk to fit the limits")]
    Unshrinkable,
}

/// How a cover should be sent.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverPayload {
    /// Telegram can fetch the source URL itself.
    Url(String),
    /// Shrunken JPEG bytes for a multipart upload.
    Jpeg(Vec<u8>),
}

/// Fetches covers and shrinks the ones Telegram would reject by URL.
pub struct CoverService {
    client: Client,
    max_photo_bytes: usize,
    max_width: u32,
}

impl CoverService {
    /// Create a new service.
    pub fn new(config: &CoverConfig) -> Result<Self, CoverError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_photo_bytes: config.max_photo_bytes,
            max_width: config.max_width,
        })
    }

    /// Decide how a cover should be sent. Any failure falls back to the
    /// source URL and lets Telegram try its own fetch.
    pub async fn prepare(&self, url: &str) -> CoverPayload {
        match self.fetch_and_fit(url).await {
            Ok(Some(jpeg)) => CoverPayload::Jpeg(jpeg),
            Ok(None) => CoverPayload::Url(url.to_string()),
            Err(e) => {
                debug!(url, error = %e, "cover preparation failed, sending by URL");
                CoverPayload::Url(url.to_string())
            }
        }
    }

    /// `Ok(None)` means the source already fits and can be sent by URL.
    async fn fetch_and_fit(&self, url: &str) -> Result<Option<Vec<u8>>, CoverError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoverError::FetchFailed {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let img = image::load_from_memory(&bytes)?;
        if bytes.len() <= self.max_photo_bytes && img.width() <= self.max_width {
            return Ok(None);
        }

        Ok(Some(shrink_to_fit(
            img,
            self.max_photo_bytes,
            self.max_width,
        )?))
    }
}

/// Halve the image until its JPEG encoding fits both limits.
fn shrink_to_fit(
    mut img: DynamicImage,
    max_bytes: usize,
    max_width: u32,
) -> Result<Vec<u8>, CoverError> {
    loop {
        let jpeg = encode_jpeg(&img)?;
        if jpeg.len() <= max_bytes && img.width() <= max_width {
            return Ok(jpeg);
        }
        let (width, height) = (img.width() / 2, img.height() / 2);
        if width == 0 || height == 0 {
            return Err(CoverError::Unshrinkable);
        }
        img = img.resize_exact(width, height, FilterType::Nearest);
    }
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, CoverError> {
    let mut buf = Cursor::new(Vec::new());
    // JPEG has no alpha channel; normalize to RGB before encoding.
    DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}
