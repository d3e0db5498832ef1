//! IMDb search-suggestions client.
//!
//! The suggestions endpoint is the unauthenticated API backing the
//! imdb.com search box: `GET {base}/{bucket}/{query}.json` where `bucket`
//! is the first letter of the query. The payload is JSON-P, a JavaScript
//! callback wrapped around plain JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics;

use super::{Catalog, CatalogError, CatalogHit};

/// IMDb suggestions client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    /// Base URL (default: https://sg.media-imdb.com/suggests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Movie lookup against the IMDb suggestions API.
pub struct ImdbClient {
    client: Client,
    base_url: String,
}

impl ImdbClient {
    /// Create a new client.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://sg.media-imdb.com/suggests".to_string());

        Ok(Self { client, base_url })
    }

    async fn fetch_suggestions(&self, query: &str) -> Result<SuggestResponse, CatalogError> {
        let url = format!(
            "{}/{}/{}.json",
            self.base_url,
            bucket_for(query),
            urlencoding::encode(query)
        );

        debug!(query, url = %url, "IMDb suggestion lookup");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let json = strip_jsonp(&body).ok_or_else(|| {
            CatalogError::ParseError("response is not a JSON-P callback".to_string())
        })?;
        serde_json::from_str(json).map_err(|e| {
            CatalogError::ParseError(format!("failed to parse suggestions: {}", e))
        })
    }
}

#[async_trait]
impl Catalog for ImdbClient {
    async fn lookup(&self, query: &str) -> Result<Option<CatalogHit>, CatalogError> {
        let timer = metrics::CATALOG_LOOKUP_DURATION.start_timer();
        let result = self.fetch_suggestions(query).await;
        timer.observe_duration();

        match result {
            Ok(response) => {
                let hit = response.d.into_iter().find_map(complete_hit);
                let label = if hit.is_some() { "hit" } else { "miss" };
                metrics::CATALOG_LOOKUPS.with_label_values(&[label]).inc();
                Ok(hit)
            }
            Err(e) => {
                metrics::CATALOG_LOOKUPS.with_label_values(&["error"]).inc();
                Err(e)
            }
        }
    }
}

/// Bucket path segment: the lowercased first character of the query, with
/// common accented Latin letters folded to ASCII. The endpoint only has
/// ASCII buckets; anything unmappable goes to `_`.
fn bucket_for(query: &str) -> char {
    let first = match query.trim().chars().next() {
        Some(c) => c,
        None => return '_',
    };
    let lowered = first.to_lowercase().next().unwrap_or(first);
    if lowered.is_ascii_alphanumeric() {
        return lowered;
    }
    match lowered {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        _ => '_',
    }
}

/// Strip the JSON-P wrapper: everything up to the first `(` and after the
/// last `)` is callback scaffolding.
fn strip_jsonp(body: &str) -> Option<&str> {
    let start = body.find('(')?;
    let end = body.rfind(')')?;
    if end <= start {
        return None;
    }
    Some(&body[start + 1..end])
}

// ============================================================================
// IMDb API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    d: Vec<SuggestItem>,
}

/// One suggestion. People and unreleased titles come back without a year
/// or cover; those are unusable as watchlist entries and get skipped.
#[derive(Debug, Deserialize)]
struct SuggestItem {
    /// Title.
    l: Option<String>,
    /// Release year.
    y: Option<i32>,
    /// Cover image.
    i: Option<SuggestImage>,
    /// IMDb title id.
    id: Option<String>,
}

/// Cover field shape: historically a `[url, width, height]` array, newer
/// responses use an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuggestImage {
    Legacy(Vec<serde_json::Value>),
    Detailed {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    Other(serde_json::Value),
}

impl SuggestImage {
    fn url(&self) -> Option<&str> {
        match self {
            SuggestImage::Legacy(values) => values.first().and_then(|v| v.as_str()),
            SuggestImage::Detailed { image_url } => Some(image_url),
            SuggestImage::Other(_) => None,
        }
    }
}

/// The first candidate with title, year, cover and id all present wins.
fn complete_hit(item: SuggestItem) -> Option<CatalogHit> {
    let cover = item.i.as_ref().and_then(SuggestImage::url)?.to_string();
    Some(CatalogHit {
        title: item.l?,
        year: item.y?,
        cover,
        imdb_id: item.id?,
    })
}
