//! Data models for the URL shortener application
//!
//! This module defines the stored mapping record, the two request shapes
//! accepted by `POST /shorten_url`, and the response envelopes.

use axum::http::HeaderValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A mapping between a short key and its target URL, as stored in the database
///
/// `short_key` is unique across the whole collection. At most one mapping per
/// `target_url` is active at a time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UrlMapping {
    /// Store-assigned identifier, never changes after creation
    pub id: String,

    /// Destination of the redirect
    pub target_url: String,

    /// Key used in the redirect path (e.g. "aZ3k9")
    pub short_key: String,

    /// Number of successful resolves of this key
    #[serde(default)]
    pub hits: u64,

    /// Whether this mapping is the canonical live mapping for its target URL
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// True when `short_key` was supplied by the caller
    #[serde(default)]
    pub is_custom_key: bool,

    /// Caller-supplied metadata
    #[serde(default)]
    pub tags: Vec<String>,

    /// Version of the application that created the mapping
    pub app_version: String,

    /// Timestamp when this mapping was created
    pub create_date: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// Fields supplied by the caller when inserting a new mapping
///
/// The store fills in `id`, `hits`, `is_active` and `create_date`.
#[derive(Debug, Clone)]
pub struct NewMapping {
    pub target_url: String,
    pub short_key: String,
    pub is_custom_key: bool,
    pub tags: Vec<String>,
    pub app_version: String,
}

impl NewMapping {
    /// Builds the record that gets persisted: zero hits, active, stamped now.
    pub fn into_mapping(self) -> UrlMapping {
        UrlMapping {
            id: Uuid::new_v4().to_string(),
            target_url: self.target_url,
            short_key: self.short_key,
            hits: 0,
            is_active: true,
            is_custom_key: self.is_custom_key,
            tags: self.tags,
            app_version: self.app_version,
            create_date: Utc::now(),
        }
    }
}

/// Body of a shorten request where the service generates the key
///
/// # Example
/// ```json
/// {
///   "target_url": "https://example.com/very/long/url",
///   "tags": ["promo"],
///   "short_key_length": 5
/// }
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SystemShortenRequest {
    pub target_url: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub short_key_length: usize,
}

/// Body of a shorten request where the caller picks the key
///
/// # Example
/// ```json
/// {
///   "target_url": "https://example.com/very/long/url",
///   "custom_key": "promo"
/// }
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CustomShortenRequest {
    pub target_url: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub custom_key: String,
}

/// Keys that would be shadowed by a fixed route and could never redirect.
pub const RESERVED_KEYS: &[&str] = &["ping", "shorten_url"];

/// A shorten request, resolved from the `x-custom-shorten` header and the body
#[derive(Debug, Clone, PartialEq)]
pub enum ShortenRequest {
    System(SystemShortenRequest),
    Custom(CustomShortenRequest),
}

impl ShortenRequest {
    /// Parses `body` into the shape selected by the `x-custom-shorten` flag.
    pub fn parse(custom: bool, body: &[u8]) -> Result<Self, serde_json::Error> {
        if custom {
            serde_json::from_slice(body).map(ShortenRequest::Custom)
        } else {
            serde_json::from_slice(body).map(ShortenRequest::System)
        }
    }

    /// Boundary checks that serde cannot express.
    ///
    /// # Rules
    ///
    /// - `target_url` must be non-empty and usable as a `Location` header
    /// - `short_key_length` must be within `1..=max_short_key_length`
    /// - `custom_key` must be non-empty, a single path segment, and not a
    ///   reserved route name
    pub fn validate(&self, max_short_key_length: usize) -> Result<(), String> {
        let target_url = self.target_url();
        if target_url.trim().is_empty() {
            return Err("target_url must not be empty".to_string());
        }
        // The redirect echoes the target as a header, so it has to be a valid one
        if HeaderValue::from_str(target_url).is_err() {
            return Err("target_url contains characters not allowed in a redirect".to_string());
        }
        match self {
            ShortenRequest::System(req) => {
                if req.short_key_length == 0 || req.short_key_length > max_short_key_length {
                    return Err(format!(
                        "short_key_length must be between 1 and {}",
                        max_short_key_length
                    ));
                }
            }
            ShortenRequest::Custom(req) => {
                if req.custom_key.is_empty() {
                    return Err("custom_key must not be empty".to_string());
                }
                // Must fit in `/{short_key}` as one segment
                if req
                    .custom_key
                    .chars()
                    .any(|c| matches!(c, '/' | '?' | '#') || c.is_control())
                {
                    return Err("custom_key must not contain '/', '?', '#' or control characters"
                        .to_string());
                }
                if RESERVED_KEYS.contains(&req.custom_key.as_str()) {
                    return Err(format!("custom_key `{}` is reserved", req.custom_key));
                }
            }
        }
        Ok(())
    }

    pub fn target_url(&self) -> &str {
        match self {
            ShortenRequest::System(req) => &req.target_url,
            ShortenRequest::Custom(req) => &req.target_url,
        }
    }

    pub fn tags(&self) -> Vec<String> {
        match self {
            ShortenRequest::System(req) => req.tags.clone().unwrap_or_default(),
            ShortenRequest::Custom(req) => req.tags.clone().unwrap_or_default(),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, ShortenRequest::Custom(_))
    }
}

/// Metadata attached to every JSON response
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResponseMeta {
    pub successful: bool,
    pub request_id: String,
    pub message: String,
    pub create_date: DateTime<Utc>,
}

impl ResponseMeta {
    pub fn new(successful: bool, request_id: &str, message: impl Into<String>) -> Self {
        Self {
            successful,
            request_id: request_id.to_string(),
            message: message.into(),
            create_date: Utc::now(),
        }
    }
}

/// Public view of a mapping returned by `POST /shorten_url`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ShortenUrlData {
    pub mapping_id: String,
    pub target_url: String,
    pub short_key: String,
    pub hits: u64,
    pub is_active: bool,
    pub is_custom_key: bool,
    pub tags: Vec<String>,
    pub app_version: String,
}

impl From<UrlMapping> for ShortenUrlData {
    fn from(mapping: UrlMapping) -> Self {
        Self {
            mapping_id: mapping.id,
            target_url: mapping.target_url,
            short_key: mapping.short_key,
            hits: mapping.hits,
            is_active: mapping.is_active,
            is_custom_key: mapping.is_custom_key,
            tags: mapping.tags,
            app_version: mapping.app_version,
        }
    }
}

/// Response returned by `POST /shorten_url`
///
/// # Example
/// ```json
/// {
///   "meta": {"successful": true, "request_id": "...", "message": "...", "create_date": "..."},
///   "data": {"mapping_id": "...", "target_url": "https://example.com/a", "short_key": "aZ3k9", ...}
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ShortenUrlResponse {
    pub meta: ResponseMeta,
    pub data: ShortenUrlData,
}

/// Body of every error response
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub meta: ResponseMeta,
    pub data: Option<serde_json::Value>,
    pub detail: String,
}

/// Response returned by `GET /ping`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PingResponse {
    pub success: bool,
    pub version: String,
}
