//! Shared request and response types for the media-management service API.
//!
//! The wire format is camelCase JSON; timestamps are RFC 3339 strings.
//! These types are consumed by the `rivolo` synchronization core and by any
//! UI layer that renders the data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// ============================================================================
// Error body
// ============================================================================

/// One structured field-level error, as emitted by the backend's request
/// validation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Location of the offending field, outermost first.
    pub loc: Vec<String>,
    /// Human-readable message; typically refers to the field as "value".
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The `detail` payload of a failed response: either an opaque message or a
/// list of field-level validation errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Fields(Vec<FieldError>),
    Message(String),
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: ErrorDetail,
}

// ============================================================================
// Music conversion jobs
// ============================================================================

/// A music conversion job, sourced from either an uploaded file or a video
/// URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicJob {
    pub id: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub artwork_filename: Option<String>,
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(default)]
    pub grouping: Option<String>,
    pub completed: bool,
    pub failed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsResponse {
    pub jobs: Vec<MusicJob>,
    pub total_pages: u64,
}

/// Resolved grouping for a video URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingResponse {
    pub grouping: String,
}

/// Resolved artwork location for an arbitrary artwork URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkResponse {
    pub artwork_url: String,
}

/// Tags read out of an uploaded audio file; every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagsResponse {
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub grouping: Option<String>,
}

// ============================================================================
// Video catalog
// ============================================================================

/// A catalog video. `liked`, `queued` and `watched` carry the timestamp of
/// the respective user action when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub channel_id: String,
    pub channel_title: String,
    pub channel_thumbnail: String,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub category_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub liked: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub queued: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub watched: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideosResponse {
    pub videos: Vec<Video>,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCategory {
    pub id: i64,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCategoriesResponse {
    pub categories: Vec<VideoCategory>,
}

/// A channel subscription owned by the signed-in account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSubscription {
    pub id: String,
    pub channel_id: String,
    pub channel_title: String,
    pub channel_thumbnail: String,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionsResponse {
    pub subscriptions: Vec<ChannelSubscription>,
    pub total_pages: u64,
}

// ============================================================================
// Request argument objects
// ============================================================================

/// Pagination arguments shared by every list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArgs {
    pub page: u64,
    pub per_page: u64,
}

/// Arguments of the video list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideosArgs {
    pub page: u64,
    pub per_page: u64,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub selected_categories: Vec<i64>,
    #[serde(default)]
    pub liked_only: bool,
    #[serde(default)]
    pub queued_only: bool,
}
