//! Request and response bodies of the Bunny Stream library API.
//!
//! Field names follow the API's camelCase JSON. Only the fields the uploader
//! reads are decoded. Handles (`guid`) are optional on the Rust side so that a
//! response missing them can be reported as malformed instead of failing to
//! decode.

use serde::{Deserialize, Serialize};

/// One collection as returned by `GET /library/{id}/collections`.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub name: String,
}

/// Paged list wrapper used by the collection listing.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionPage {
    #[serde(default)]
    pub items: Vec<Collection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCollectionRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    pub title: String,
    pub collection_id: String,
}

/// The subset of a video object the uploader needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub guid: Option<String>,
}

/// Error body, e.g. `{"Message": "Invalid AccessKey"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "Message")]
    pub message: String,
}
