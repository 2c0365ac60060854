use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Response};

use super::types::{
    ApiErrorBody, Collection, CollectionPage, CreateCollectionRequest, CreateVideoRequest, Video,
};
use crate::error::RemoteError;
use crate::host::{CollectionId, UploadBody, VideoHost, VideoId};

pub const API_URL: &str = "https://video.bunnycdn.com";

/// Page size for the collection search; names are matched exactly afterwards.
const COLLECTION_PAGE_SIZE: &str = "100";

/// Bunny Stream library client.
pub struct BunnyClient {
    api_key: String,
    library_id: String,
    client: Client,
    base_url: String,
}

impl BunnyClient {
    /// Client for `base_url`, normally [`API_URL`]; tests point it at a mock.
    pub fn with_base_url(
        api_key: String,
        library_id: String,
        base_url: String,
    ) -> Result<Self, RemoteError> {
        // No overall timeout: uploads of large files legitimately take long.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            api_key,
            library_id,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn library_url(&self, path: &str) -> String {
        format!("{}/library/{}/{path}", self.base_url, self.library_id)
    }

    async fn find_collection(&self, name: &str) -> Result<Option<Collection>, RemoteError> {
        let response = self
            .client
            .get(self.library_url("collections"))
            .header("AccessKey", &self.api_key)
            .header(ACCEPT, "application/json")
            .query(&[("search", name), ("itemsPerPage", COLLECTION_PAGE_SIZE)])
            .send()
            .await?;

        let page: CollectionPage = check_status(response).await?.json().await?;
        tracing::debug!(collection = name, candidates = page.items.len(), "collection search");
        Ok(page.items.into_iter().find(|c| c.name == name))
    }

    async fn create_collection(&self, name: &str) -> Result<Collection, RemoteError> {
        tracing::info!(collection = name, "creating collection");
        let response = self
            .client
            .post(self.library_url("collections"))
            .header("AccessKey", &self.api_key)
            .header(ACCEPT, "application/json")
            .json(&CreateCollectionRequest {
                name: name.to_string(),
            })
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

/// Passes successful responses through and classifies the rest:
/// 5xx is transient, everything else is rejected.
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => parsed.message,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => body,
    };

    let status = status.as_u16();
    if (500..600).contains(&status) {
        Err(RemoteError::Transient { status, message })
    } else {
        Err(RemoteError::Rejected { status, message })
    }
}

impl VideoHost for BunnyClient {
    async fn resolve_collection(&self, name: &str) -> Result<CollectionId, RemoteError> {
        let collection = match self.find_collection(name).await? {
            Some(existing) => existing,
            None => self.create_collection(name).await?,
        };

        collection.guid.map(CollectionId).ok_or_else(|| {
            RemoteError::MalformedResponse(format!("collection `{name}` has no guid"))
        })
    }

    async fn create_video(
        &self,
        collection: &CollectionId,
        title: &str,
    ) -> Result<VideoId, RemoteError> {
        let response = self
            .client
            .post(self.library_url("videos"))
            .header("AccessKey", &self.api_key)
            .header(ACCEPT, "application/json")
            .json(&CreateVideoRequest {
                title: title.to_string(),
                collection_id: collection.0.clone(),
            })
            .send()
            .await?;

        let video: Video = check_status(response).await?.json().await?;
        video.guid.map(VideoId).ok_or_else(|| {
            RemoteError::MalformedResponse(format!("video `{title}` has no guid"))
        })
    }

    async fn upload_video(&self, video: &VideoId, body: UploadBody) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.library_url(&format!("videos/{video}")))
            .header("AccessKey", &self.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, body.len)
            .body(Body::wrap_stream(body.stream))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}
