//! Google Drive API connector implementation
//!
//! Implements the `StorageProvider` trait for Google Drive API v3. Every
//! request goes through an [`AuthenticatedExecutor`], so credential renewal
//! and the single retry on `401` happen below this layer.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{
    BinaryPayload, DriveItem, ListPage, ListQuery, PageCursor, StorageProvider, UploadRequest,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_auth::AuthenticatedExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::query::build_query;
use crate::types::{DriveFile, FilesListResponse, UploadMetadata};

/// Google Drive API base URL
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload base URL
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime,thumbnailLink,parents,trashed";

/// Newest first, so that items created while paging appear ahead of page one
const LIST_ORDER: &str = "modifiedTime desc";

const MULTIPART_BOUNDARY: &str = "imgsync_multipart_boundary";

const API_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(120);

/// Google Drive API connector
///
/// # Features
///
/// - Paginated listing filtered by MIME prefix, folder and name
/// - Binary downloads and thumbnail fetches
/// - Multipart create/replace uploads and deletes
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::{ListQuery, StorageProvider};
///
/// let connector = GoogleDriveConnector::new(executor);
/// let page = connector.list_page(&ListQuery::images(), 30, None).await?;
/// ```
pub struct GoogleDriveConnector {
    executor: Arc<AuthenticatedExecutor>,
    api_base: String,
    upload_base: String,
}

impl GoogleDriveConnector {
    pub fn new(executor: Arc<AuthenticatedExecutor>) -> Self {
        Self {
            executor,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }

    /// Point the connector at different endpoints (proxies, test servers)
    pub fn with_endpoints(
        mut self,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    /// Parse RFC 3339 timestamp to Unix timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).timestamp())
    }

    /// Convert DriveFile to DriveItem
    fn convert_file(drive_file: DriveFile) -> DriveItem {
        DriveItem {
            id: drive_file.id,
            name: drive_file.name,
            mime_type: drive_file.mime_type,
            size_bytes: drive_file.size.and_then(|s| s.parse().ok()),
            preview_url: drive_file.thumbnail_link,
            modified_at: drive_file
                .modified_time
                .as_deref()
                .and_then(Self::parse_timestamp),
            parent_ids: drive_file.parents,
        }
    }

    fn list_url(&self, query: &ListQuery, page_size: u32, cursor: Option<&PageCursor>) -> String {
        let mut url = format!(
            "{}/files?q={}&pageSize={}&orderBy={}&fields={}",
            self.api_base,
            urlencoding::encode(&build_query(query)),
            page_size.clamp(1, MAX_PAGE_SIZE),
            urlencoding::encode(LIST_ORDER),
            urlencoding::encode(&format!("nextPageToken,files({})", FILE_FIELDS)),
        );

        if let Some(page_token) = cursor {
            url.push_str(&format!(
                "&pageToken={}",
                urlencoding::encode(page_token.as_str())
            ));
        }

        url
    }

    /// Issue a request through the executor and map error statuses
    async fn send(
        &self,
        request: HttpRequest,
        item_id: Option<&str>,
    ) -> std::result::Result<HttpResponse, GoogleDriveError> {
        let response = self.executor.execute(request).await?;

        if response.is_success() {
            return Ok(response);
        }

        let status = response.status;
        warn!(status, "Drive API request failed");

        Err(match (status, item_id) {
            (404, Some(file_id)) => GoogleDriveError::FileNotFound {
                file_id: file_id.to_string(),
            },
            (429, _) => GoogleDriveError::RateLimitExceeded {
                retry_after_seconds: response
                    .header("Retry-After")
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(0),
            },
            _ => GoogleDriveError::ApiError {
                status_code: status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            },
        })
    }

    async fn fetch_binary(
        &self,
        url: String,
        item_id: Option<&str>,
    ) -> std::result::Result<BinaryPayload, GoogleDriveError> {
        let request = HttpRequest::new(HttpMethod::Get, url).timeout(TRANSFER_TIMEOUT);
        let response = self.send(request, item_id).await?;

        debug!(bytes = response.body.len(), "Fetched binary");

        Ok(BinaryPayload {
            content_type: response.header("Content-Type").map(str::to_string),
            data: response.body,
        })
    }

    /// Assemble a `multipart/related` body: JSON metadata part, then content
    fn multipart_body(
        metadata: &UploadMetadata,
        mime_type: &str,
        data: &[u8],
    ) -> std::result::Result<Bytes, GoogleDriveError> {
        let metadata_json = serde_json::to_vec(metadata).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to encode upload metadata: {}", e))
        })?;

        let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);

        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(&metadata_json);
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--", MULTIPART_BOUNDARY).as_bytes());

        Ok(Bytes::from(body))
    }

    fn parse_file(response: &HttpResponse) -> std::result::Result<DriveItem, GoogleDriveError> {
        let drive_file: DriveFile = serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse file resource: {}", e))
        })?;
        Ok(Self::convert_file(drive_file))
    }
}

#[async_trait]
impl StorageProvider for GoogleDriveConnector {
    #[instrument(skip(self, query, cursor), fields(has_cursor = cursor.is_some()))]
    async fn list_page(
        &self,
        query: &ListQuery,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> Result<ListPage> {
        let url = self.list_url(query, page_size, cursor.as_ref());
        let request = HttpRequest::new(HttpMethod::Get, url)
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT);

        let response = self.send(request, None).await?;

        let list_response: FilesListResponse =
            serde_json::from_slice(&response.body).map_err(|e| {
                GoogleDriveError::ParseError(format!("Failed to parse files list response: {}", e))
            })?;

        if list_response.incomplete_search {
            warn!("Drive reported an incomplete search");
        }

        let items: Vec<DriveItem> = list_response
            .files
            .into_iter()
            .map(Self::convert_file)
            .collect();

        info!(count = items.len(), "Listed files from Google Drive");

        Ok(ListPage::new(
            items,
            list_response.next_page_token.map(PageCursor::new),
        ))
    }

    #[instrument(skip(self))]
    async fn download(&self, item_id: &str) -> Result<BinaryPayload> {
        let url = format!(
            "{}/files/{}?alt=media",
            self.api_base,
            urlencoding::encode(item_id)
        );
        Ok(self.fetch_binary(url, Some(item_id)).await?)
    }

    #[instrument(skip(self, preview_url))]
    async fn fetch_preview(&self, preview_url: &str) -> Result<BinaryPayload> {
        Ok(self.fetch_binary(preview_url.to_string(), None).await?)
    }

    #[instrument(skip(self, request), fields(name = %request.name, replace = request.replace_id.is_some()))]
    async fn upload(&self, request: UploadRequest) -> Result<DriveItem> {
        let (method, url, parents) = match &request.replace_id {
            Some(item_id) => (
                HttpMethod::Patch,
                format!(
                    "{}/files/{}?uploadType=multipart&fields={}",
                    self.upload_base,
                    urlencoding::encode(item_id),
                    urlencoding::encode(FILE_FIELDS)
                ),
                Vec::new(),
            ),
            None => (
                HttpMethod::Post,
                format!(
                    "{}/files?uploadType=multipart&fields={}",
                    self.upload_base,
                    urlencoding::encode(FILE_FIELDS)
                ),
                request.parent_id.iter().cloned().collect(),
            ),
        };

        let metadata = UploadMetadata {
            name: request.name.clone(),
            mime_type: request.mime_type.clone(),
            parents,
        };
        let body = Self::multipart_body(&metadata, &request.mime_type, &request.data)?;

        let http_request = HttpRequest::new(method, url)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body)
            .timeout(TRANSFER_TIMEOUT);

        let response = self
            .send(http_request, request.replace_id.as_deref())
            .await?;
        let item = Self::parse_file(&response)?;

        info!(item_id = %item.id, "Uploaded file to Google Drive");
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn delete(&self, item_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", self.api_base, urlencoding::encode(item_id));
        let request = HttpRequest::new(HttpMethod::Delete, url).timeout(API_TIMEOUT);

        match self.send(request, Some(item_id)).await {
            Ok(_) => {
                info!("Deleted file from Google Drive");
                Ok(())
            }
            // Already gone is the state we wanted
            Err(GoogleDriveError::FileNotFound { .. }) => {
                debug!("File already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
