//! Drive-compatible REST storage client.
//!
//! This module provides a storage client for providers exposing the Drive v3
//! "files" resource: folders are files with a directory mime type, parents
//! are a multi-valued reference list, and trashed nodes are filtered out by
//! query.
//!
//! # Credentials
//!
//! Obtaining an access token is somebody else's problem. The client is handed
//! a ready-to-use bearer token and never refreshes it; an expired token shows
//! up as [`PermissionDenied`](ErrorKind::PermissionDenied).

use super::ByteStream;
use crate::error::{Error, ErrorKind, Result};
use crate::node::{Node, NodeId, NodeKind};
use crate::query::{ChildQuery, Page};
use crate::StorageClient;
use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Metadata fields requested for every node.
const NODE_FIELDS: &str = "id,name,mimeType,parents,createdTime,modifiedTime,size,trashed";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,parents,createdTime,modifiedTime,size,trashed)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Drive-compatible REST storage client.
///
/// # Examples
///
/// ```no_run
/// use drivepath_storage::backend::DriveClient;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = DriveClient::new(
///     "my-drive",
///     "https://www.googleapis.com/drive/v3",
///     "ya29.access-token",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DriveClient {
    name: String,
    http: Client,
    base_url: String,
    access_token: String,
}

impl DriveClient {
    /// Create a new Drive client.
    ///
    /// # Arguments
    /// * `name` - A name for this client (used in logging)
    /// * `base_url` - API root, e.g. `https://www.googleapis.com/drive/v3`
    /// * `access_token` - OAuth bearer token with drive scope
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;
        Ok(Self {
            name: name.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.base_url)
    }

    fn file_url(&self, id: &NodeId) -> String {
        format!("{}/files/{}", self.base_url, id)
    }

    /// Send a request, turning any non-2xx answer into an error about `subject`.
    async fn send(&self, request: RequestBuilder, subject: &NodeId) -> Result<Response> {
        let response = request.bearer_auth(&self.access_token).send().await.map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let (reason, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => (parsed.error.errors.into_iter().next().map(|e| e.reason), parsed.error.message),
            Err(_) => (None, body),
        };
        tracing::debug!(client = %self.name, status = status.as_u16(), reason = reason.as_deref(), detail = %message, "Request rejected");
        exn::bail!(classify(status, reason.as_deref(), message, subject))
    }

    async fn node_from(response: Response) -> Result<Node> {
        let file: DriveFile = response.json().await.map_err(transport)?;
        file.try_into()
    }
}

#[async_trait]
impl StorageClient for DriveClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_node(&self, name: &str, kind: &NodeKind, parent: Option<&NodeId>) -> Result<Node> {
        let parent = parent.cloned().unwrap_or_else(NodeId::root);
        tracing::debug!(client = %self.name, node_name = name, parent = %parent, "Creating node");
        let body = serde_json::json!({
            "name": name,
            "mimeType": kind.default_mime(),
            "parents": [parent.as_str()],
        });
        let request = self.http.post(self.files_url()).query(&[("fields", NODE_FIELDS)]).json(&body);
        Self::node_from(self.send(request, &parent).await?).await
    }

    async fn get_node(&self, id: &NodeId) -> Result<Node> {
        tracing::debug!(client = %self.name, id = %id, "Fetching node");
        let request = self.http.get(self.file_url(id)).query(&[("fields", NODE_FIELDS)]);
        Self::node_from(self.send(request, id).await?).await
    }

    async fn list_children(&self, query: &ChildQuery, page_token: Option<&str>) -> Result<Page> {
        let q = query.render();
        tracing::debug!(client = %self.name, query = %q, page_token, "Listing children");
        let page_size = query.page_size.to_string();
        let mut params = vec![("q", q.as_str()), ("spaces", "drive"), ("fields", LIST_FIELDS), ("pageSize", page_size.as_str())];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let request = self.http.get(self.files_url()).query(&params);
        let list: FileList = self.send(request, &query.parent).await?.json().await.map_err(transport)?;
        Ok(Page {
            nodes: list.files.into_iter().map(Node::try_from).collect::<Result<_>>()?,
            next_page_token: list.next_page_token.filter(|token| !token.is_empty()),
        })
    }

    async fn update_parents(&self, id: &NodeId, add: &[NodeId], remove: &[NodeId]) -> Result<Node> {
        tracing::debug!(client = %self.name, id = %id, ?add, ?remove, "Updating parents");
        let join = |ids: &[NodeId]| ids.iter().map(NodeId::as_str).collect::<Vec<_>>().join(",");
        let (add, remove) = (join(add), join(remove));
        let mut params = vec![("fields", NODE_FIELDS)];
        if !add.is_empty() {
            params.push(("addParents", add.as_str()));
        }
        if !remove.is_empty() {
            params.push(("removeParents", remove.as_str()));
        }
        let request = self.http.patch(self.file_url(id)).query(&params).json(&serde_json::json!({}));
        Self::node_from(self.send(request, id).await?).await
    }

    async fn delete_node(&self, id: &NodeId) -> Result<()> {
        tracing::debug!(client = %self.name, id = %id, "Deleting node");
        self.send(self.http.delete(self.file_url(id)), id).await?;
        Ok(())
    }

    async fn export_node(&self, id: &NodeId, mime_type: &str) -> Result<Vec<u8>> {
        tracing::debug!(client = %self.name, id = %id, mime_type, "Exporting node");
        let request = self.http.get(format!("{}/export", self.file_url(id))).query(&[("mimeType", mime_type)]);
        let bytes = self.send(request, id).await?.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    async fn download_node<'a>(&'a self, id: &NodeId) -> Result<ByteStream<'a>> {
        tracing::debug!(client = %self.name, id = %id, "Downloading node");
        let request = self.http.get(self.file_url(id)).query(&[("alt", "media")]);
        let response = self.send(request, id).await?;
        Ok(Box::pin(response.bytes_stream().map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(transport))))
    }
}

#[track_caller]
fn transport(err: reqwest::Error) -> Error {
    let message = err.to_string();
    exn::Exn::from(err).raise(ErrorKind::Network(message))
}

/// Map a rejected request onto an actionable error category.
fn classify(status: StatusCode, reason: Option<&str>, message: String, subject: &NodeId) -> ErrorKind {
    match (status.as_u16(), reason) {
        (404, _) => ErrorKind::NotFound(subject.clone()),
        (429, _) => ErrorKind::RateLimited,
        (403, Some("rateLimitExceeded" | "userRateLimitExceeded")) => ErrorKind::RateLimited,
        (401 | 403, _) => ErrorKind::PermissionDenied(subject.clone()),
        (500..=599, _) => ErrorKind::Network(message),
        _ => ErrorKind::Backend(message),
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    parents: Vec<String>,
    created_time: Option<String>,
    modified_time: Option<String>,
    /// The API sends 64-bit integers as strings.
    size: Option<String>,
    #[serde(default)]
    trashed: bool,
}

impl TryFrom<DriveFile> for Node {
    type Error = Error;

    fn try_from(file: DriveFile) -> Result<Self> {
        let timestamp = |value: Option<String>| -> Result<Option<OffsetDateTime>> {
            value
                .map(|v| OffsetDateTime::parse(&v, &Rfc3339).or_raise(|| ErrorKind::InvalidResponse(format!("bad timestamp: {v}"))))
                .transpose()
        };
        let size = file
            .size
            .map(|s| s.parse::<u64>().or_raise(|| ErrorKind::InvalidResponse(format!("bad size: {s}"))))
            .transpose()?;
        let mut node = Node::new(file.id, file.name, file.mime_type);
        node.parents = file.parents.into_iter().map(NodeId::from).collect();
        node.created = timestamp(file.created_time)?;
        node.modified = timestamp(file.modified_time)?;
        node.size = size;
        node.trashed = file.trashed;
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::VirtualKind;

    #[test]
    fn test_file_to_node() {
        let file: DriveFile = serde_json::from_str(
            r#"{
                "id": "1abc",
                "name": "Budget",
                "mimeType": "application/vnd.google-apps.spreadsheet",
                "parents": ["0root"],
                "createdTime": "2024-03-01T10:00:00.000Z",
                "modifiedTime": "2024-03-02T11:30:00.000Z"
            }"#,
        )
        .unwrap();
        let node = Node::try_from(file).unwrap();
        assert_eq!(node.id.as_str(), "1abc");
        assert_eq!(node.kind, NodeKind::Virtual(VirtualKind::Spreadsheet));
        assert_eq!(node.parents, vec![NodeId::from("0root")]);
        assert_eq!(node.size, None);
        assert_eq!(node.modified.unwrap().unix_timestamp(), 1_709_379_000);
        assert!(!node.trashed);
    }

    #[test]
    fn test_file_size_parsed() {
        let file: DriveFile =
            serde_json::from_str(r#"{"id": "f", "name": "a.bin", "mimeType": "application/octet-stream", "size": "1048576"}"#)
                .unwrap();
        assert_eq!(Node::try_from(file).unwrap().size, Some(1_048_576));
    }

    #[test]
    fn test_bad_size_rejected() {
        let file: DriveFile = serde_json::from_str(r#"{"id": "f", "size": "lots"}"#).unwrap();
        let err = Node::try_from(file).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidResponse(_)));
    }

    #[test]
    fn test_file_list() {
        let list: FileList =
            serde_json::from_str(r#"{"nextPageToken": "abc", "files": [{"id": "1"}, {"id": "2"}]}"#).unwrap();
        assert_eq!(list.next_page_token.as_deref(), Some("abc"));
        assert_eq!(list.files.len(), 2);
    }

    #[test]
    fn test_classify() {
        let id = NodeId::from("x");
        assert!(matches!(classify(StatusCode::NOT_FOUND, None, String::new(), &id), ErrorKind::NotFound(_)));
        assert!(matches!(classify(StatusCode::TOO_MANY_REQUESTS, None, String::new(), &id), ErrorKind::RateLimited));
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, Some("userRateLimitExceeded"), String::new(), &id),
            ErrorKind::RateLimited
        ));
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, Some("insufficientPermissions"), String::new(), &id),
            ErrorKind::PermissionDenied(_)
        ));
        assert!(matches!(classify(StatusCode::UNAUTHORIZED, None, String::new(), &id), ErrorKind::PermissionDenied(_)));
        assert!(matches!(classify(StatusCode::BAD_GATEWAY, None, String::new(), &id), ErrorKind::Network(_)));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST, None, "Invalid Value".to_string(), &id),
            ErrorKind::Backend(m) if m == "Invalid Value"
        ));
    }

    #[test]
    fn test_api_error_body() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error": {"code": 403, "message": "Rate Limit Exceeded", "errors": [{"reason": "rateLimitExceeded"}]}}"#,
        )
        .unwrap();
        assert_eq!(body.error.message, "Rate Limit Exceeded");
        assert_eq!(body.error.errors[0].reason, "rateLimitExceeded");
    }
}
