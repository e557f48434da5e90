//! Storage client trait and implementations.
//!
//! This module defines the `StorageClient` trait: the complete set of remote
//! operations the tree layer needs from an ID-addressed cloud drive. Clients
//! either talk to a real provider, or decorate another client.

#[cfg(feature = "drive")]
mod drive;
mod dry_run;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod retry;

#[cfg(feature = "drive")]
pub use self::drive::DriveClient;
pub use self::dry_run::DryRunClient;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{Call, MockClient};
pub use self::retry::{RetryClient, RetryPolicy};
use crate::error::Result;
use crate::node::{Node, NodeId, NodeKind};
use crate::query::{ChildQuery, Page};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Raw content, chunk by chunk, in the order the provider sends it.
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send + 'a>>;

/// Unified interface for ID-addressed remote storage.
///
/// Every method is a single remote request (or, for
/// [`download_node()`](Self::download_node), a single streamed response).
/// Implementations must not retry, cache, or reorder requests themselves;
/// that is what decorators such as [`RetryClient`] are for.
///
/// # Examples
///
/// ```
/// use drivepath_storage::backend::StorageClient;
/// use drivepath_storage::error::Result;
/// use drivepath_storage::node::NodeId;
/// use drivepath_storage::query::ChildQuery;
///
/// async fn count_top_level(client: &dyn StorageClient) -> Result<usize> {
///     let mut total = 0;
///     let mut token = None;
///     loop {
///         let page = client.list_children(&ChildQuery::children_of(NodeId::root()), token.as_deref()).await?;
///         total += page.nodes.len();
///         match page.next_page_token {
///             Some(next) => token = Some(next),
///             None => return Ok(total),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Name of the configured client, for logging only.
    fn name(&self) -> &str;

    /// Whether [`update_parents()`](Self::update_parents) can add and remove
    /// parents in one request.
    ///
    /// When this returns `false`, callers must split a move into an "add"
    /// request followed by a "remove" request.
    fn atomic_reparent(&self) -> bool {
        true
    }

    /// Create a new node (metadata only) under `parent`, or under the root
    /// when no parent is given. The provider assigns the id.
    async fn create_node(&self, name: &str, kind: &NodeKind, parent: Option<&NodeId>) -> Result<Node>;

    /// Fetch the metadata of a single node.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the node
    /// does not exist.
    async fn get_node(&self, id: &NodeId) -> Result<Node>;

    /// Fetch a single page of children matching `query`.
    ///
    /// Pass `None` as the token for the first page, then the previous page's
    /// [`next_page_token`](Page::next_page_token) until it comes back empty.
    async fn list_children(&self, query: &ChildQuery, page_token: Option<&str>) -> Result<Page>;

    /// Add and/or remove parents of a node, returning the updated metadata.
    async fn update_parents(&self, id: &NodeId, add: &[NodeId], remove: &[NodeId]) -> Result<Node>;

    /// Permanently delete a single node. Folders are **not** emptied first;
    /// what happens to their children is provider-specific.
    async fn delete_node(&self, id: &NodeId) -> Result<()>;

    /// Export a virtual document to a concrete format.
    async fn export_node(&self, id: &NodeId, mime_type: &str) -> Result<Vec<u8>>;

    /// Open the raw content of a (non-virtual) file as a chunk stream.
    ///
    /// Async setup (request, status check) happens before returning, so a
    /// missing node fails here rather than on the first chunk.
    async fn download_node<'a>(&'a self, id: &NodeId) -> Result<ByteStream<'a>>;
}
