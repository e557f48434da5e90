//! Dry-run storage client.
//!
//! This module provides a storage client implementation that wraps other
//! implementations and prevents mutating requests from executing, but
//! indicating success on return.

use async_trait::async_trait;

use super::ByteStream;
use crate::error::Result;
use crate::node::{Node, NodeId, NodeKind};
use crate::query::{ChildQuery, Page};
use crate::{ClientHandle, StorageClient};

/// Id handed out for nodes that were never actually created.
const PLACEHOLDER_ID: &str = "dry-run";

/// Dry-run storage client.
///
/// Wraps another client and silently drops all mutating requests, logging an
/// [`info event`](tracing::Event). Reads go through untouched, so recursive
/// operations still walk the real tree and log every step they would take.
#[derive(Clone)]
pub struct DryRunClient {
    inner: ClientHandle,
}
impl DryRunClient {
    pub fn new(inner: ClientHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageClient for DryRunClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn atomic_reparent(&self) -> bool {
        true
    }

    async fn create_node(&self, name: &str, kind: &NodeKind, parent: Option<&NodeId>) -> Result<Node> {
        let parent = parent.cloned().unwrap_or_else(NodeId::root);
        tracing::info!(node_name = name, kind = %kind, parent = %parent, "Skipping create during dry run");
        Ok(Node::new(PLACEHOLDER_ID, name, kind.default_mime()).with_parent(parent))
    }

    async fn get_node(&self, id: &NodeId) -> Result<Node> {
        self.inner.get_node(id).await
    }

    async fn list_children(&self, query: &ChildQuery, page_token: Option<&str>) -> Result<Page> {
        self.inner.list_children(query, page_token).await
    }

    async fn update_parents(&self, id: &NodeId, add: &[NodeId], remove: &[NodeId]) -> Result<Node> {
        let mut node = self.inner.get_node(id).await?;
        tracing::info!(id = %id, ?add, ?remove, "Skipping parent update during dry run");
        node.parents.retain(|parent| !remove.contains(parent));
        for parent in add {
            if !node.parents.contains(parent) {
                node.parents.push(parent.clone());
            }
        }
        Ok(node)
    }

    async fn delete_node(&self, id: &NodeId) -> Result<()> {
        tracing::info!(id = %id, "Skipping delete during dry run");
        Ok(())
    }

    async fn export_node(&self, id: &NodeId, mime_type: &str) -> Result<Vec<u8>> {
        self.inner.export_node(id, mime_type).await
    }

    async fn download_node<'a>(&'a self, id: &NodeId) -> Result<ByteStream<'a>> {
        self.inner.download_node(id).await
    }
}
