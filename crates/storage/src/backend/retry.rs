//! Bounded retry decorator.
//!
//! Wraps another client and re-issues individual requests that failed with a
//! [retryable](crate::error::ErrorKind::is_retryable) error, backing off
//! exponentially between attempts. Callers still see exactly one logical
//! request per trait method; only the wire traffic changes.

use super::ByteStream;
use crate::error::{ErrorKind, Result};
use crate::node::{Node, NodeId, NodeKind};
use crate::query::{ChildQuery, Page};
use crate::{ClientHandle, StorageClient};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// How hard to try before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. `1` disables retrying.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for every attempt after.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}
impl Default for RetryPolicy {
    /// 1 initial attempt + 3 retries.
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}
impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Retrying storage client.
#[derive(Clone)]
pub struct RetryClient {
    inner: ClientHandle,
    policy: RetryPolicy,
}
impl RetryClient {
    pub fn new(inner: ClientHandle, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn attempt<T, F, Fut>(&self, operation: &'static str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 1;
        loop {
            match request().await {
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    let reason: &ErrorKind = &e;
                    tracing::warn!(
                        client = self.inner.name(),
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "Retrying storage request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                result => return result,
            }
        }
    }
}

#[async_trait]
impl StorageClient for RetryClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn atomic_reparent(&self) -> bool {
        self.inner.atomic_reparent()
    }

    // Creation isn't idempotent: a request that timed out may still have
    // created the node, and retrying would create a second one.
    async fn create_node(&self, name: &str, kind: &NodeKind, parent: Option<&NodeId>) -> Result<Node> {
        self.inner.create_node(name, kind, parent).await
    }

    async fn get_node(&self, id: &NodeId) -> Result<Node> {
        self.attempt("get", || self.inner.get_node(id)).await
    }

    async fn list_children(&self, query: &ChildQuery, page_token: Option<&str>) -> Result<Page> {
        self.attempt("list", || self.inner.list_children(query, page_token)).await
    }

    async fn update_parents(&self, id: &NodeId, add: &[NodeId], remove: &[NodeId]) -> Result<Node> {
        self.attempt("update_parents", || self.inner.update_parents(id, add, remove)).await
    }

    // A delete that timed out may still have gone through, in which case the
    // retry finds nothing left to delete.
    async fn delete_node(&self, id: &NodeId) -> Result<()> {
        let mut attempts = 0u32;
        let result = self
            .attempt("delete", || {
                attempts += 1;
                self.inner.delete_node(id)
            })
            .await;
        match result {
            Err(e) if attempts > 1 && matches!(&*e, ErrorKind::NotFound(_)) => {
                tracing::debug!(client = self.inner.name(), id = %id, attempts, "Node already gone after retried delete");
                Ok(())
            },
            result => result,
        }
    }

    async fn export_node(&self, id: &NodeId, mime_type: &str) -> Result<Vec<u8>> {
        self.attempt("export", || self.inner.export_node(id, mime_type)).await
    }

    /// Only opening the stream is retried. A failure halfway through the
    /// content is surfaced as-is.
    async fn download_node<'a>(&'a self, id: &NodeId) -> Result<ByteStream<'a>> {
        self.attempt("download", || self.inner.download_node(id)).await
    }
}
