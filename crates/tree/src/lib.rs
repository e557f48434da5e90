//! Path-addressed tree operations over an ID-addressed drive.
//!
//! The remote drive only understands opaque node ids; names are not unique
//! within a folder and nodes may have several parents. This crate layers
//! slash-separated [`VirtualPath`]s on top, and implements the recursive
//! operations (delete, move, content export) the provider doesn't offer.
//!
//! Every operation takes the [`ClientHandle`](drivepath_storage::ClientHandle)
//! to talk to, and a [`Context`] carrying the caller's configuration. Remote
//! calls are issued strictly one after another: a parent is never deleted
//! before its children, and a move never removes old parents before the new
//! one was added.

pub mod content;
pub mod delete;
pub mod error;
pub mod fetch;
pub mod list;
pub mod path;
pub mod relocate;
pub mod resolve;

pub use crate::content::{copy_content, read_content, read_node};
pub use crate::delete::{Expect, delete, delete_checked, delete_node};
pub use crate::fetch::fetch;
pub use crate::list::{create_folder, list, list_children, list_stream};
pub use crate::path::VirtualPath;
pub use crate::relocate::{move_node, move_to};
pub use crate::resolve::{resolve, stat};

use crate::error::{Error, ErrorKind, Result};
use derive_more::Display;
use drivepath_storage::query::DEFAULT_PAGE_SIZE;
use drivepath_storage::{ClientHandle, Node, NodeId};
use futures::Stream;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::AsyncWrite;

/// Deepest folder nesting a recursive operation descends into by default.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Which node a path segment resolves to when several siblings share a name.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq)]
pub enum SiblingPolicy {
    /// First match in provider order (a warning is logged).
    #[default]
    #[display("first")]
    First,
    /// Most recently modified match; nodes without a timestamp lose.
    #[display("newest")]
    Newest,
    /// Refuse with [`ErrorKind::Ambiguous`].
    #[display("strict")]
    Strict,
}
impl FromStr for SiblingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "newest" => Ok(Self::Newest),
            "strict" => Ok(Self::Strict),
            _ => exn::bail!(ErrorKind::UnknownPolicy(s.to_string())),
        }
    }
}

/// Configuration passed into every tree operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Requested page size for listings (the provider may return less).
    pub page_size: u32,
    pub siblings: SiblingPolicy,
    /// Folder nesting limit for recursive delete.
    pub max_depth: usize,
}
impl Default for Context {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            siblings: SiblingPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A client handle bundled with its [`Context`], for callers that would rather
/// not thread both through every call.
#[derive(Clone)]
pub struct Tree {
    client: ClientHandle,
    ctx: Context,
}
impl Tree {
    pub fn new(client: ClientHandle, ctx: Context) -> Self {
        Self { client, ctx }
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub async fn resolve(&self, path: &str) -> Result<NodeId> {
        resolve(&self.client, &self.ctx, path).await
    }

    pub async fn stat(&self, path: &str) -> Result<Node> {
        stat(&self.client, &self.ctx, path).await
    }

    pub async fn list(&self, path: &str, filter: Option<&str>) -> Result<Vec<Node>> {
        list(&self.client, &self.ctx, path, filter).await
    }

    pub async fn list_children(&self, parent: &NodeId, filter: Option<&str>) -> Result<Vec<Node>> {
        list_children(&self.client, &self.ctx, parent, filter).await
    }

    pub fn list_stream<'a>(&'a self, parent: &NodeId, filter: Option<&str>) -> impl Stream<Item = Result<Node>> + Send + 'a {
        list_stream(&self.client, &self.ctx, parent, filter)
    }

    pub async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<Node> {
        create_folder(&self.client, &self.ctx, name, parent).await
    }

    pub async fn delete(&self, path: &str, recursive: bool) -> Result<u64> {
        delete(&self.client, &self.ctx, path, recursive).await
    }

    pub async fn delete_checked(&self, path: &str, recursive: bool, expect: Option<Expect>) -> Result<u64> {
        delete_checked(&self.client, &self.ctx, path, recursive, expect).await
    }

    pub async fn delete_node(&self, id: &NodeId, recursive: bool) -> Result<u64> {
        delete_node(&self.client, &self.ctx, id, recursive).await
    }

    pub async fn move_to(&self, source: &str, destination: &str) -> Result<Node> {
        move_to(&self.client, &self.ctx, source, destination).await
    }

    pub async fn move_node(&self, id: &NodeId, new_parent: &NodeId) -> Result<Node> {
        move_node(&self.client, id, new_parent).await
    }

    pub async fn read_content(&self, path: &str) -> Result<Vec<u8>> {
        read_content(&self.client, &self.ctx, path).await
    }

    pub async fn read_node(&self, id: &NodeId) -> Result<Vec<u8>> {
        read_node(&self.client, id).await
    }

    pub async fn copy_content<W>(&self, path: &str, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        copy_content(&self.client, &self.ctx, path, writer).await
    }

    pub async fn fetch(&self, path: &str, dir: &Path) -> Result<Vec<PathBuf>> {
        fetch(&self.client, &self.ctx, path, dir).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("first", SiblingPolicy::First)]
    #[case("Newest", SiblingPolicy::Newest)]
    #[case(" strict ", SiblingPolicy::Strict)]
    fn test_policy_from_str(#[case] input: &str, #[case] expected: SiblingPolicy) {
        assert_eq!(input.parse::<SiblingPolicy>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<SiblingPolicy>().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_tree_round_trip() {
        use drivepath_storage::backend::MockClient;

        let (mock, client) = testing::handle(MockClient::default().with_file("f", "a.txt", "root", b"abc"));
        let tree = Tree::new(client, Context::default());
        let folder = tree.create_folder("Archive", None).await.unwrap();
        tree.move_to("/a.txt", "/Archive").await.unwrap();
        assert_eq!(tree.read_content("/Archive/a.txt").await.unwrap(), b"abc");
        assert_eq!(tree.delete("/Archive", true).await.unwrap(), 2);
        assert!(mock.peek(folder.id.as_str()).await.is_none());
        assert!(tree.list("/", None).await.unwrap().is_empty());
    }

    #[test]
    fn test_policy_unknown() {
        let err = "random".parse::<SiblingPolicy>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownPolicy(p) if p == "random"));
    }
}
